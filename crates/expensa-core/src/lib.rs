//! Core library for expense tracking.
//!
//! This crate provides:
//! - Receipt field extraction (merchant, subtotal, tax, total, date) from recognized text
//! - The receipt reading pipeline around an external OCR provider
//! - The expense lifecycle state machine with advisory policy checks
//! - Company card transaction reconciliation
//! - A store seam and the `Ledger` that applies operations with compare-and-swap writes

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ocr;
pub mod receipt;
pub mod reconcile;
pub mod store;

pub use error::{
    ExpensaError, ExtractionError, ReconciliationError, RecognitionError, Requirement, Result,
    StoreError, TransitionError,
};
pub use lifecycle::{apply_transition, authorize_delete, ExpenseEvent, StateMachine};
pub use models::card::{CardTransaction, CardTransactionStatus, TransactionId};
pub use models::config::ExpensaConfig;
pub use models::expense::{
    Actor, ExpenseCategory, ExpenseDraft, ExpenseId, ExpensePatch, ExpenseRecord, ExpenseStatus,
    ExpenseType, Money, ReceiptAttachment, Role, UserId,
};
pub use ocr::{OcrProvider, PdfRasterizer, ReceiptFile, ReceiptReader};
pub use receipt::{extract_fields, ExtractedFields, ReceiptFieldExtractor};
pub use reconcile::{match_transaction, MatchMode};
pub use store::{ExpenseFilter, ExpenseStore, ExportBatch, InMemoryStore, Ledger, TransactionStore};
