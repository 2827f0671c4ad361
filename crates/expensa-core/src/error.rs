//! Error types for the expensa-core library.

use std::fmt;

use thiserror::Error;

use crate::models::card::TransactionId;
use crate::models::expense::{ExpenseId, ExpenseStatus, UserId};

/// Main error type for the expensa library.
#[derive(Error, Debug)]
pub enum ExpensaError {
    /// Receipt could not be read.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Lifecycle transition was refused.
    #[error("transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Card reconciliation was refused.
    #[error("reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors reported by the external recognizer collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// The OCR engine failed on the image.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The PDF page could not be rendered to an image.
    #[error("rasterization failed: {0}")]
    Rasterization(String),
}

/// Errors related to receipt reading.
///
/// Fields that are simply absent from a receipt are not errors; they come
/// back as `None` in [`crate::ExtractedFields`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The recognizer could not produce text for the receipt.
    #[error("could not read receipt: {reason}")]
    Unavailable { reason: String },
}

impl From<RecognitionError> for ExtractionError {
    fn from(err: RecognitionError) -> Self {
        ExtractionError::Unavailable {
            reason: err.to_string(),
        }
    }
}

/// A requirement that must hold before an expense can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    MerchantName,
    PositiveAmount,
    NonNegativeAmount,
    ReceiptAttachment,
    ExpenseDateNotInFuture,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Requirement::MerchantName => "merchant name is required",
            Requirement::PositiveAmount => "amount must be greater than zero",
            Requirement::NonNegativeAmount => "amount cannot be negative",
            Requirement::ReceiptAttachment => "at least one receipt must be attached",
            Requirement::ExpenseDateNotInFuture => "expense date cannot be in the future",
        };
        f.write_str(msg)
    }
}

/// Why an actor was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// Only the owner may perform this action.
    NotOwner { actor: UserId },
    /// The actor's asserted role does not allow this action.
    RoleNotPermitted { actor: UserId, role: String },
    /// Approvers may not decide on their own expenses.
    SelfApproval { actor: UserId },
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenReason::NotOwner { actor } => {
                write!(f, "{} is not the owner of this expense", actor)
            }
            ForbiddenReason::RoleNotPermitted { actor, role } => {
                write!(f, "{} with role {} may not perform this action", actor, role)
            }
            ForbiddenReason::SelfApproval { actor } => {
                write!(f, "{} cannot approve or reject their own expense", actor)
            }
        }
    }
}

/// Errors related to expense lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition exists but the record does not meet its preconditions.
    #[error("policy violation: {}", join_requirements(.missing))]
    PolicyViolation { missing: Vec<Requirement> },

    /// The transition is not defined from the current state.
    #[error("illegal transition: cannot {event} an expense in {from} state")]
    IllegalTransition { from: ExpenseStatus, event: String },

    /// The actor may not trigger this transition.
    #[error("forbidden: {reason}")]
    Forbidden { reason: ForbiddenReason },
}

fn join_requirements(missing: &[Requirement]) -> String {
    missing
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors related to expense persistence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("expense not found: {0}")]
    NotFound(ExpenseId),

    /// The record changed since it was read.
    #[error("stale state for expense {id}: expected {expected}, found {actual}")]
    StaleState {
        id: ExpenseId,
        expected: ExpenseStatus,
        actual: ExpenseStatus,
    },

    /// A record with this id already exists.
    #[error("expense already exists: {0}")]
    Duplicate(ExpenseId),
}

/// Errors related to card-transaction reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    /// The transaction or the expense is already linked elsewhere.
    #[error("transaction {transaction_id} conflicts with existing match to expense {expense_id}")]
    Conflict {
        transaction_id: TransactionId,
        expense_id: ExpenseId,
    },

    /// Ignored transactions cannot be matched.
    #[error("transaction {0} has been ignored")]
    TransactionIgnored(TransactionId),

    /// The expense is past the point where a charge may be linked.
    #[error("expense {expense_id} in {status} state cannot be matched")]
    IneligibleExpense {
        expense_id: ExpenseId,
        status: ExpenseStatus,
    },

    /// Transaction and expense belong to different people.
    #[error("transaction {transaction_id} and expense {expense_id} have different owners")]
    OwnerMismatch {
        transaction_id: TransactionId,
        expense_id: ExpenseId,
    },

    /// No transaction with this id.
    #[error("card transaction not found: {0}")]
    NotFound(TransactionId),
}

/// Result type for the expensa library.
pub type Result<T> = std::result::Result<T, ExpensaError>;
