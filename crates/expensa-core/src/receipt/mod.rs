//! Receipt field extraction module.
//!
//! Turns recognized receipt text into an [`ExtractedFields`] value. Extraction
//! never fails: a field that cannot be located is `None`.

mod extractor;
pub mod rules;

pub use extractor::ReceiptFieldExtractor;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fields located in a receipt's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Field name to the rule that produced it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, String>,
}

impl ExtractedFields {
    /// No field was found.
    pub fn is_empty(&self) -> bool {
        self.merchant_name.is_none()
            && self.subtotal.is_none()
            && self.tax.is_none()
            && self.total.is_none()
            && self.date.is_none()
    }

    /// Amount to put on an expense: subtotal plus tax, else total, else subtotal.
    pub fn expense_amount(&self) -> Option<Decimal> {
        match (self.subtotal, self.tax, self.total) {
            (Some(subtotal), Some(tax), _) => Some(subtotal + tax),
            (_, _, Some(total)) => Some(total),
            (subtotal, _, None) => subtotal,
        }
    }

    /// Whether subtotal + tax is within `tolerance` of the total.
    ///
    /// `None` unless all three amounts were found. Extraction does not enforce this.
    pub fn cross_check(&self, tolerance: Decimal) -> Option<bool> {
        let (subtotal, tax, total) = (self.subtotal?, self.tax?, self.total?);
        Some((subtotal + tax - total).abs() <= tolerance)
    }
}

/// Extract receipt fields from recognized text with default settings.
pub fn extract_fields(text: &str) -> ExtractedFields {
    ReceiptFieldExtractor::new().extract(text)
}
