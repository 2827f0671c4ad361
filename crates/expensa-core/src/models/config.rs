//! Configuration structures for extraction, lifecycle, and policy checks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::expense::{ExpenseCategory, ExpenseStatus};

/// Main configuration for expensa.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpensaConfig {
    /// Receipt field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Expense lifecycle configuration.
    pub lifecycle: LifecycleConfig,

    /// Advisory spending policy.
    pub policy: PolicyConfig,
}

/// Receipt field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Number of leading non-empty lines searched for the merchant name.
    pub merchant_scan_lines: usize,

    /// Shortest accepted merchant line, in characters.
    pub merchant_min_len: usize,

    /// Longest accepted merchant line, in characters. Also the fallback truncation length.
    pub merchant_max_len: usize,

    /// Minimum share of alphabetic characters in a merchant line (0.0 - 1.0).
    pub merchant_min_alpha_ratio: f32,

    /// Use the largest currency-like number as the total when no total label is found.
    pub largest_amount_fallback: bool,

    /// Parsed years must be strictly greater than this.
    pub min_year_exclusive: i32,

    /// Parsed years may be at most this many years past the current one.
    pub max_years_ahead: i32,

    /// Two-digit years up to and including this value map to 20xx, above it to 19xx.
    pub two_digit_year_pivot: u32,

    /// Scale used when rasterizing the first page of a PDF receipt.
    pub pdf_render_scale: f32,

    /// Currency assumed for extracted amounts.
    pub default_currency: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            merchant_scan_lines: 5,
            merchant_min_len: 3,
            merchant_max_len: 50,
            merchant_min_alpha_ratio: 0.3,
            largest_amount_fallback: true,
            min_year_exclusive: 1990,
            max_years_ahead: 1,
            two_digit_year_pivot: 50,
            pdf_render_scale: 2.0,
            default_currency: "USD".to_string(),
        }
    }
}

/// Expense lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Submission requires at least one attached receipt.
    pub require_receipt_on_submit: bool,

    /// Approvers may decide on their own expenses.
    pub allow_self_approval: bool,

    /// Submission requires an expense date no later than today.
    pub reject_future_dates: bool,

    /// State an unmatched card expense moves to once its charge is matched.
    pub card_match_target: CardMatchTarget,

    /// Submitting a company-card draft with no linked charge parks it in `unmatched`.
    pub card_submit_awaits_match: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            require_receipt_on_submit: true,
            allow_self_approval: false,
            reject_future_dates: true,
            card_match_target: CardMatchTarget::Submitted,
            card_submit_awaits_match: true,
        }
    }
}

/// Organization policy for matched card expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardMatchTarget {
    /// Matched charges still go through approval.
    #[default]
    Submitted,
    /// Matched charges are approved on match.
    Approved,
}

impl CardMatchTarget {
    pub fn status(&self) -> ExpenseStatus {
        match self {
            CardMatchTarget::Submitted => ExpenseStatus::Submitted,
            CardMatchTarget::Approved => ExpenseStatus::Approved,
        }
    }
}

/// Advisory spending policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Per-category amount limits.
    pub category_limits: Vec<CategoryLimit>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            category_limits: vec![
                CategoryLimit {
                    category: ExpenseCategory::Meals,
                    limit: Decimal::new(75, 0),
                    label: "daily meal".to_string(),
                },
                CategoryLimit {
                    category: ExpenseCategory::Lodging,
                    limit: Decimal::new(200, 0),
                    label: "daily lodging".to_string(),
                },
            ],
        }
    }
}

/// An amount limit for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLimit {
    pub category: ExpenseCategory,
    pub limit: Decimal,
    /// Used in the flag text, e.g. "daily meal".
    pub label: String,
}

impl ExpensaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
