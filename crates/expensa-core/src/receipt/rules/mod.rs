//! Rule-based field extractors for receipts.
//!
//! Each field has an ordered list of rules. Rules are tried top to bottom and the
//! first one that produces a value wins.

pub mod amounts;
pub mod dates;
pub mod merchant;
pub mod patterns;
pub mod tax;

pub use amounts::{parse_currency_amount, SubtotalExtractor, SubtotalRule, TotalExtractor, TotalRule};
pub use dates::{DateExtractor, DateRule};
pub use merchant::{MerchantExtractor, MerchantReject};
pub use tax::{TaxExtractor, TaxRule};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;
}

/// An extracted value with the rule that produced it.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Name of the rule that matched.
    pub rule: &'static str,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, rule: &'static str, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            rule,
            confidence,
            source: source.into(),
        }
    }
}

/// Whether the word ending right before byte offset `start` is one of `words`.
///
/// Used where a lookbehind would be needed, e.g. to keep "Subtotal" from
/// matching a bare "total" label.
pub(crate) fn preceded_by_word(text: &str, start: usize, words: &[&str]) -> bool {
    let before = text[..start].trim_end_matches(|c: char| c.is_whitespace() || c == '-');
    let before = before.to_lowercase();
    words.iter().any(|w| before.ends_with(w))
}
