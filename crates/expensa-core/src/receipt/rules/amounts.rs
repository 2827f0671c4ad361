//! Subtotal and total extraction.

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use super::patterns::{
    AMOUNT_TOKEN, CURRENCY_SUFFIX, CURRENCY_SYMBOL, SUBTOTAL_GENERIC, SUBTOTAL_LABELED, TOTAL_BARE,
    TOTAL_DUE,
};
use super::{preceded_by_word, ExtractionMatch, FieldExtractor};

/// Parse a receipt amount such as "$1,234.56" or "42.5".
pub fn parse_currency_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Scan `pattern` over `text`, skipping hits whose label is preceded by one of `reject_after`.
fn labeled_amounts(
    text: &str,
    pattern: &Regex,
    reject_after: &[&str],
    rule: &'static str,
    confidence: f32,
) -> Vec<ExtractionMatch<Decimal>> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if !reject_after.is_empty() && preceded_by_word(text, whole.start(), reject_after) {
                return None;
            }
            let amount = parse_currency_amount(caps.get(1)?.as_str())?;
            Some(ExtractionMatch::new(amount, rule, confidence, whole.as_str()))
        })
        .collect()
}

/// Subtotal rules, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtotalRule {
    /// "Subtotal", "Sub total", "Sub-total".
    Labeled,
    /// "Amount", "Items total".
    Generic,
}

impl SubtotalRule {
    pub const ORDER: [SubtotalRule; 2] = [SubtotalRule::Labeled, SubtotalRule::Generic];

    pub fn name(&self) -> &'static str {
        match self {
            SubtotalRule::Labeled => "subtotal_label",
            SubtotalRule::Generic => "amount_label",
        }
    }

    fn candidates(&self, text: &str) -> Vec<ExtractionMatch<Decimal>> {
        match self {
            SubtotalRule::Labeled => labeled_amounts(text, &SUBTOTAL_LABELED, &[], self.name(), 0.95),
            // "Tax amount" and "Total amount" are not the subtotal.
            SubtotalRule::Generic => {
                labeled_amounts(text, &SUBTOTAL_GENERIC, &["tax", "total"], self.name(), 0.7)
            }
        }
    }
}

/// Subtotal (amount before tax) extractor.
pub struct SubtotalExtractor;

impl SubtotalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubtotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for SubtotalExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        for rule in SubtotalRule::ORDER {
            let hit = rule
                .candidates(text)
                .into_iter()
                .find(|m| m.value > Decimal::ZERO);
            if let Some(hit) = hit {
                debug!("subtotal {} via {}", hit.value, hit.rule);
                return Some(hit);
            }
        }
        None
    }
}

/// Total rules, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalRule {
    /// "Grand total", "Total due", "Amount due", "Balance due".
    DueLabel,
    /// A bare "Total" label, not part of "Subtotal" or "Tax total".
    BareLabel,
    /// The first "$12.34" style token.
    CurrencySymbol,
    /// The first "12.34 USD" style token.
    CurrencySuffix,
    /// The largest currency-like number anywhere in the text.
    ///
    /// Best effort: on most receipts the total is the biggest number printed,
    /// but nothing guarantees it.
    LargestAmount,
}

impl TotalRule {
    pub const ORDER: [TotalRule; 5] = [
        TotalRule::DueLabel,
        TotalRule::BareLabel,
        TotalRule::CurrencySymbol,
        TotalRule::CurrencySuffix,
        TotalRule::LargestAmount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TotalRule::DueLabel => "total_due_label",
            TotalRule::BareLabel => "total_label",
            TotalRule::CurrencySymbol => "currency_symbol",
            TotalRule::CurrencySuffix => "currency_suffix",
            TotalRule::LargestAmount => "largest_amount",
        }
    }

    fn candidates(&self, text: &str) -> Vec<ExtractionMatch<Decimal>> {
        match self {
            TotalRule::DueLabel => labeled_amounts(text, &TOTAL_DUE, &[], self.name(), 0.95),
            TotalRule::BareLabel => {
                labeled_amounts(text, &TOTAL_BARE, &["sub", "tax", "items", "item"], self.name(), 0.9)
            }
            TotalRule::CurrencySymbol => labeled_amounts(text, &CURRENCY_SYMBOL, &[], self.name(), 0.6),
            TotalRule::CurrencySuffix => labeled_amounts(text, &CURRENCY_SUFFIX, &[], self.name(), 0.6),
            TotalRule::LargestAmount => {
                let largest = labeled_amounts(text, &AMOUNT_TOKEN, &[], self.name(), 0.4)
                    .into_iter()
                    .filter(|m| m.value > Decimal::ZERO)
                    .max_by(|a, b| a.value.cmp(&b.value));
                largest.into_iter().collect()
            }
        }
    }
}

/// Total amount extractor.
pub struct TotalExtractor {
    largest_amount_fallback: bool,
}

impl TotalExtractor {
    pub fn new() -> Self {
        Self {
            largest_amount_fallback: true,
        }
    }

    /// Enable or disable the largest-amount fallback.
    pub fn with_largest_amount_fallback(mut self, enabled: bool) -> Self {
        self.largest_amount_fallback = enabled;
        self
    }

    fn rules(&self) -> impl Iterator<Item = TotalRule> + '_ {
        TotalRule::ORDER
            .into_iter()
            .filter(|rule| self.largest_amount_fallback || *rule != TotalRule::LargestAmount)
    }
}

impl Default for TotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TotalExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        for rule in self.rules() {
            let hit = rule
                .candidates(text)
                .into_iter()
                .find(|m| m.value > Decimal::ZERO);
            if let Some(hit) = hit {
                debug!("total {} via {}", hit.value, hit.rule);
                return Some(hit);
            }
        }
        None
    }
}
