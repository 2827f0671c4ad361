//! Tax amount extraction.
//!
//! Works line by line: a jurisdiction note such as
//! "Tax - California (6% on $100.00) $6.00" carries a decoy base amount
//! before the real tax figure, and lines like "Subtotal before tax" must not
//! be read as tax at all.

use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use super::amounts::parse_currency_amount;
use super::patterns::{
    EXCLUDING_TAX, TAX_DASH, TAX_JURISDICTION, TAX_LINE_START, TAX_NAMED, TAX_PUNCTUATED, TAX_TOTAL,
};
use super::{ExtractionMatch, FieldExtractor};

/// Tax rules, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxRule {
    /// "Tax - California (6% on $100.00) $6.00"
    Jurisdiction,
    /// "Tax - State $6.00", amount at end of line.
    Dash,
    /// "Sales tax", "HST", "GST", "PST", "VAT".
    Named,
    /// "Tax amount", "Tax total", "Total tax".
    TaxTotal,
    /// "Tax" at the start of the line.
    LineStart,
    /// "Tax" after whitespace or punctuation.
    Punctuated,
}

impl TaxRule {
    pub const ORDER: [TaxRule; 6] = [
        TaxRule::Jurisdiction,
        TaxRule::Dash,
        TaxRule::Named,
        TaxRule::TaxTotal,
        TaxRule::LineStart,
        TaxRule::Punctuated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaxRule::Jurisdiction => "tax_jurisdiction",
            TaxRule::Dash => "tax_dash",
            TaxRule::Named => "tax_named",
            TaxRule::TaxTotal => "tax_total",
            TaxRule::LineStart => "tax_line_start",
            TaxRule::Punctuated => "tax_punctuated",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            TaxRule::Jurisdiction => &TAX_JURISDICTION,
            TaxRule::Dash => &TAX_DASH,
            TaxRule::Named => &TAX_NAMED,
            TaxRule::TaxTotal => &TAX_TOTAL,
            TaxRule::LineStart => &TAX_LINE_START,
            TaxRule::Punctuated => &TAX_PUNCTUATED,
        }
    }

    fn confidence(&self) -> f32 {
        match self {
            TaxRule::Jurisdiction | TaxRule::Dash => 0.95,
            TaxRule::Named | TaxRule::TaxTotal => 0.9,
            TaxRule::LineStart => 0.85,
            TaxRule::Punctuated => 0.7,
        }
    }

    fn apply(&self, line: &str) -> Option<ExtractionMatch<Decimal>> {
        let caps = self.pattern().captures(line)?;
        let amount = parse_currency_amount(caps.get(1)?.as_str())?;
        Some(ExtractionMatch::new(amount, self.name(), self.confidence(), line))
    }
}

/// Whether a line talks about an amount without tax.
pub fn is_excluding_tax_line(line: &str) -> bool {
    EXCLUDING_TAX.iter().any(|pattern| pattern.is_match(line))
}

/// Tax amount extractor.
pub struct TaxExtractor;

impl TaxExtractor {
    pub fn new() -> Self {
        Self
    }

    fn match_line(&self, line: &str) -> Option<ExtractionMatch<Decimal>> {
        if is_excluding_tax_line(line) {
            return None;
        }
        TaxRule::ORDER.iter().find_map(|rule| rule.apply(line))
    }
}

impl Default for TaxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TaxExtractor {
    type Output = ExtractionMatch<Decimal>;

    /// First matching line wins. A zero tax is a valid match.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        let hit = text.lines().map(str::trim).find_map(|line| self.match_line(line));
        if let Some(hit) = &hit {
            debug!("tax {} via {}", hit.value, hit.rule);
        }
        hit
    }
}
