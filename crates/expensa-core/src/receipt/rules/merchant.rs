//! Merchant name extraction.
//!
//! The merchant is normally printed in the first few lines of a receipt. Lines
//! that look like headers, phone numbers, dates or order numbers are skipped.

use tracing::debug;

use super::patterns::{
    BARE_DATE, BARE_NUMBER, BARE_TIME, CORPORATE_SUFFIX, MERCHANT_BOILERPLATE, ORDER_NUMBER,
    STORE_NUMBER_SUFFIX,
};
use super::{ExtractionMatch, FieldExtractor};

/// Why a candidate line was not taken as the merchant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerchantReject {
    /// "Receipt", "Tel", "www." and similar header lines.
    Boilerplate,
    /// Only digits.
    Numeric,
    /// A bare date.
    BareDate,
    /// Starts with a time of day.
    BareTime,
    /// Starts with "#123".
    OrderNumber,
    /// Too short or too long.
    Length,
    /// Not enough letters.
    AlphaRatio,
}

/// Merchant name extractor.
pub struct MerchantExtractor {
    scan_lines: usize,
    min_len: usize,
    max_len: usize,
    min_alpha_ratio: f32,
}

impl MerchantExtractor {
    pub fn new() -> Self {
        Self {
            scan_lines: 5,
            min_len: 3,
            max_len: 50,
            min_alpha_ratio: 0.3,
        }
    }

    /// Number of leading non-empty lines to consider.
    pub fn with_scan_lines(mut self, lines: usize) -> Self {
        self.scan_lines = lines;
        self
    }

    /// Accepted line length in characters, inclusive.
    pub fn with_length_bounds(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub fn with_min_alpha_ratio(mut self, ratio: f32) -> Self {
        self.min_alpha_ratio = ratio;
        self
    }

    /// Check a trimmed line against the rejection rules.
    pub fn check_line(&self, line: &str) -> Result<(), MerchantReject> {
        if MERCHANT_BOILERPLATE.is_match(line) {
            return Err(MerchantReject::Boilerplate);
        }
        if BARE_NUMBER.is_match(line) {
            return Err(MerchantReject::Numeric);
        }
        if BARE_DATE.is_match(line) {
            return Err(MerchantReject::BareDate);
        }
        if BARE_TIME.is_match(line) {
            return Err(MerchantReject::BareTime);
        }
        if ORDER_NUMBER.is_match(line) {
            return Err(MerchantReject::OrderNumber);
        }

        let len = line.chars().count();
        if len < self.min_len || len > self.max_len {
            return Err(MerchantReject::Length);
        }

        let letters = line.chars().filter(|c| c.is_alphabetic()).count();
        if (letters as f32) / (len as f32) < self.min_alpha_ratio {
            return Err(MerchantReject::AlphaRatio);
        }

        Ok(())
    }

    fn candidates<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(self.scan_lines)
    }

    fn accept(&self, line: &str) -> Option<ExtractionMatch<String>> {
        if let Err(reason) = self.check_line(line) {
            debug!("merchant candidate {:?} rejected: {:?}", line, reason);
            return None;
        }
        let name = clean_merchant_name(line);
        if name.chars().count() < 2 {
            return None;
        }
        Some(ExtractionMatch::new(name, "leading_line", 0.8, line))
    }
}

impl Default for MerchantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for MerchantExtractor {
    type Output = ExtractionMatch<String>;

    /// First acceptable leading line, otherwise the first line cut to the maximum length.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        if let Some(hit) = self.candidates(text).find_map(|line| self.accept(line)) {
            return Some(hit);
        }

        let first = self.candidates(text).next()?;
        let name: String = first.chars().take(self.max_len).collect();
        Some(ExtractionMatch::new(name, "first_line", 0.3, first))
    }
}

/// Drop a trailing store number ("#1234", "- 0042") and corporate suffix.
pub fn clean_merchant_name(line: &str) -> String {
    let without_store = STORE_NUMBER_SUFFIX.replace(line, "");
    let without_suffix = CORPORATE_SUFFIX.replace(without_store.trim_end(), "");
    without_suffix.trim().to_string()
}
