//! Receipt extractor combining the per-field rule chains.

use chrono::{Datelike, Utc};
use tracing::debug;

use crate::models::config::ExtractionConfig;

use super::rules::{
    DateExtractor, ExtractionMatch, FieldExtractor, MerchantExtractor, SubtotalExtractor, TaxExtractor,
    TotalExtractor,
};
use super::ExtractedFields;

/// Runs every field extractor over a receipt's text.
pub struct ReceiptFieldExtractor {
    merchant: MerchantExtractor,
    subtotal: SubtotalExtractor,
    tax: TaxExtractor,
    total: TotalExtractor,
    date: DateExtractor,
}

impl ReceiptFieldExtractor {
    /// Create an extractor with default settings.
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    /// Create an extractor from configuration, with dates checked against the current year.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::with_reference_year(config, Utc::now().year())
    }

    /// Create an extractor whose date window ends `max_years_ahead` after `year`.
    pub fn with_reference_year(config: &ExtractionConfig, year: i32) -> Self {
        Self {
            merchant: MerchantExtractor::new()
                .with_scan_lines(config.merchant_scan_lines)
                .with_length_bounds(config.merchant_min_len, config.merchant_max_len)
                .with_min_alpha_ratio(config.merchant_min_alpha_ratio),
            subtotal: SubtotalExtractor::new(),
            tax: TaxExtractor::new(),
            total: TotalExtractor::new().with_largest_amount_fallback(config.largest_amount_fallback),
            date: DateExtractor::new()
                .with_year_window(config.min_year_exclusive, year + config.max_years_ahead)
                .with_pivot(config.two_digit_year_pivot),
        }
    }

    /// Extract all fields. Empty or whitespace-only text yields empty fields.
    pub fn extract(&self, text: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        if text.trim().is_empty() {
            return fields;
        }

        fields.merchant_name = take(&mut fields, "merchant_name", self.merchant.extract(text));
        fields.subtotal = take(&mut fields, "subtotal", self.subtotal.extract(text));
        fields.tax = take(&mut fields, "tax", self.tax.extract(text));
        fields.total = take(&mut fields, "total", self.total.extract(text));
        fields.date = take(&mut fields, "date", self.date.extract(text));

        debug!("extracted {} of 5 receipt fields", fields.rules.len());
        fields
    }
}

impl Default for ReceiptFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Hits below this come from a last-resort rule.
const LOW_CONFIDENCE: f32 = 0.5;

/// Record which rule produced a field and hand back its value.
fn take<T>(fields: &mut ExtractedFields, field: &str, hit: Option<ExtractionMatch<T>>) -> Option<T> {
    let hit = hit?;
    if hit.confidence < LOW_CONFIDENCE {
        debug!("{} from fallback rule {} ({:.1}): {:?}", field, hit.rule, hit.confidence, hit.source);
    } else {
        debug!("{} from rule {} ({:.1})", field, hit.rule, hit.confidence);
    }
    fields.rules.insert(field.to_string(), hit.rule.to_string());
    Some(hit.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use crate::receipt::extract_fields;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn extractor() -> ReceiptFieldExtractor {
        ReceiptFieldExtractor::with_reference_year(&ExtractionConfig::default(), 2024)
    }

    const CAFE_RECEIPT: &str = "\
        BLUE BOTTLE COFFEE INC.\n\
        Store #0042\n\
        03/15/24 08:12\n\
        Latte 5.50\n\
        Croissant 4.25\n\
        Subtotal: $42.50\n\
        Tax: $3.30\n\
        Total: $45.80\n\
        Thank you!";

    #[test]
    fn test_extract_full_receipt() {
        let fields = extractor().extract(CAFE_RECEIPT);

        assert_eq!(fields.merchant_name.as_deref(), Some("BLUE BOTTLE COFFEE"));
        assert_eq!(fields.subtotal, Some(dec("42.50")));
        assert_eq!(fields.tax, Some(dec("3.30")));
        assert_eq!(fields.total, Some(dec("45.80")));
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(fields.cross_check(dec("0.01")), Some(true));
        assert_eq!(fields.rules.get("total").map(String::as_str), Some("total_label"));
    }

    #[test]
    fn test_jurisdiction_tax_line() {
        let text = "Hotel Lumen\nSubtotal $100.00\nTax - California (6% on $100.00) $6.00\nTotal $106.00";
        let fields = extractor().extract(text);
        assert_eq!(fields.tax, Some(dec("6.00")));
        assert_eq!(fields.total, Some(dec("106.00")));
    }

    #[test]
    fn test_no_digits_means_no_amounts() {
        let fields = extractor().extract("Corner Deli\nThank you for visiting\nSee you soon");
        assert_eq!(fields.subtotal, None);
        assert_eq!(fields.tax, None);
        assert_eq!(fields.total, None);
        assert_eq!(fields.date, None);
        assert_eq!(fields.merchant_name.as_deref(), Some("Corner Deli"));
    }

    #[test]
    fn test_empty_text_is_empty_fields() {
        assert_eq!(extractor().extract(""), ExtractedFields::default());
        assert_eq!(extractor().extract(" \n\t \n"), ExtractedFields::default());
        assert!(extract_fields("   ").is_empty());
    }

    #[test]
    fn test_noisy_text_never_panics() {
        let inputs = [
            "$$$ ... ,,, ###",
            "Tax -",
            "total:",
            "€ 12,5 — ½ 日本語 ✓",
            "Sub-\ntotal\n$",
            "99999999999999999999999999999999.99",
            "1,2,3,4,5,6,7,8,9,0",
        ];
        for input in inputs {
            let _ = extractor().extract(input);
        }
    }

    #[test]
    fn test_disabled_largest_amount_fallback() {
        let config = ExtractionConfig {
            largest_amount_fallback: false,
            ..Default::default()
        };
        let fields = ReceiptFieldExtractor::with_reference_year(&config, 2024).extract("Parking 12.00\n3.50");
        assert_eq!(fields.total, None);

        let fields = extractor().extract("Parking 12.00\n3.50");
        assert_eq!(fields.total, Some(dec("12.00")));
    }
}
