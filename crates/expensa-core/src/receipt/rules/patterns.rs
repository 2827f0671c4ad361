//! Common regex patterns for receipt field extraction.
//!
//! Amount tokens accept both grouped ("1,234.56") and plain ("1234.56") integer parts.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Subtotal labels, in priority order
    pub static ref SUBTOTAL_LABELED: Regex = Regex::new(
        r"(?i)sub[\s\-]*total[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref SUBTOTAL_GENERIC: Regex = Regex::new(
        r"(?i)(?:\bamount|\bitems?\s*total)[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    // Tax lines that state an amount *without* tax
    pub static ref EXCLUDING_TAX: Vec<Regex> = vec![
        Regex::new(r"(?i)\bexcl(?:uding|\.)?\s*(?:of\s*)?tax").unwrap(),
        Regex::new(r"(?i)\bbefore\s*tax").unwrap(),
        Regex::new(r"(?i)\bex\.?\s*tax\b").unwrap(),
        Regex::new(r"(?i)\bwithout\s*tax").unwrap(),
        Regex::new(r"(?i)\bpre[\s\-]?tax").unwrap(),
    ];

    // "Tax - California (6% on $100.00) $6.00"
    pub static ref TAX_JURISDICTION: Regex = Regex::new(
        r"(?i)\btax\s*[-–—]\s*[^$]*\$[\d.,]+\)?\s*\$((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    // "Tax - State Name $6.00" with the amount closing the line
    pub static ref TAX_DASH: Regex = Regex::new(
        r"(?i)\btax\s*[-–—]\s*[^$]*\$((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)\s*$"
    ).unwrap();

    pub static ref TAX_NAMED: Regex = Regex::new(
        r"(?i)\b(?:sales\s*tax|hst|gst|pst|vat)[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref TAX_TOTAL: Regex = Regex::new(
        r"(?i)\b(?:tax\s*amount|tax\s*total|total\s*tax)[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref TAX_LINE_START: Regex = Regex::new(
        r"(?i)^tax[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref TAX_PUNCTUATED: Regex = Regex::new(
        r"(?i)[\s:;,(]tax[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    // Total labels, in priority order
    pub static ref TOTAL_DUE: Regex = Regex::new(
        r"(?i)(?:grand\s*total|total\s*due|amount\s*due|balance\s*due)[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref TOTAL_BARE: Regex = Regex::new(
        r"(?i)total[\s:]*\$?\s?((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(
        r"\$\s?((?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2})"
    ).unwrap();

    pub static ref CURRENCY_SUFFIX: Regex = Regex::new(
        r"(?i)((?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2})\s?(?:USD|CAD|EUR)\b"
    ).unwrap();

    // Any currency-like number, for the largest-amount fallback
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"\$?((?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2})"
    ).unwrap();

    // Dates, in priority order
    pub static ref DATE_MDY_LONG: Regex = Regex::new(
        r"\b(\d{1,2})[/\-](\d{1,2})[/\-](\d{4})\b"
    ).unwrap();

    pub static ref DATE_MDY_SHORT: Regex = Regex::new(
        r"\b(\d{1,2})[/\-](\d{1,2})[/\-](\d{2})\b"
    ).unwrap();

    pub static ref DATE_MONTH_NAME_FIRST: Regex = Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    // Merchant line rejection
    pub static ref MERCHANT_BOILERPLATE: Regex = Regex::new(
        r"(?i)^(?:receipt|invoice|order|transaction|date|time|store|location|tel|phone|fax|www\.|http)"
    ).unwrap();

    pub static ref BARE_NUMBER: Regex = Regex::new(r"^\d+$").unwrap();

    pub static ref BARE_DATE: Regex = Regex::new(r"^\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}$").unwrap();

    pub static ref BARE_TIME: Regex = Regex::new(r"^\d{1,2}:\d{2}").unwrap();

    pub static ref ORDER_NUMBER: Regex = Regex::new(r"^#\d+").unwrap();

    pub static ref CORPORATE_SUFFIX: Regex = Regex::new(
        r"(?i)[\s,]+(?:inc|llc|ltd|corp)\.?$"
    ).unwrap();

    pub static ref STORE_NUMBER_SUFFIX: Regex = Regex::new(
        r"\s*(?:-\s*#?|#)\s*\d+$"
    ).unwrap();
}
