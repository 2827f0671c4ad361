//! Transaction date extraction for receipts.

use chrono::{Datelike, NaiveDate, Utc};
use regex::{Captures, Regex};
use tracing::debug;

use super::patterns::{DATE_DAY_FIRST, DATE_ISO, DATE_MDY_LONG, DATE_MDY_SHORT, DATE_MONTH_NAME_FIRST};
use super::{ExtractionMatch, FieldExtractor};

/// Date rules, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    /// MM/DD/YYYY or MM-DD-YYYY.
    MonthDayLongYear,
    /// MM/DD/YY, two-digit year resolved by the pivot.
    MonthDayShortYear,
    /// "January 15, 2024" or "Jan 15 2024".
    MonthNameFirst,
    /// "15 January 2024" or "15th Jan, 2024".
    DayFirst,
    /// YYYY-MM-DD.
    Iso,
}

impl DateRule {
    pub const ORDER: [DateRule; 5] = [
        DateRule::MonthDayLongYear,
        DateRule::MonthDayShortYear,
        DateRule::MonthNameFirst,
        DateRule::DayFirst,
        DateRule::Iso,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DateRule::MonthDayLongYear => "mdy_long",
            DateRule::MonthDayShortYear => "mdy_short",
            DateRule::MonthNameFirst => "month_name_first",
            DateRule::DayFirst => "day_first",
            DateRule::Iso => "iso",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            DateRule::MonthDayLongYear => &DATE_MDY_LONG,
            DateRule::MonthDayShortYear => &DATE_MDY_SHORT,
            DateRule::MonthNameFirst => &DATE_MONTH_NAME_FIRST,
            DateRule::DayFirst => &DATE_DAY_FIRST,
            DateRule::Iso => &DATE_ISO,
        }
    }

    /// Turn captures into (year, month, day) as written.
    fn parts(&self, caps: &Captures<'_>, pivot: u32) -> Option<(i32, u32, u32)> {
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let name = |i: usize| caps.get(i).and_then(|m| month_from_name(m.as_str()));

        match self {
            DateRule::MonthDayLongYear => Some((num(3)? as i32, num(1)?, num(2)?)),
            DateRule::MonthDayShortYear => Some((expand_two_digit_year(num(3)?, pivot), num(1)?, num(2)?)),
            DateRule::MonthNameFirst => Some((num(3)? as i32, name(1)?, num(2)?)),
            DateRule::DayFirst => Some((num(3)? as i32, name(2)?, num(1)?)),
            DateRule::Iso => Some((num(1)? as i32, num(2)?, num(3)?)),
        }
    }
}

/// Date field extractor.
pub struct DateExtractor {
    min_year_exclusive: i32,
    max_year: i32,
    pivot: u32,
}

impl DateExtractor {
    /// Accept years after 1990 and up to next year.
    pub fn new() -> Self {
        Self {
            min_year_exclusive: 1990,
            max_year: Utc::now().year() + 1,
            pivot: 50,
        }
    }

    /// Set the accepted year window: `min_exclusive < year <= max_inclusive`.
    pub fn with_year_window(mut self, min_exclusive: i32, max_inclusive: i32) -> Self {
        self.min_year_exclusive = min_exclusive;
        self.max_year = max_inclusive;
        self
    }

    /// Set the two-digit year pivot: `yy <= pivot` is 20yy, otherwise 19yy.
    pub fn with_pivot(mut self, pivot: u32) -> Self {
        self.pivot = pivot;
        self
    }

    fn is_plausible(&self, date: NaiveDate) -> bool {
        date.year() > self.min_year_exclusive && date.year() <= self.max_year
    }

    fn rule_matches(&self, rule: DateRule, text: &str) -> Vec<ExtractionMatch<NaiveDate>> {
        rule.pattern()
            .captures_iter(text)
            .filter_map(|caps| {
                let (year, month, day) = rule.parts(&caps, self.pivot)?;
                let date = NaiveDate::from_ymd_opt(year, month, day)?;
                if !self.is_plausible(date) {
                    debug!("rejecting implausible date {} via {}", date, rule.name());
                    return None;
                }
                let source = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                Some(ExtractionMatch::new(date, rule.name(), 0.9, source))
            })
            .collect()
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        DateRule::ORDER
            .iter()
            .find_map(|rule| self.rule_matches(*rule, text).into_iter().next())
    }
}

/// Resolve a two-digit year: up to `pivot` is 2000s, above it 1900s.
pub fn expand_two_digit_year(year: u32, pivot: u32) -> i32 {
    if year >= 100 {
        year as i32
    } else if year <= pivot {
        2000 + year as i32
    } else {
        1900 + year as i32
    }
}

/// Month number from a full or abbreviated English month name.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn extractor() -> DateExtractor {
        DateExtractor::new().with_year_window(1990, 2025)
    }

    #[test]
    fn test_extract_mdy_long() {
        let hit = extractor().extract("Date: 03/15/2024 14:32").unwrap();
        assert_eq!(hit.value, ymd(2024, 3, 15));
        assert_eq!(hit.rule, "mdy_long");

        assert_eq!(extractor().extract("12-01-2023").unwrap().value, ymd(2023, 12, 1));
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(extractor().extract("03/15/24").unwrap().value, ymd(2024, 3, 15));
        assert_eq!(expand_two_digit_year(50, 50), 2050);
        assert_eq!(expand_two_digit_year(51, 50), 1951);
    }

    #[test]
    fn test_month_names() {
        assert_eq!(extractor().extract("January 15, 2024").unwrap().value, ymd(2024, 1, 15));
        assert_eq!(extractor().extract("Sept 3rd 2023").unwrap().value, ymd(2023, 9, 3));
        assert_eq!(extractor().extract("15 Jan 2024").unwrap().value, ymd(2024, 1, 15));
        assert_eq!(extractor().extract("2nd December, 2022").unwrap().value, ymd(2022, 12, 2));
    }

    #[test]
    fn test_iso_is_not_misread_as_short_date() {
        let hit = extractor().extract("Printed 2024-03-15").unwrap();
        assert_eq!(hit.value, ymd(2024, 3, 15));
        assert_eq!(hit.rule, "iso");
    }

    #[test]
    fn test_implausible_year_falls_through() {
        // 1985 fails the window, the ISO date later in the text is used instead.
        let hit = extractor().extract("Since 01/01/1985\n2024-02-29").unwrap();
        assert_eq!(hit.value, ymd(2024, 2, 29));

        assert!(extractor().extract("06/01/2099").is_none());
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert!(extractor().extract("02/30/2024").is_none());
        assert!(extractor().extract("13/45/2024").is_none());
    }

    #[test]
    fn test_month_from_name() {
        assert_eq!(month_from_name("Feb"), Some(2));
        assert_eq!(month_from_name("SEPTEMBER"), Some(9));
        assert_eq!(month_from_name("Mo"), None);
    }
}
