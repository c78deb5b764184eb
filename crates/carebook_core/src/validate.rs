//! Pure field validators.
//!
//! # Responsibility
//! - Check single raw field values against format/range rules.
//! - Describe per-entity field mappings as data (`FieldSpec`).
//!
//! # Invariants
//! - Validators never panic and never return errors; callers decide whether
//!   a `false` rejects construction or a single field mutation.
//! - Dates use the fixed `YYYY-MM-DD` format.

use crate::storage::FieldValue;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Calendar date format shared by every date field.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const CONTACT_MIN_DIGITS: usize = 7;
pub const CONTACT_MAX_DIGITS: usize = 15;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z\s\-']{2,50}$").expect("valid name regex"));

/// Returns whether `value` is an acceptable person name.
///
/// Rules: after trimming, 2-50 characters of ASCII letters, whitespace,
/// hyphen or apostrophe.
pub fn is_valid_name(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && NAME_RE.is_match(trimmed)
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Returns whether `value` parses as a calendar date.
pub fn is_valid_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Returns whether `value` is a calendar date not later than the local today.
pub fn is_valid_past_date(value: &str) -> bool {
    is_valid_past_date_on(value, today())
}

/// Same as [`is_valid_past_date`] with an explicit reference day.
pub fn is_valid_past_date_on(value: &str, today: NaiveDate) -> bool {
    parse_date(value).is_some_and(|date| date <= today)
}

/// Case-insensitive membership check against a fixed set.
pub fn is_valid_category(value: &str, allowed: &[&str]) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    !normalized.is_empty() && allowed.iter().any(|item| *item == normalized)
}

/// Returns whether `value` carries 7 to 15 digits once non-digits are removed.
pub fn is_valid_contact(value: &str) -> bool {
    let digits = contact_digits(value).len();
    (CONTACT_MIN_DIGITS..=CONTACT_MAX_DIGITS).contains(&digits)
}

/// Returns whether the trimmed char count of `value` lies in `min..=max`.
pub fn is_valid_text(value: &str, min: usize, max: usize) -> bool {
    let count = value.trim().chars().count();
    count >= min && count <= max
}

/// Strips every non-digit character.
pub fn contact_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Local calendar day used by date-range rules.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Data description of one field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Name,
    /// Calendar date, not in the future.
    PastDate,
    /// Calendar date, any range.
    Date,
    Category(&'static [&'static str]),
    Contact,
    Text { min: usize, max: usize },
    /// Integer epoch milliseconds.
    Timestamp,
}

impl Validator {
    /// Checks a raw text value.
    pub fn check_text(&self, value: &str) -> bool {
        match self {
            Self::Name => is_valid_name(value),
            Self::PastDate => is_valid_past_date(value),
            Self::Date => is_valid_date(value),
            Self::Category(allowed) => is_valid_category(value, allowed),
            Self::Contact => is_valid_contact(value),
            Self::Text { min, max } => is_valid_text(value, *min, *max),
            Self::Timestamp => false,
        }
    }

    /// Checks a storage value. `Null` passes only for optional fields.
    pub fn check(&self, value: &FieldValue, required: bool) -> bool {
        match (self, value) {
            (_, FieldValue::Null) => !required,
            (Self::Timestamp, FieldValue::Integer(_)) => true,
            (Self::Timestamp, FieldValue::Text(_)) => false,
            (_, FieldValue::Text(text)) => self.check_text(text),
            (_, FieldValue::Integer(_)) => false,
        }
    }
}

/// One `{field_name, validator}` pair of an entity's storage mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, also used as column / document key.
    pub name: &'static str,
    pub validator: Validator,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, validator: Validator) -> Self {
        Self {
            name,
            validator,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, validator: Validator) -> Self {
        Self {
            name,
            validator,
            required: false,
        }
    }

    pub fn accepts(&self, value: &FieldValue) -> bool {
        self.validator.check(value, self.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: &str) -> NaiveDate {
        parse_date(value).expect("test date should parse")
    }

    #[test]
    fn name_accepts_letters_spaces_hyphen_apostrophe() {
        assert!(is_valid_name("Jane"));
        assert!(is_valid_name("Mary-Jane O'Neil"));
        assert!(is_valid_name("  Al  "));
    }

    #[test]
    fn name_rejects_short_long_and_symbols() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("J"));
        assert!(!is_valid_name("   "));
        assert!(!is_valid_name("J4ne"));
        assert!(!is_valid_name(&"a".repeat(51)));
        assert!(is_valid_name(&"a".repeat(50)));
    }

    #[test]
    fn past_date_rejects_future_and_bad_format() {
        let today = day("2024-06-15");
        assert!(is_valid_past_date_on("2024-06-15", today));
        assert!(is_valid_past_date_on("1990-01-01", today));
        assert!(!is_valid_past_date_on("2024-06-16", today));
        assert!(!is_valid_past_date_on("15/06/2024", today));
        assert!(!is_valid_past_date_on("2024-02-30", today));
    }

    #[test]
    fn category_is_case_insensitive() {
        let allowed = &["male", "female", "other"];
        assert!(is_valid_category("Female", allowed));
        assert!(is_valid_category(" OTHER ", allowed));
        assert!(!is_valid_category("unknown", allowed));
        assert!(!is_valid_category("", allowed));
    }

    #[test]
    fn contact_counts_digits_only() {
        assert!(is_valid_contact("555-123-4567"));
        assert!(is_valid_contact("1234567"));
        assert!(!is_valid_contact("123-456"));
        assert!(is_valid_contact("+1 (234) 567-890-12345"));
        assert!(!is_valid_contact("1234567890123456"));
        assert_eq!(contact_digits("(555) 123-4567"), "5551234567");
    }

    #[test]
    fn validator_null_passes_only_optional_fields() {
        let spec = FieldSpec::optional("description", Validator::Text { min: 0, max: 10 });
        assert!(spec.accepts(&FieldValue::Null));
        let spec = FieldSpec::required("title", Validator::Text { min: 1, max: 10 });
        assert!(!spec.accepts(&FieldValue::Null));
        assert!(!spec.accepts(&FieldValue::Integer(3)));
        assert!(spec.accepts(&FieldValue::Text("ok".to_string())));
    }
}
