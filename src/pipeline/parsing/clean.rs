//! Candidate cleaning and per-field validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::CredentialField;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Anything outside word characters, whitespace and `. - / ( ) &`.
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.\-/()&]").unwrap());

static ROLL_NUMBER_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9/\-]{2,20}$").unwrap());

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:19|20)\d{2}").unwrap());

/// Leading honorifics, possibly stacked ("Dr. Mrs.").
static HONORIFICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:(?:mrs|mr|ms|miss|dr|prof)\b\.?\s*)+").unwrap());

pub const MIN_ISSUE_YEAR: u16 = 1950;
pub const MAX_ISSUE_YEAR: u16 = 2030;
pub const MAX_NAME_CHARS: usize = 50;

/// Drop disallowed characters, collapse whitespace runs, trim.
///
/// Stripping comes first so a symbol standing alone between words leaves a
/// single space behind, and cleaning an already-clean value is a no-op.
pub fn clean_value(raw: &str) -> String {
    let stripped = DISALLOWED.replace_all(raw, "");
    WHITESPACE_RUN.replace_all(&stripped, " ").trim().to_string()
}

/// Field-specific acceptance check on an already-cleaned value.
/// Returns the value to store, or `None` to reject the candidate.
pub fn validate_candidate(field: CredentialField, cleaned: &str) -> Option<String> {
    if cleaned.is_empty() {
        return None;
    }
    match field {
        CredentialField::RollNumber => {
            ROLL_NUMBER_SHAPE.is_match(cleaned).then(|| cleaned.to_string())
        }
        CredentialField::IssueYear => YEAR
            .find(cleaned)
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .filter(|year| (MIN_ISSUE_YEAR..=MAX_ISSUE_YEAR).contains(year))
            .map(|year| year.to_string()),
        CredentialField::Name => {
            let name = HONORIFICS.replace(cleaned, "");
            let name = name.trim();
            (!name.is_empty() && name.chars().count() <= MAX_NAME_CHARS)
                .then(|| name.to_string())
        }
        _ => Some(cleaned.to_string()),
    }
}
