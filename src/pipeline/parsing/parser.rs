use tracing::debug;

use super::clean::{clean_value, validate_candidate};
use super::patterns::{FieldRules, FIELD_RULES, INSTITUTION_FALLBACK, SUBJECT_CLAUSE};
use crate::models::{CredentialField, CredentialFields, FieldMap};
use crate::pipeline::extraction::RawExtraction;

/// Fallback institution candidates must be longer than this once cleaned.
const MIN_FALLBACK_INSTITUTION_CHARS: usize = 10;

/// Longer fallback candidates are running text, not a name.
const MAX_FALLBACK_INSTITUTION_CHARS: usize = 100;

/// Turns raw certificate text into validated credential fields.
///
/// Stateless: the same text always yields the same map.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldParser;

impl FieldParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> FieldMap {
        let fields = FIELD_RULES.iter().fold(FieldMap::new(), |fields, rules| {
            match first_accepted(rules, text) {
                Some(value) => fields.with(rules.field, value),
                None => fields,
            }
        });
        let fields = fill_institution_fallback(fields, text);
        let fields = split_specialization(fields);

        debug!(found = fields.len(), "Parsed credential fields");
        fields
    }

    /// Parse an extraction and assemble the final record around it.
    pub fn parse_extraction(&self, extraction: &RawExtraction) -> CredentialFields {
        let fields = self.parse(&extraction.text);
        CredentialFields::assemble(&fields, extraction.text.clone(), extraction.confidence)
    }
}

/// First pattern whose first match survives cleaning and validation.
fn first_accepted(rules: &FieldRules, text: &str) -> Option<String> {
    rules.patterns.iter().enumerate().find_map(|(index, pattern)| {
        let candidate = pattern.captures(text)?.get(1)?.as_str();
        let accepted = validate_candidate(rules.field, &clean_value(candidate));
        if accepted.is_none() {
            debug!(field = %rules.field, pattern = index, "Candidate rejected");
        }
        accepted
    })
}

/// Broad scan for any fragment mentioning a university, college or
/// institute, used only when no institution pattern matched.
fn fill_institution_fallback(fields: FieldMap, text: &str) -> FieldMap {
    if fields.contains(CredentialField::Institution) {
        return fields;
    }
    let found = INSTITUTION_FALLBACK.iter().find_map(|pattern| {
        pattern.captures_iter(text).find_map(|caps| {
            let cleaned = clean_value(caps.get(1)?.as_str());
            let chars = cleaned.chars().count();
            (chars > MIN_FALLBACK_INSTITUTION_CHARS && chars <= MAX_FALLBACK_INSTITUTION_CHARS)
                .then_some(cleaned)
        })
    });
    match found {
        Some(institution) => fields.with(CredentialField::Institution, institution),
        None => fields,
    }
}

/// Move a trailing "in X" / "of X" clause from the degree into the
/// specialization. The last clause whose subject is plain words wins; the
/// degree is left alone if splitting would empty it.
fn split_specialization(fields: FieldMap) -> FieldMap {
    if fields.contains(CredentialField::Specialization) {
        return fields;
    }
    let Some(degree) = fields.get(CredentialField::Degree) else {
        return fields;
    };

    let split = SUBJECT_CLAUSE
        .find_iter(degree)
        .filter_map(|clause| {
            let subject = degree[clause.end()..].trim();
            let program = degree[..clause.start()].trim();
            let plain = subject
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || "&()".contains(c));
            (plain && !subject.is_empty() && !program.is_empty())
                .then(|| (program.to_string(), subject.to_string()))
        })
        .last();

    match split {
        Some((program, subject)) => fields
            .with(CredentialField::Degree, program)
            .with(CredentialField::Specialization, subject),
        None => fields,
    }
}
