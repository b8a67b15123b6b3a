use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::CredentialField;

// ═══════════════════════════════════════════════════════════
// FieldMap
// ═══════════════════════════════════════════════════════════

/// Validated credential values, built up one field at a time.
///
/// Every insertion consumes the map and hands back the next snapshot, so a
/// value can never be rewritten behind a reader's back. Only values that
/// passed their field's validation rule should ever reach `with`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    values: BTreeMap<CredentialField, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: CredentialField, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn get(&self, field: CredentialField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: CredentialField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// CredentialFields
// ═══════════════════════════════════════════════════════════

/// Final output of one extraction: the parsed fields plus the raw text and
/// confidence they were parsed from. Absent fields are omitted when
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
    pub raw_text: String,
    pub confidence_score: f32,
}

impl CredentialFields {
    /// Assemble the output record. `raw_text` and `confidence_score` always
    /// come from the extraction, never from the parsed map.
    pub fn assemble(fields: &FieldMap, raw_text: impl Into<String>, confidence_score: f32) -> Self {
        let take = |f: CredentialField| fields.get(f).map(str::to_owned);
        Self {
            name: take(CredentialField::Name),
            roll_number: take(CredentialField::RollNumber),
            degree: take(CredentialField::Degree),
            issue_year: take(CredentialField::IssueYear),
            institution: take(CredentialField::Institution),
            grade: take(CredentialField::Grade),
            specialization: take(CredentialField::Specialization),
            certificate_number: take(CredentialField::CertificateNumber),
            raw_text: raw_text.into(),
            confidence_score,
        }
    }

    pub fn get(&self, field: CredentialField) -> Option<&str> {
        let slot = match field {
            CredentialField::Name => &self.name,
            CredentialField::RollNumber => &self.roll_number,
            CredentialField::Degree => &self.degree,
            CredentialField::IssueYear => &self.issue_year,
            CredentialField::Institution => &self.institution,
            CredentialField::Grade => &self.grade,
            CredentialField::Specialization => &self.specialization,
            CredentialField::CertificateNumber => &self.certificate_number,
        };
        slot.as_deref()
    }

    /// Number of credential fields that were found.
    pub fn found_count(&self) -> usize {
        CredentialField::ALL
            .iter()
            .filter(|f| self.get(**f).is_some())
            .count()
    }
}
