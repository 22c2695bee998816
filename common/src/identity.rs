use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RawRecord;

const PART_SEPARATOR: &str = "::";

/// Deduplication key built from the normalized company and title.
///
/// Location, description and URL never take part, so the same listing seen
/// on two platforms maps to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordIdentity(String);

impl RecordIdentity {
    pub fn from_parts(company: &str, title: &str) -> Self {
        Self(format!(
            "{}{}{}",
            normalize_part(company),
            PART_SEPARATOR,
            normalize_part(title)
        ))
    }

    pub fn of(record: &RawRecord) -> Self {
        Self::from_parts(&record.company, &record.title)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True when the text keeps at least one word after normalization.
pub(crate) fn has_identity_part(text: &str) -> bool {
    !normalize_part(text).is_empty()
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// "  Acme, Inc. " -> "acme_inc"
fn normalize_part(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}
