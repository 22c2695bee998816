//! Record types shared by every stage of the job aggregator.

mod identity;

pub use identity::RecordIdentity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A search request handed to every source. Empty fields broaden the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub title: String,
    pub location: String,
}

impl Query {
    pub fn new(title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            location: location.into(),
        }
    }
}

/// One listing as extracted from a source page, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary: String,
    pub posted_date: String,
    pub url: String,
}

impl RawRecord {
    /// Listings without a usable title or company never reach the classifier.
    /// A part made only of punctuation counts as missing.
    pub fn is_complete(&self) -> bool {
        identity::has_identity_part(&self.title) && identity::has_identity_part(&self.company)
    }

    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::of(self)
    }
}

/// What the classifier decided about a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_fresher: bool,
    pub is_remote: bool,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A record admitted exactly once per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRecord {
    pub id: RecordIdentity,
    #[serde(flatten)]
    pub record: RawRecord,
    #[serde(flatten)]
    pub classification: Classification,
    pub salary_min: Option<i64>,
    pub admitted_at: DateTime<Utc>,
}

impl AcceptedRecord {
    pub fn platform(&self) -> &str {
        &self.record.source
    }
}
