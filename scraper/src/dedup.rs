use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use common::{AcceptedRecord, Classification, RawRecord, RecordIdentity};

use crate::salary::minimum_salary;
use crate::store::{IdentityStore, DEFAULT_TTL};

/// Outcome of offering one classified record to the deduplicator.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(AcceptedRecord),
    Duplicate,
    LimitReached,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

#[derive(Default)]
struct Ledger {
    seen: HashSet<RecordIdentity>,
    accepted: Vec<AcceptedRecord>,
}

/// Owns the seen set and the current run's accepted records.
///
/// Membership check, cap check, insertion and append all happen under one
/// lock, so two workers racing on the same identity cannot both win.
pub struct Deduplicator {
    ledger: Mutex<Ledger>,
    limit: Option<usize>,
    store: Option<Arc<dyn IdentityStore>>,
    ttl: Duration,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            limit: None,
            store: None,
            ttl: DEFAULT_TTL,
        }
    }

    /// Caps the number of records accepted per run.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Extends the seen set across runs through a persisted store.
    pub fn with_store(mut self, store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        self.store = Some(store);
        self.ttl = ttl;
        self
    }

    pub fn admit_if_new(&self, record: RawRecord, classification: Classification) -> Admission {
        let id = record.identity();
        let mut ledger = self.lock();

        if ledger.seen.contains(&id) {
            return Admission::Duplicate;
        }
        if let Some(store) = &self.store {
            if store.exists(id.as_str()) {
                ledger.seen.insert(id);
                return Admission::Duplicate;
            }
        }
        if self.limit.is_some_and(|limit| ledger.accepted.len() >= limit) {
            return Admission::LimitReached;
        }

        if let Some(store) = &self.store {
            store.set(id.as_str(), self.ttl);
        }
        ledger.seen.insert(id.clone());

        let accepted = AcceptedRecord {
            id,
            salary_min: minimum_salary(&record.salary),
            record,
            classification,
            admitted_at: Utc::now(),
        };
        ledger.accepted.push(accepted.clone());
        Admission::Admitted(accepted)
    }

    pub fn limit_reached(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.lock().accepted.len() >= limit)
    }

    /// Drains the run's results. The seen set is kept.
    pub fn take_accepted(&self) -> Vec<AcceptedRecord> {
        std::mem::take(&mut self.lock().accepted)
    }

    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn flush_store(&self) -> crate::Result<()> {
        match &self.store {
            Some(store) => store.flush(),
            None => Ok(()),
        }
    }

    // The ledger is never left half-updated; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryIdentityStore;

    fn record(company: &str, title: &str, url: &str) -> RawRecord {
        RawRecord {
            source: "RemoteOK".to_string(),
            company: company.to_string(),
            title: title.to_string(),
            salary: "$45,000 - $65,000".to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_second_admission_is_duplicate() {
        let dedup = Deduplicator::new();
        let first = dedup.admit_if_new(record("Acme", "Intern", "a"), Classification::default());
        let second = dedup.admit_if_new(record("ACME", "intern", "b"), Classification::default());

        assert!(first.is_admitted());
        assert_eq!(second, Admission::Duplicate);
        assert_eq!(dedup.take_accepted().len(), 1);
    }

    #[test]
    fn test_admitted_record_carries_identity_and_salary() {
        let dedup = Deduplicator::new();
        let Admission::Admitted(accepted) =
            dedup.admit_if_new(record("Acme", "Junior Engineer", "a"), Classification::default())
        else {
            panic!("expected admission");
        };
        assert_eq!(accepted.id.as_str(), "acme::junior_engineer");
        assert_eq!(accepted.salary_min, Some(45000));
    }

    #[test]
    fn test_limit_stops_admission_without_consuming_identity() {
        let dedup = Deduplicator::new().with_limit(1);
        assert!(dedup
            .admit_if_new(record("Acme", "Intern", "a"), Classification::default())
            .is_admitted());
        assert_eq!(
            dedup.admit_if_new(record("Globex", "Intern", "b"), Classification::default()),
            Admission::LimitReached
        );
        assert!(dedup.limit_reached());

        // Next run: the capped record was never marked seen.
        assert_eq!(dedup.take_accepted().len(), 1);
        assert!(dedup
            .admit_if_new(record("Globex", "Intern", "b"), Classification::default())
            .is_admitted());
    }

    #[test]
    fn test_seen_set_survives_take() {
        let dedup = Deduplicator::new();
        dedup.admit_if_new(record("Acme", "Intern", "a"), Classification::default());
        dedup.take_accepted();

        assert_eq!(dedup.seen_count(), 1);
        assert_eq!(
            dedup.admit_if_new(record("Acme", "Intern", "a"), Classification::default()),
            Admission::Duplicate
        );
    }

    #[test]
    fn test_store_extends_seen_set() {
        let store = Arc::new(MemoryIdentityStore::new());
        store.set("acme::intern", DEFAULT_TTL);

        let dedup = Deduplicator::new().with_store(store.clone(), DEFAULT_TTL);
        assert_eq!(
            dedup.admit_if_new(record("Acme", "Intern", "a"), Classification::default()),
            Admission::Duplicate
        );
        assert!(dedup
            .admit_if_new(record("Globex", "Trainee", "b"), Classification::default())
            .is_admitted());
        assert!(store.exists("globex::trainee"));
    }

    #[test]
    fn test_concurrent_admissions_admit_once() {
        let dedup = Arc::new(Deduplicator::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dedup = Arc::clone(&dedup);
                std::thread::spawn(move || {
                    dedup
                        .admit_if_new(
                            record("Acme", "Junior Engineer", &format!("https://x/{i}")),
                            Classification::default(),
                        )
                        .is_admitted()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(admitted, 1);
    }
}
