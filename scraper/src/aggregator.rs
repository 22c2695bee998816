//! Concurrent fetch, classify and deduplicate across all sources.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AcceptedRecord, Query, RawRecord};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::dedup::{Admission, Deduplicator};
use crate::error::{ConfigError, FetchError};
use crate::fetcher::{PageFetcher, RequestPolicy};
use crate::source::SourceAdapter;

type SharedRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket shared by every source: `burst` requests at once, then one
/// more per `period_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub period_ms: u64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            burst: 3,
        }
    }
}

impl RateLimitConfig {
    fn quota(&self) -> Result<Quota, ConfigError> {
        let burst = NonZeroU32::new(self.burst)
            .ok_or_else(|| ConfigError::Invalid("rate_limit.burst must be at least 1".into()))?;
        let quota = Quota::with_period(Duration::from_millis(self.period_ms))
            .ok_or_else(|| ConfigError::Invalid("rate_limit.period_ms must be at least 1".into()))?;
        Ok(quota.allow_burst(burst))
    }
}

/// Linear backoff: the n-th retry waits `backoff_ms * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatorSettings {
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub request: RequestPolicy,
}

/// What happened to one source during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    pub fetched: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub capped: bool,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    /// Admission order, which follows task interleaving.
    pub records: Vec<AcceptedRecord>,
    pub reports: Vec<SourceReport>,
}

impl RunOutcome {
    /// Deterministic order: platform, then title, then company.
    pub fn sort_by_platform(&mut self) {
        self.records.sort_by(|a, b| {
            (a.platform(), &a.record.title, &a.record.company).cmp(&(
                b.platform(),
                &b.record.title,
                &b.record.company,
            ))
        });
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::of(&self.records)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub by_platform: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn of(records: &[AcceptedRecord]) -> Self {
        let mut by_platform = BTreeMap::new();
        for record in records {
            *by_platform.entry(record.platform().to_string()).or_insert(0) += 1;
        }
        Self {
            total: records.len(),
            by_platform,
        }
    }

    pub fn log(&self) {
        info!("{}", "=".repeat(60));
        info!("📊 Total jobs found: {}", self.total);
        for (platform, count) in &self.by_platform {
            info!("  • {:<15}: {} jobs", platform, count);
        }
        info!("{}", "=".repeat(60));
    }
}

struct Shared {
    fetcher: Arc<dyn PageFetcher>,
    limiter: SharedRateLimiter,
    classifier: Classifier,
    dedup: Arc<Deduplicator>,
    retry: RetryPolicy,
    request: RequestPolicy,
}

pub struct Aggregator {
    shared: Arc<Shared>,
}

impl Aggregator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        classifier: Classifier,
        dedup: Arc<Deduplicator>,
        settings: AggregatorSettings,
    ) -> Result<Self, ConfigError> {
        if settings.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be at least 1".into()));
        }
        let limiter = RateLimiter::direct(settings.rate_limit.quota()?);

        Ok(Self {
            shared: Arc::new(Shared {
                fetcher,
                limiter,
                classifier,
                dedup,
                retry: settings.retry,
                request: settings.request,
            }),
        })
    }

    pub fn deduplicator(&self) -> &Deduplicator {
        &self.shared.dedup
    }

    /// Runs every adapter concurrently and waits for all of them.
    ///
    /// On cancellation in-flight fetches are dropped and whatever was already
    /// admitted is returned.
    pub async fn run(
        &mut self,
        query: &Query,
        adapters: &[Arc<dyn SourceAdapter>],
        cancel: &CancellationToken,
    ) -> RunOutcome {
        info!(
            "🔍 Searching {} sources for '{}' in '{}'",
            adapters.len(),
            query.title,
            query.location
        );

        let mut tasks = JoinSet::new();
        for adapter in adapters {
            let shared = Arc::clone(&self.shared);
            let adapter = Arc::clone(adapter);
            let query = query.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let mut cancelled = SourceReport::new(adapter.name());
                cancelled.cancelled = true;

                // Polled in order: an already cancelled token wins before any work starts.
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!("🛑 [{}] Cancelled", cancelled.source);
                        cancelled
                    }
                    report = collect(shared, adapter, query) => report,
                }
            });
        }

        let mut reports = Vec::with_capacity(adapters.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => warn!("❌ Source task failed: {}", e),
            }
        }

        let records = self.shared.dedup.take_accepted();
        info!("✨ Run complete: {} new records", records.len());
        RunOutcome { records, reports }
    }
}

/// Applies request shaping and the shared token bucket to every page request.
struct Throttled<'a> {
    shared: &'a Shared,
}

#[async_trait]
impl PageFetcher for Throttled<'_> {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let pause = self.shared.request.jitter();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        self.shared.limiter.until_ready().await;
        self.shared.fetcher.fetch_page(url).await
    }
}

async fn collect(shared: Arc<Shared>, adapter: Arc<dyn SourceAdapter>, query: Query) -> SourceReport {
    let mut report = SourceReport::new(adapter.name());

    let records = match fetch_with_retry(&shared, adapter.as_ref(), &query).await {
        Ok(records) => records,
        Err(e) => {
            warn!("❌ [{}] {}", adapter.name(), e);
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.fetched = records.len();

    let policy = adapter.policy();
    let remote_only = adapter.remote_only();
    for record in records {
        if !record.is_complete() {
            report.rejected += 1;
            continue;
        }
        // Classify first: a rejected record must never take a dedup slot.
        let Some(classification) = shared
            .classifier
            .classify_for(&record, policy, remote_only)
        else {
            debug!("[{}] Rejected: {} at {}", adapter.name(), record.title, record.company);
            report.rejected += 1;
            continue;
        };

        match shared.dedup.admit_if_new(record, classification) {
            Admission::Admitted(accepted) => {
                info!(
                    "✅ Found: {} at {} ({})",
                    accepted.record.title,
                    accepted.record.company,
                    accepted.platform()
                );
                report.accepted += 1;
            }
            Admission::Duplicate => report.duplicates += 1,
            Admission::LimitReached => {
                info!("[{}] Record cap reached, ignoring the rest", adapter.name());
                report.capped = true;
                break;
            }
        }
    }

    report
}

async fn fetch_with_retry(
    shared: &Shared,
    adapter: &dyn SourceAdapter,
    query: &Query,
) -> Result<Vec<RawRecord>, FetchError> {
    let pages = Throttled { shared };
    let mut attempt = 1;

    loop {
        match adapter.fetch(&pages, query).await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_transient() && attempt < shared.retry.attempts => {
                let backoff = shared.retry.backoff(attempt);
                warn!(
                    "⚠️  [{}] Attempt {}/{} failed: {}. Retrying in {:?}",
                    adapter.name(),
                    attempt,
                    shared.retry.attempts,
                    e,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly() {
        let retry = RetryPolicy {
            attempts: 3,
            backoff_ms: 100,
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
    }

    #[test]
    fn test_zero_burst_rejected() {
        let config = RateLimitConfig {
            period_ms: 1000,
            burst: 0,
        };
        assert!(config.quota().is_err());
    }

    fn accepted(platform: &str, title: &str, company: &str) -> AcceptedRecord {
        let record = RawRecord {
            source: platform.to_string(),
            title: title.to_string(),
            company: company.to_string(),
            ..Default::default()
        };
        AcceptedRecord {
            id: record.identity(),
            record,
            classification: Default::default(),
            salary_min: None,
            admitted_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_sort_and_summary() {
        let mut outcome = RunOutcome {
            records: vec![
                accepted("RemoteOK", "Intern", "Zeta"),
                accepted("Indeed", "Trainee", "Acme"),
                accepted("Indeed", "Intern", "Beta"),
            ],
            reports: Vec::new(),
        };
        outcome.sort_by_platform();

        let order: Vec<_> = outcome
            .records
            .iter()
            .map(|r| (r.platform(), r.record.title.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("Indeed", "Intern"), ("Indeed", "Trainee"), ("RemoteOK", "Intern")]
        );

        let summary = outcome.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_platform.get("Indeed"), Some(&2));
        assert_eq!(summary.by_platform.get("RemoteOK"), Some(&1));
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = RateLimitConfig {
            period_ms: 0,
            burst: 1,
        };
        assert!(config.quota().is_err());
    }
}
