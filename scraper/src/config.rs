//! Application configuration loaded from a JSON file.
//!
//! Every section is optional. A missing file yields the built-in defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::{AggregatorSettings, RateLimitConfig, RetryPolicy};
use crate::classifier::{default_skills, Classifier, KeywordSet};
use crate::error::ConfigError;
use crate::fetcher::RequestPolicy;
use crate::notify::NotificationConfig;
use crate::platforms;
use crate::source::{SelectorSource, SourceAdapter, SourceConfig};

pub const DEFAULT_CONFIG_PATH: &str = "scraper.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeenStoreConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub ttl_days: u64,
}

impl Default for SeenStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/seen_jobs.json"),
            ttl_days: 7,
        }
    }
}

impl SeenStoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_days.saturating_mul(24 * 60 * 60))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rate_limit: RateLimitConfig,
    pub request: RequestPolicy,
    pub retry: RetryPolicy,
    pub keywords: KeywordSet,
    pub skills: Vec<String>,
    pub sources: Vec<SourceConfig>,
    pub notifications: NotificationConfig,
    pub seen_store: SeenStoreConfig,
    /// Cap on records admitted by one run.
    pub max_records: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            request: RequestPolicy::default(),
            retry: RetryPolicy::default(),
            keywords: KeywordSet::default(),
            skills: default_skills(),
            sources: platforms::defaults(),
            notifications: NotificationConfig::default(),
            seen_store: SeenStoreConfig::default(),
            max_records: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("⚙️  No config at {}, using defaults", shown);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: shown,
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        info!("⚙️  Loaded config from {}", shown);
        Ok(config)
    }

    /// Checks everything that can be checked before the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.keywords.clone().normalized().validate()?;

        if self.rate_limit.burst == 0 {
            return Err(ConfigError::Invalid("rate_limit.burst must be at least 1".into()));
        }
        if self.rate_limit.period_ms == 0 {
            return Err(ConfigError::Invalid("rate_limit.period_ms must be at least 1".into()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be at least 1".into()));
        }
        if self.request.min_delay_ms > self.request.max_delay_ms {
            return Err(ConfigError::Invalid(
                "request.min_delay_ms must not exceed request.max_delay_ms".into(),
            ));
        }
        if !self.sources.iter().any(|source| source.enabled) {
            return Err(ConfigError::Invalid("no enabled sources".into()));
        }
        if self.max_records == Some(0) {
            return Err(ConfigError::Invalid("max_records must be at least 1".into()));
        }

        self.notifications.validate()
    }

    pub fn classifier(&self) -> Result<Classifier, ConfigError> {
        Classifier::new(self.keywords.clone(), self.skills.clone())
    }

    /// One adapter per enabled source, selectors compiled up front.
    pub fn adapters(&self) -> Result<Vec<Arc<dyn SourceAdapter>>, ConfigError> {
        self.sources
            .iter()
            .filter(|source| source.enabled)
            .map(|source| {
                SelectorSource::new(source.clone())
                    .map(|adapter| Arc::new(adapter) as Arc<dyn SourceAdapter>)
            })
            .collect()
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            rate_limit: self.rate_limit,
            retry: self.retry,
            request: self.request.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sources.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scraper.json");
        fs::write(
            &path,
            r#"{ "rate_limit": { "burst": 5 }, "retry": { "attempts": 2 }, "max_records": 40 }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.rate_limit.burst, 5);
        assert_eq!(config.rate_limit.period_ms, 1000);
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.retry.backoff_ms, 2000);
        assert_eq!(config.max_records, Some(40));
        assert_eq!(config.seen_store.ttl(), crate::store::DEFAULT_TTL);
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scraper.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overlapping_keywords_rejected() {
        let mut config = AppConfig::default();
        config.keywords.exclude.push("Junior".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlappingKeywords { .. })
        ));
    }

    #[test]
    fn test_all_sources_disabled_rejected() {
        let mut config = AppConfig::default();
        for source in &mut config.sources {
            source.enabled = false;
        }
        assert!(config.validate().is_err());
        assert!(config.adapters().unwrap().is_empty());
    }

    #[test]
    fn test_adapters_skip_disabled_sources() {
        let mut config = AppConfig::default();
        config.sources[0].enabled = false;
        let adapters = config.adapters().unwrap();
        assert_eq!(adapters.len(), 3);
        assert!(adapters.iter().all(|a| a.name() != "Indeed"));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let mut config = AppConfig::default();
        config.retry.attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
