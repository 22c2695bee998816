//! Remote fresher job aggregator.
//!
//! Sources are fetched concurrently under one shared rate limit, every
//! listing is classified, and each job identity is admitted at most once.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod notify;
pub mod platforms;
pub mod salary;
pub mod source;
pub mod store;
pub mod writer;

pub use aggregator::{Aggregator, AggregatorSettings, RunOutcome, RunSummary, SourceReport};
pub use classifier::{Classifier, KeywordSet, RelevancePolicy};
pub use config::AppConfig;
pub use dedup::{Admission, Deduplicator};
pub use error::{ConfigError, Error, FetchError, NotifyError, Result};
pub use fetcher::{HttpFetcher, PageFetcher, RequestPolicy};
pub use source::{SelectorSource, SourceAdapter, SourceConfig};
