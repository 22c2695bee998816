//! Source adapters.
//!
//! Every platform is described by a [`SourceConfig`]: a search URL template
//! plus a set of CSS extraction rules. One generic [`SelectorSource`] turns
//! that description into records, so adding a platform is a config change.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use common::{Query, RawRecord, RecordIdentity};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::classifier::RelevancePolicy;
use crate::error::{ConfigError, FetchError};
use crate::fetcher::PageFetcher;

/// Fetches candidate records from one platform.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Which classifier checks this source's records must pass.
    fn policy(&self) -> RelevancePolicy;

    /// Every listing on this board is remote, whatever its location says.
    fn remote_only(&self) -> bool {
        false
    }

    async fn fetch(&self, pages: &dyn PageFetcher, query: &Query)
        -> Result<Vec<RawRecord>, FetchError>;
}

/// Where to find one field inside a listing element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub selector: String,
    /// Read this attribute instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: None,
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// One match per listing.
    pub container: String,
    pub title: FieldRule,
    pub company: FieldRule,
    #[serde(default)]
    pub location: Option<FieldRule>,
    #[serde(default)]
    pub description: Option<FieldRule>,
    #[serde(default)]
    pub salary: Option<FieldRule>,
    #[serde(default)]
    pub posted_date: Option<FieldRule>,
    #[serde(default)]
    pub link: Option<FieldRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// `{title}`, `{location}` and `{page}` are substituted, the first two
    /// percent-encoded.
    pub search_url: String,
    #[serde(default)]
    pub first_page: u32,
    #[serde(default = "page_step")]
    pub page_step: u32,
    #[serde(default = "max_pages")]
    pub max_pages: u32,
    /// Ceiling on records collected across all pages of one fetch.
    #[serde(default)]
    pub max_records: Option<usize>,
    /// Pause between page requests of this source.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub policy: RelevancePolicy,
    /// Selector that must be present on a well-formed results page.
    #[serde(default)]
    pub page_marker: Option<String>,
    /// Used when the listing has no location of its own.
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub remote_only: bool,
    pub selectors: Selectors,
}

fn enabled() -> bool {
    true
}

fn page_step() -> u32 {
    1
}

fn max_pages() -> u32 {
    1
}

impl SourceConfig {
    pub fn page_url(&self, query: &Query, page_index: u32) -> String {
        let page = self.first_page + page_index * self.page_step;
        self.search_url
            .replace("{title}", &encode(&query.title))
            .replace("{location}", &encode(&query.location))
            .replace("{page}", &page.to_string())
    }

    fn paginates(&self) -> bool {
        self.search_url.contains("{page}")
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.trim().as_bytes()).collect()
}

struct CompiledRule {
    selector: Selector,
    attr: Option<String>,
}

impl CompiledRule {
    fn extract(&self, element: &ElementRef<'_>) -> Option<String> {
        let found = element.select(&self.selector).next()?;
        let value = match &self.attr {
            Some(attr) => found.value().attr(attr)?.to_string(),
            None => found.text().collect::<Vec<_>>().join(" "),
        };
        let value = sanitize_text(&value);
        (!value.is_empty()).then_some(value)
    }
}

struct CompiledSelectors {
    container: Selector,
    title: CompiledRule,
    company: CompiledRule,
    location: Option<CompiledRule>,
    description: Option<CompiledRule>,
    salary: Option<CompiledRule>,
    posted_date: Option<CompiledRule>,
    link: Option<CompiledRule>,
    page_marker: Option<Selector>,
}

/// The one adapter implementation, driven entirely by its config.
pub struct SelectorSource {
    config: SourceConfig,
    compiled: CompiledSelectors,
}

impl SelectorSource {
    pub fn new(config: SourceConfig) -> Result<Self, ConfigError> {
        let compile = |selector: &str| -> Result<Selector, ConfigError> {
            Selector::parse(selector).map_err(|e| ConfigError::Selector {
                source_name: config.name.clone(),
                selector: selector.to_string(),
                reason: format!("{:?}", e),
            })
        };
        let rule = |r: &FieldRule| -> Result<CompiledRule, ConfigError> {
            Ok(CompiledRule {
                selector: compile(&r.selector)?,
                attr: r.attr.clone(),
            })
        };
        let optional = |r: &Option<FieldRule>| r.as_ref().map(&rule).transpose();

        let s = &config.selectors;
        let compiled = CompiledSelectors {
            container: compile(&s.container)?,
            title: rule(&s.title)?,
            company: rule(&s.company)?,
            location: optional(&s.location)?,
            description: optional(&s.description)?,
            salary: optional(&s.salary)?,
            posted_date: optional(&s.posted_date)?,
            link: optional(&s.link)?,
            page_marker: config.page_marker.as_deref().map(&compile).transpose()?,
        };

        Ok(Self { config, compiled })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Extracts every listing on one results page.
    pub fn parse_page(&self, html: &str, page_url: &str) -> Result<Vec<RawRecord>, FetchError> {
        if html.trim().is_empty() {
            return Err(FetchError::Parse {
                url: page_url.to_string(),
                reason: "empty page".to_string(),
            });
        }

        let document = Html::parse_document(html);

        if let Some(marker) = &self.compiled.page_marker {
            if document.select(marker).next().is_none() {
                return Err(FetchError::Parse {
                    url: page_url.to_string(),
                    reason: format!(
                        "marker '{}' not found",
                        self.config.page_marker.as_deref().unwrap_or_default()
                    ),
                });
            }
        }

        let base = Url::parse(page_url).ok();
        let c = &self.compiled;
        let field = |rule: &Option<CompiledRule>, element: &ElementRef<'_>| {
            rule.as_ref()
                .and_then(|r| r.extract(element))
                .unwrap_or_default()
        };

        let records = document
            .select(&c.container)
            .map(|element| {
                let location = c
                    .location
                    .as_ref()
                    .and_then(|r| r.extract(&element))
                    .or_else(|| self.config.default_location.clone())
                    .unwrap_or_default();

                let url = c
                    .link
                    .as_ref()
                    .and_then(|r| r.extract(&element))
                    .map(|href| resolve_link(base.as_ref(), &href))
                    .unwrap_or_else(|| page_url.to_string());

                RawRecord {
                    source: self.config.name.clone(),
                    title: c.title.extract(&element).unwrap_or_default(),
                    company: c.company.extract(&element).unwrap_or_default(),
                    location,
                    description: field(&c.description, &element),
                    salary: field(&c.salary, &element),
                    posted_date: field(&c.posted_date, &element),
                    url,
                }
            })
            .filter(|record| {
                if !record.is_complete() {
                    debug!("Skipping incomplete listing on {}", page_url);
                }
                record.is_complete()
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl SourceAdapter for SelectorSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn policy(&self) -> RelevancePolicy {
        self.config.policy
    }

    fn remote_only(&self) -> bool {
        self.config.remote_only
    }

    async fn fetch(
        &self,
        pages: &dyn PageFetcher,
        query: &Query,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let page_count = if self.config.paginates() {
            self.config.max_pages.max(1)
        } else {
            1
        };
        let ceiling = self.config.max_records.unwrap_or(usize::MAX);

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for page_index in 0..page_count {
            if page_index > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }

            let url = self.config.page_url(query, page_index);
            info!("📡 [{}] Fetching page {}: {}", self.config.name, page_index + 1, url);
            let page = pages
                .fetch_page(&url)
                .await
                .and_then(|html| self.parse_page(&html, &url));

            // Only a failing first page fails the fetch; later pages keep what we have.
            let parsed = match page {
                Ok(parsed) => parsed,
                Err(e) if page_index == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        "⚠️  [{}] Page {} failed, keeping {} listings: {}",
                        self.config.name,
                        page_index + 1,
                        records.len(),
                        e
                    );
                    break;
                }
            };

            let fresh: Vec<_> = parsed
                .into_iter()
                .filter(|record| seen.insert((RecordIdentity::of(record), record.url.clone())))
                .collect();

            if fresh.is_empty() {
                debug!("[{}] Page {} added nothing new, stopping", self.config.name, page_index + 1);
                break;
            }

            let room = ceiling.saturating_sub(records.len());
            records.extend(fresh.into_iter().take(room));
            if records.len() >= ceiling {
                debug!("[{}] Record ceiling {} reached", self.config.name, ceiling);
                break;
            }
        }

        info!("✅ [{}] {} listings found", self.config.name, records.len());
        Ok(records)
    }
}

fn resolve_link(base: Option<&Url>, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Trims and collapses internal whitespace, including newlines and tabs.
pub fn sanitize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms;

    const INDEED_PAGE: &str = r#"
        <html><body><div id="mosaic-provider-jobcards">
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><a href="/viewjob?jk=1"><span>Junior   Software Engineer</span></a></h2>
            <span class="companyName">TechCorp</span>
            <div class="companyLocation">Remote</div>
            <div class="job-snippet">Entry level,
                remote friendly</div>
            <div class="salary-snippet">$50,000 - $70,000</div>
            <span class="date">Posted 2 days ago</span>
          </div>
          <div class="job_seen_beacon">
            <h2 class="jobTitle"><a href="/viewjob?jk=2"><span>Data Analyst</span></a></h2>
            <span class="companyName"></span>
          </div>
        </div></body></html>
    "#;

    fn indeed() -> SelectorSource {
        let config = platforms::defaults()
            .into_iter()
            .find(|c| c.name == "Indeed")
            .unwrap();
        SelectorSource::new(config).unwrap()
    }

    #[test]
    fn test_page_url_encodes_query() {
        let source = indeed();
        let url = source
            .config()
            .page_url(&Query::new("junior developer", "New York, NY"), 2);
        assert_eq!(
            url,
            "https://www.indeed.com/jobs?q=junior+developer&l=New+York%2C+NY&start=20"
        );
    }

    #[test]
    fn test_parse_page_extracts_fields() {
        let source = indeed();
        let records = source
            .parse_page(INDEED_PAGE, "https://www.indeed.com/jobs?q=junior")
            .unwrap();

        // The second card has no company and is dropped.
        assert_eq!(records.len(), 1);
        let job = &records[0];
        assert_eq!(job.source, "Indeed");
        assert_eq!(job.title, "Junior Software Engineer");
        assert_eq!(job.company, "TechCorp");
        assert_eq!(job.location, "Remote");
        assert_eq!(job.description, "Entry level, remote friendly");
        assert_eq!(job.salary, "$50,000 - $70,000");
        assert_eq!(job.posted_date, "Posted 2 days ago");
        assert_eq!(job.url, "https://www.indeed.com/viewjob?jk=1");
    }

    #[test]
    fn test_missing_marker_is_parse_failure() {
        let source = indeed();
        let err = source
            .parse_page("<html><body><p>captcha</p></body></html>", "https://www.indeed.com/jobs")
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_empty_page_is_parse_failure() {
        let source = indeed();
        assert!(matches!(
            source.parse_page("   ", "https://www.indeed.com/jobs"),
            Err(FetchError::Parse { .. })
        ));
    }

    #[test]
    fn test_default_location_applies() {
        let config = platforms::defaults()
            .into_iter()
            .find(|c| c.name == "RemoteOK")
            .unwrap();
        let source = SelectorSource::new(config).unwrap();
        let html = r#"<table><tr class="job">
            <td class="company"><a href="/remote-jobs/1"><h2>Junior Dev</h2></a><h3>Acme</h3></td>
        </tr></table>"#;
        let records = source.parse_page(html, "https://remoteok.com/remote-dev-jobs").unwrap();
        assert_eq!(records[0].location, "Remote");
        assert_eq!(records[0].url, "https://remoteok.com/remote-jobs/1");
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = platforms::defaults().remove(0);
        config.selectors.container = "div[".to_string();
        assert!(matches!(
            SelectorSource::new(config),
            Err(ConfigError::Selector { .. })
        ));
    }
}
