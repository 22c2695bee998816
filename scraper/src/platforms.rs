//! Built-in platform descriptions used when the config file lists none.

use crate::classifier::RelevancePolicy;
use crate::source::{FieldRule, Selectors, SourceConfig};

pub fn defaults() -> Vec<SourceConfig> {
    vec![indeed(), linkedin(), remote_ok(), we_work_remotely()]
}

fn indeed() -> SourceConfig {
    SourceConfig {
        name: "Indeed".to_string(),
        enabled: true,
        search_url: "https://www.indeed.com/jobs?q={title}&l={location}&start={page}".to_string(),
        first_page: 0,
        page_step: 10,
        max_pages: 3,
        max_records: Some(150),
        delay_ms: 2000,
        policy: RelevancePolicy::FresherAndRemote,
        page_marker: Some("#mosaic-provider-jobcards".to_string()),
        default_location: None,
        remote_only: false,
        selectors: Selectors {
            container: ".job_seen_beacon".to_string(),
            title: FieldRule::text(".jobTitle"),
            company: FieldRule::text(".companyName, [data-testid=\"company-name\"]"),
            location: Some(FieldRule::text(".companyLocation, [data-testid=\"text-location\"]")),
            description: Some(FieldRule::text(".job-snippet")),
            salary: Some(FieldRule::text(".salary-snippet, .salaryText")),
            posted_date: Some(FieldRule::text(".date")),
            link: Some(FieldRule::attr(".jobTitle a", "href")),
        },
    }
}

fn linkedin() -> SourceConfig {
    SourceConfig {
        name: "LinkedIn".to_string(),
        enabled: true,
        search_url:
            "https://www.linkedin.com/jobs/search?keywords={title}&location={location}&f_E=1,2&start={page}"
                .to_string(),
        first_page: 0,
        page_step: 25,
        max_pages: 2,
        max_records: Some(100),
        delay_ms: 2000,
        policy: RelevancePolicy::FresherAndRemote,
        page_marker: None,
        default_location: None,
        remote_only: false,
        selectors: Selectors {
            container: ".base-card".to_string(),
            title: FieldRule::text(".base-search-card__title"),
            company: FieldRule::text(".base-search-card__subtitle"),
            location: Some(FieldRule::text(".job-search-card__location")),
            description: Some(FieldRule::text(".job-search-card__snippet")),
            salary: Some(FieldRule::text(".job-search-card__salary-info")),
            posted_date: Some(FieldRule::attr("time", "datetime")),
            link: Some(FieldRule::attr("a.base-card__full-link", "href")),
        },
    }
}

// Everything on RemoteOK is remote, so only the experience check applies.
fn remote_ok() -> SourceConfig {
    SourceConfig {
        name: "RemoteOK".to_string(),
        enabled: true,
        search_url: "https://remoteok.com/remote-dev-jobs?search={title}".to_string(),
        first_page: 0,
        page_step: 1,
        max_pages: 1,
        max_records: None,
        delay_ms: 0,
        policy: RelevancePolicy::Fresher,
        page_marker: None,
        default_location: Some("Remote".to_string()),
        remote_only: true,
        selectors: Selectors {
            container: "tr.job".to_string(),
            title: FieldRule::text("td.company h2"),
            company: FieldRule::text("td.company h3"),
            location: Some(FieldRule::text("td.company .location")),
            description: Some(FieldRule::text("td.company .description")),
            salary: Some(FieldRule::text("td.salary")),
            posted_date: Some(FieldRule::attr("td.time time", "datetime")),
            link: Some(FieldRule::attr("td.company a", "href")),
        },
    }
}

fn we_work_remotely() -> SourceConfig {
    SourceConfig {
        name: "WeWorkRemotely".to_string(),
        enabled: true,
        search_url: "https://weworkremotely.com/remote-jobs/search?term={title}".to_string(),
        first_page: 0,
        page_step: 1,
        max_pages: 1,
        max_records: None,
        delay_ms: 0,
        policy: RelevancePolicy::Fresher,
        page_marker: None,
        default_location: Some("Remote".to_string()),
        remote_only: true,
        selectors: Selectors {
            container: "li.feature, .new-listing-container".to_string(),
            title: FieldRule::text(".new-listing__header__title"),
            company: FieldRule::text(".new-listing__company-name"),
            location: Some(FieldRule::text(".new-listing__company-headquarters")),
            description: Some(FieldRule::text(".new-listing__categories")),
            salary: None,
            posted_date: Some(FieldRule::text(".new-listing__header__icons__date")),
            link: Some(FieldRule::attr(".listing-link--unlocked, ._blank", "href")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SelectorSource;

    #[test]
    fn test_all_defaults_compile() {
        for config in defaults() {
            let name = config.name.clone();
            assert!(SelectorSource::new(config).is_ok(), "{name} failed to compile");
        }
    }

    #[test]
    fn test_remote_boards_are_remote_only() {
        for config in defaults() {
            let expected = matches!(config.name.as_str(), "RemoteOK" | "WeWorkRemotely");
            assert_eq!(config.remote_only, expected, "{}", config.name);
        }
    }

    #[test]
    fn test_default_names_are_unique() {
        let mut names: Vec<_> = defaults().into_iter().map(|c| c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
    }
}
