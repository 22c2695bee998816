use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FetchError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG: &str = "en-US,en;q=0.9";

/// Turns a URL into page text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// How every outgoing request is shaped, whichever source issues it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPolicy {
    pub timeout_secs: u64,
    pub user_agents: Vec<String>,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
            min_delay_ms: 500,
            max_delay_ms: 1500,
        }
    }
}

impl RequestPolicy {
    /// No politeness delay. Handy for tests and local fixtures.
    pub fn immediate() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pick_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }

    /// Random pause in `[min_delay_ms, max_delay_ms]`.
    pub fn jitter(&self) -> Duration {
        let (low, high) = if self.min_delay_ms <= self.max_delay_ms {
            (self.min_delay_ms, self.max_delay_ms)
        } else {
            (self.max_delay_ms, self.min_delay_ms)
        };
        if high == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(low..=high))
    }
}

/// Plain HTTP GET over a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RequestPolicy,
}

impl HttpFetcher {
    pub fn new(policy: RequestPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout())
            .build()?;
        Ok(Self { client, policy })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANG);
        if let Some(agent) = self.policy.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = request.send().await.map_err(|e| transport_error(url, e))?;
        let status = response.status();
        debug!("📡 {} -> {}", url, status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| transport_error(url, e))
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RequestPolicy {
            min_delay_ms: 10,
            max_delay_ms: 20,
            ..RequestPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.jitter();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_immediate_policy_has_no_delay() {
        assert_eq!(RequestPolicy::immediate().jitter(), Duration::ZERO);
    }

    #[test]
    fn test_user_agent_comes_from_list() {
        let policy = RequestPolicy::default();
        let agent = policy.pick_user_agent().unwrap();
        assert!(policy.user_agents.iter().any(|a| a == agent));
    }

    #[test]
    fn test_empty_agent_list_sends_default() {
        let policy = RequestPolicy {
            user_agents: vec![],
            ..RequestPolicy::default()
        };
        assert!(policy.pick_user_agent().is_none());
    }
}
