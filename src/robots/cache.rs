//! Process-wide robots.txt cache
//!
//! One entry per origin, fetched at most once and kept for the lifetime of the
//! process. Concurrent first queries for the same origin share a single fetch.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::origin_key;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

/// Robots policy cached for one origin
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// `scheme://host[:port]` the policy applies to
    pub origin: String,

    /// The parsed rules (allow-all when robots.txt was unavailable)
    pub rules: ParsedRobots,

    /// When the policy was fetched
    pub fetched_at: DateTime<Utc>,
}

impl RobotsPolicy {
    pub fn new(origin: String, rules: ParsedRobots) -> Self {
        Self {
            origin,
            rules,
            fetched_at: Utc::now(),
        }
    }
}

type PolicyCell = Arc<OnceCell<Arc<RobotsPolicy>>>;

/// Fail-open robots.txt cache shared by every crawl in the process
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    timeout: Duration,
    entries: Mutex<HashMap<String, PolicyCell>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client carrying the crawler's identifying user agent
    /// * `timeout` - Bound for each robots.txt fetch
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// The first query for an origin fetches its robots.txt; any failure caches an
    /// allow-all policy so an unreachable robots.txt never blocks the crawl.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let policy = self.policy_for(url).await;
        policy.rules.is_allowed(url.as_str(), user_agent)
    }

    /// Returns the cached policy for the URL's origin, fetching it on first use
    pub async fn policy_for(&self, url: &Url) -> Arc<RobotsPolicy> {
        let origin = origin_key(url);

        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(origin.clone()).or_default().clone()
        };

        cell.get_or_init(|| async {
            let rules = match fetch_robots(&self.client, &origin, self.timeout).await {
                Ok(rules) => {
                    tracing::debug!("Cached robots.txt for {}", origin);
                    rules
                }
                Err(e) => {
                    tracing::debug!("No usable robots.txt for {} ({}), allowing all", origin, e);
                    ParsedRobots::allow_all()
                }
            };
            Arc::new(RobotsPolicy::new(origin.clone(), rules))
        })
        .await
        .clone()
    }

    /// Number of origins with a resolved policy
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
