//! Search provider backed by the Custom Search JSON API

use crate::config::SearchConfig;
use crate::pipeline::{SearchHit, SearchProvider};
use crate::VetError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// The API returns at most this many results per request
const MAX_RESULTS_PER_REQUEST: u32 = 10;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Clone)]
pub struct CustomSearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl CustomSearchClient {
    pub fn new(client: Client, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
        }
    }
}

#[async_trait]
impl SearchProvider for CustomSearchClient {
    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, VetError> {
        let num = count.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| VetError::Search(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VetError::Search(format!("HTTP {} for query '{}'", status, query)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| VetError::Search(format!("invalid response: {}", e)))?;

        let hits: Vec<SearchHit> = body
            .items
            .into_iter()
            .filter_map(|item| {
                item.link.map(|url| SearchHit {
                    title: item.title,
                    url,
                    snippet: item.snippet,
                })
            })
            .collect();

        tracing::debug!(query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}
