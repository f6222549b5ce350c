//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.

mod cache;
mod parser;

pub use cache::{RobotsCache, RobotsPolicy};
pub use parser::ParsedRobots;

use crate::VetError;
use reqwest::Client;
use std::time::Duration;

/// Fetches and parses robots.txt for an origin
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `origin` - `scheme://host[:port]` of the site
/// * `timeout` - Bound for the whole request
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - robots.txt was served with a success status
/// * `Err(VetError)` - Network failure, timeout, or non-success status
pub async fn fetch_robots(
    client: &Client,
    origin: &str,
    timeout: Duration,
) -> Result<ParsedRobots, VetError> {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = client
        .get(&robots_url)
        .timeout(timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| VetError::Http {
            url: robots_url.clone(),
            source,
        })?;

    let body = response.text().await.map_err(|source| VetError::Http {
        url: robots_url,
        source,
    })?;

    Ok(ParsedRobots::from_content(&body))
}
