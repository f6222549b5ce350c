//! HTTP fetcher for crawl pages
//!
//! This module handles all page requests for the crawler, including:
//! - Building the HTTP client with the identifying user agent
//! - GET requests bounded by a per-page timeout
//! - Classifying failures into [`PageError`]
//!
//! A fetch never returns `Err`: every outcome, good or bad, becomes a [`ScrapedPage`].

use crate::config::UserAgentConfig;
use crate::crawler::parser::parse_html;
use crate::crawler::{PageError, ScrapedPage};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed for one page
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `page_timeout` - Default bound for every request made with this client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use vetting_crawler::config::UserAgentConfig;
/// use vetting_crawler::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "VettingCrawler".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    page_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(page_timeout)
        .connect_timeout(page_timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one page and extracts its title, text and links
///
/// # Error Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Non-2xx status | `PageError::Http` |
/// | Timeout | `PageError::Timeout` |
/// | Connection or body failure | `PageError::Network` |
/// | Non-HTML `Content-Type` | `PageError::NotHtml` |
///
/// Relative links are resolved against the final URL after redirects.
pub async fn fetch_page(client: &Client, url: &Url, timeout: Duration) -> ScrapedPage {
    let response = match client.get(url.as_str()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return ScrapedPage::failure(url.clone(), classify_error(&e)),
    };

    let status = response.status();
    if !status.is_success() {
        return ScrapedPage::failure(
            url.clone(),
            PageError::Http {
                status: status.as_u16(),
            },
        );
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    // A missing Content-Type is treated as HTML
    if !content_type.is_empty() && !content_type.contains("html") {
        return ScrapedPage::failure(url.clone(), PageError::NotHtml(content_type));
    }

    let final_url = response.url().clone();
    match response.text().await {
        Ok(body) => {
            let parsed = parse_html(&body, &final_url);
            ScrapedPage::success(url.clone(), parsed.title, parsed.text, parsed.links)
        }
        Err(e) => ScrapedPage::failure(url.clone(), classify_error(&e)),
    }
}

fn classify_error(error: &reqwest::Error) -> PageError {
    if error.is_timeout() {
        PageError::Timeout
    } else if error.is_connect() {
        PageError::Network("connection refused".to_string())
    } else {
        PageError::Network(error.to_string())
    }
}
