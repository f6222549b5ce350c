//! Crawler module for bounded, polite page collection
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-page timeouts
//! - HTML parsing and link extraction
//! - Depth-bounded traversal restricted to the seed's host

mod engine;
mod fetcher;
mod parser;

pub use engine::{CrawlOptions, Crawler};
pub use fetcher::{build_http_client, fetch_page};
pub use parser::{parse_html, ParsedPage};

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Why a page produced no content
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum PageError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("not HTML: {0}")]
    NotHtml(String),

    #[error("robots disallowed")]
    RobotsDisallowed,

    #[error("cancelled")]
    Cancelled,
}

/// The result of visiting one URL
///
/// Failed visits carry empty title/content/links and an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedPage {
    pub url: Url,
    pub title: String,
    pub content: String,
    pub links: Vec<String>,

    /// Crawl depth the page was reached at (the seed is 1)
    pub depth: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl ScrapedPage {
    pub fn success(url: Url, title: String, content: String, links: Vec<String>) -> Self {
        Self {
            url,
            title,
            content,
            links,
            depth: 0,
            error: None,
        }
    }

    pub fn failure(url: Url, error: PageError) -> Self {
        Self {
            url,
            title: String::new(),
            content: String::new(),
            links: Vec::new(),
            depth: 0,
            error: Some(error),
        }
    }

    /// Records the depth the page was reached at
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every page visited by one crawl, in visit order
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlOutcome {
    pub pages: Vec<ScrapedPage>,

    /// True when a stop signal cut the traversal short
    pub interrupted: bool,
}

impl CrawlOutcome {
    /// Pages that were fetched and parsed without error
    pub fn successful(&self) -> impl Iterator<Item = &ScrapedPage> {
        self.pages.iter().filter(|p| p.is_success())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
