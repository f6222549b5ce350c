//! Vetting-Crawler: a governed, cancellable crawler for applicant verification
//!
//! This crate crawls the sites returned by a search provider, bounded by depth and
//! robots.txt, while a persisted quota/rate governor throttles the search calls and
//! an early-termination signal stops every worker once enough evidence is found.

pub mod cancel;
pub mod config;
pub mod crawler;
pub mod governor;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod storage;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Vetting-Crawler operations
#[derive(Debug, Error)]
pub enum VetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Daily quota exceeded: {used} used + {requested} requested > {limit}")]
    QuotaExceeded { used: u32, requested: u32, limit: u32 },

    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Run terminated early")]
    EarlyTerminated,

    #[error("Search provider error: {0}")]
    Search(String),

    #[error("Verifier error: {0}")]
    Verifier(String),

    #[error("Report serialization error: {0}")]
    Report(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VetError {
    /// Returns true for admission outcomes that end the whole verification run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::RateLimited { .. } | Self::EarlyTerminated
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

// Re-export commonly used types
pub use cancel::{EarlyTermination, Watchdog, WatchdogError};
pub use config::Config;
pub use crawler::{CrawlOutcome, Crawler, PageError, ScrapedPage};
pub use governor::{Admission, Governor, UsageLevel};
pub use robots::RobotsCache;
pub use url::{extract_domain, normalize_url, same_domain};
