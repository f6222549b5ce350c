//! Applicant verification run
//!
//! This module ties the core together:
//! - narrow traits for the external collaborators (search, query planning, scoring)
//! - HTTP implementations of those traits
//! - the run itself: governed searches, bounded crawl-and-verify units, early stop

mod ollama;
mod run;
mod search;
mod traits;

pub use ollama::OllamaClient;
pub use run::VerificationRun;
pub use search::CustomSearchClient;
pub use traits::{QueryPlanner, SearchProvider, Verifier};

use crate::crawler::ScrapedPage;
use crate::storage::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The application being checked
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicantInfo {
    pub company: String,
    pub address: String,
    pub tel: String,
    #[serde(default)]
    pub other: Vec<String>,
}

impl ApplicantInfo {
    /// Query used when the planner produces nothing
    pub fn fallback_query(&self) -> String {
        format!("{} {}", self.company, self.address).trim().to_string()
    }
}

/// One search provider result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Score of one page against the applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub matched_info: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl Verdict {
    /// A zero score standing in for a failed verification
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            score: 0.0,
            reasoning: format!("verification failed: {}", reason),
            matched_info: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Clamps score and confidence into [0, 1]; NaN becomes 0
    pub fn clamped(mut self) -> Self {
        self.score = clamp_unit(self.score);
        self.confidence = clamp_unit(self.confidence);
        self
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A verdict together with where the page came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageVerdict {
    /// 1-based index of the query that found the site
    pub search_rank: usize,
    /// 1-based index of the hit within that query's results
    pub result_rank: usize,
    /// 1-based index of the page within the crawl
    pub page_rank: usize,
    pub url: String,
    pub title: String,
    pub depth: u32,
    pub content_length: usize,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl PageVerdict {
    pub fn new(
        search_rank: usize,
        result_rank: usize,
        page_rank: usize,
        page: &ScrapedPage,
        verdict: Verdict,
    ) -> Self {
        Self {
            search_rank,
            result_rank,
            page_rank,
            url: page.url.to_string(),
            title: page.title.clone(),
            depth: page.depth,
            content_length: page.content.chars().count(),
            verdict,
        }
    }

    pub fn score(&self) -> f64 {
        self.verdict.score
    }
}

/// Everything a verification run produced
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    #[serde(flatten)]
    pub applicant: ApplicantInfo,

    /// Best score reached the threshold
    pub found: bool,
    pub best_score: f64,
    pub score_threshold: f64,

    /// Search hits whose sites were queued for crawling
    pub searched_url_count: usize,
    pub early_terminated: bool,

    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub queries: Vec<String>,
    pub failed_queries: usize,
    pub timed_out_units: usize,

    /// Verdicts sorted by score, best first
    pub results: Vec<PageVerdict>,
    pub generated_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn new(applicant: ApplicantInfo, score_threshold: f64) -> Self {
        Self {
            applicant,
            found: false,
            best_score: 0.0,
            score_threshold,
            searched_url_count: 0,
            early_terminated: false,
            status: RunStatus::Running,
            detail: None,
            queries: Vec::new(),
            failed_queries: 0,
            timed_out_units: 0,
            results: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Sorts results and derives `found`/`best_score`
    pub fn finalize(&mut self) {
        self.results.sort_by(|a, b| b.score().total_cmp(&a.score()));
        self.best_score = self.results.first().map_or(0.0, PageVerdict::score);
        self.found = self.best_score >= self.score_threshold;
        self.generated_at = Utc::now();
    }

    /// True when the run was cut short by quota or strict rate limits
    pub fn is_halted(&self) -> bool {
        matches!(
            self.status,
            RunStatus::QuotaExceeded | RunStatus::RateLimited
        )
    }
}
