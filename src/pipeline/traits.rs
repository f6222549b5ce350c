// Seams for the external collaborators of a verification run.
//
// Implementations talk to real services; tests substitute in-memory doubles.

use crate::crawler::ScrapedPage;
use crate::pipeline::{ApplicantInfo, SearchHit, Verdict};
use crate::VetError;
use async_trait::async_trait;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs one free-text query; `count` is a hint for the number of results
    async fn search(&self, query: &str, count: u32) -> Result<Vec<SearchHit>, VetError>;
}

#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Proposes up to `max_queries` search queries for the applicant
    async fn plan_queries(
        &self,
        applicant: &ApplicantInfo,
        max_queries: u32,
    ) -> Result<Vec<String>, VetError>;
}

#[async_trait]
pub trait Verifier: Send + Sync {
    /// Scores how well `page` matches the applicant
    async fn verify(&self, applicant: &ApplicantInfo, page: &ScrapedPage)
        -> Result<Verdict, VetError>;
}
