use crate::cancel::{EarlyTermination, Watchdog, WatchdogError};
use crate::config::PipelineConfig;
use crate::crawler::Crawler;
use crate::governor::Governor;
use crate::pipeline::{
    ApplicantInfo, PageVerdict, QueryPlanner, SearchHit, SearchProvider, Verdict,
    VerificationReport, Verifier,
};
use crate::storage::RunStatus;
use crate::VetError;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Where a unit's seed came from
#[derive(Debug, Clone)]
struct UnitTarget {
    search_rank: usize,
    result_rank: usize,
    hit: SearchHit,
}

/// What one crawl-and-verify unit produced
#[derive(Debug)]
struct UnitFindings {
    pages_crawled: usize,
    verdicts: Vec<PageVerdict>,
    interrupted: bool,
}

type UnitResult = Result<Result<UnitFindings, VetError>, WatchdogError>;

/// One verification run over an applicant
///
/// # Flow
///
/// 1. Reset the early-termination signal
/// 2. Admit the whole query budget up front; quota or strict rate denial ends the run
/// 3. Plan queries (falling back to company + address)
/// 4. Per query: admit one call, search, record the call, then crawl and verify each
///    hit as a bounded unit
/// 5. A verdict at or above the score threshold sets the signal, which stops
///    queued units, running crawls and remaining queries
pub struct VerificationRun {
    settings: PipelineConfig,
    governor: Governor,
    crawler: Crawler,
    termination: EarlyTermination,
    watchdog: Watchdog,
    search: Arc<dyn SearchProvider>,
    planner: Arc<dyn QueryPlanner>,
    verifier: Arc<dyn Verifier>,
}

impl VerificationRun {
    pub fn new(
        settings: PipelineConfig,
        governor: Governor,
        crawler: Crawler,
        termination: EarlyTermination,
        search: Arc<dyn SearchProvider>,
        planner: Arc<dyn QueryPlanner>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        let watchdog = Watchdog::new(
            termination.clone(),
            settings.poll_interval(),
            settings.grace_period(),
        );

        Self {
            settings,
            governor,
            crawler,
            termination,
            watchdog,
            search,
            planner,
            verifier,
        }
    }

    pub fn termination(&self) -> &EarlyTermination {
        &self.termination
    }

    /// Runs the verification and returns its report
    ///
    /// Quota exhaustion and strict rate limiting end the run early and are reported
    /// through `report.status`; only storage failures are returned as errors.
    pub async fn execute(&self, applicant: &ApplicantInfo) -> Result<VerificationReport, VetError> {
        self.termination.reset();
        let stop = self.termination.token();
        let mut report = VerificationReport::new(applicant.clone(), self.settings.score_threshold);

        tracing::info!(company = %applicant.company, "Starting verification run");

        match self.governor.admit(self.settings.max_queries, &stop).await {
            Ok(usage) => tracing::info!(%usage, "Search quota available"),
            Err(e) => {
                halt(&mut report, e)?;
                return Ok(self.finish(report));
            }
        }

        report.queries = self.plan_queries(applicant).await;
        let queries = report.queries.clone();

        for (index, query) in queries.iter().enumerate() {
            let search_rank = index + 1;

            if self.termination.is_set() {
                tracing::info!(search_rank, "Early termination set, skipping remaining queries");
                break;
            }

            if let Err(e) = self.governor.admit(1, &stop).await {
                halt(&mut report, e)?;
                break;
            }

            tracing::info!(search_rank, query = %query, "Searching");
            let searched = self
                .search
                .search(query, self.settings.results_per_query)
                .await;
            self.governor.record_call()?;

            let hits = match searched {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(search_rank, error = %e, "Search failed");
                    report.failed_queries += 1;
                    continue;
                }
            };

            tracing::info!(search_rank, hits = hits.len(), "Search returned");
            report.searched_url_count += hits.len();

            self.verify_hits(search_rank, hits, applicant, &mut report)
                .await;
        }

        Ok(self.finish(report))
    }

    fn finish(&self, mut report: VerificationReport) -> VerificationReport {
        report.early_terminated = self.termination.is_set();
        if report.status == RunStatus::Running {
            report.status = if report.early_terminated {
                RunStatus::EarlyTerminated
            } else {
                RunStatus::Completed
            };
        }
        report.finalize();

        tracing::info!(
            status = %report.status,
            found = report.found,
            best_score = report.best_score,
            searched_urls = report.searched_url_count,
            "Verification run finished"
        );
        report
    }

    async fn plan_queries(&self, applicant: &ApplicantInfo) -> Vec<String> {
        let max = self.settings.max_queries as usize;

        match self
            .planner
            .plan_queries(applicant, self.settings.max_queries)
            .await
        {
            Ok(mut queries) if !queries.is_empty() => {
                queries.truncate(max);
                tracing::info!(?queries, "Planned search queries");
                queries
            }
            Ok(_) => {
                tracing::warn!("Query planner returned nothing, using fallback query");
                vec![applicant.fallback_query()]
            }
            Err(e) => {
                tracing::warn!(error = %e, "Query planning failed, using fallback query");
                vec![applicant.fallback_query()]
            }
        }
    }

    /// Runs one unit per hit, at most `max-concurrent-units` at a time
    async fn verify_hits(
        &self,
        search_rank: usize,
        hits: Vec<SearchHit>,
        applicant: &ApplicantInfo,
        report: &mut VerificationReport,
    ) {
        let limit = self.settings.max_concurrent_units.max(1) as usize;
        let mut pending = hits.into_iter().enumerate();
        let mut units = JoinSet::new();

        loop {
            while units.len() < limit && !self.termination.is_set() {
                let Some((index, hit)) = pending.next() else {
                    break;
                };
                let target = UnitTarget {
                    search_rank,
                    result_rank: index + 1,
                    hit,
                };
                units.spawn(self.bounded_unit(target, applicant));
            }

            let Some(joined) = units.join_next().await else {
                break;
            };

            match joined {
                Ok((target, result)) => self.absorb(&target, result, report),
                Err(e) => tracing::error!(error = %e, "Unit task failed"),
            }
        }
    }

    fn bounded_unit(
        &self,
        target: UnitTarget,
        applicant: &ApplicantInfo,
    ) -> impl Future<Output = (UnitTarget, UnitResult)> + Send + 'static {
        let watchdog = self.watchdog.clone();
        let crawler = self.crawler.clone();
        let verifier = self.verifier.clone();
        let applicant = applicant.clone();
        let threshold = self.settings.score_threshold;
        let timeout = self.settings.unit_timeout();

        async move {
            let label = format!("unit {}-{}", target.search_rank, target.result_rank);
            let unit_target = target.clone();

            let result = watchdog
                .run_bounded(&label, timeout, move |stop| {
                    crawl_and_verify(crawler, verifier, applicant, unit_target, threshold, stop)
                })
                .await;

            (target, result)
        }
    }

    fn absorb(&self, target: &UnitTarget, result: UnitResult, report: &mut VerificationReport) {
        let url = target.hit.url.as_str();

        match result {
            Ok(Ok(findings)) => {
                let threshold = self.settings.score_threshold;
                let matched = findings.verdicts.iter().any(|v| v.score() >= threshold);
                let best = findings
                    .verdicts
                    .iter()
                    .map(PageVerdict::score)
                    .fold(0.0, f64::max);

                tracing::info!(
                    url,
                    pages = findings.pages_crawled,
                    verdicts = findings.verdicts.len(),
                    best,
                    interrupted = findings.interrupted,
                    "Unit finished"
                );

                report.results.extend(findings.verdicts);

                if matched {
                    tracing::info!(url, best, threshold, "Score threshold reached, stopping run");
                    self.termination.set();
                }
            }
            Ok(Err(e)) => tracing::warn!(url, error = %e, "Unit failed"),
            Err(e @ WatchdogError::TimedOut { .. }) => {
                tracing::warn!(url, error = %e, "Unit result discarded");
                report.timed_out_units += 1;
            }
            Err(e @ WatchdogError::EarlyTerminated { .. }) => {
                tracing::debug!(url, error = %e, "Unit stopped")
            }
            Err(e) => tracing::error!(url, error = %e, "Unit crashed"),
        }
    }
}

/// Records a fatal admission outcome on the report
fn halt(report: &mut VerificationReport, error: VetError) -> Result<(), VetError> {
    if !error.is_fatal() {
        return Err(error);
    }

    report.status = match &error {
        VetError::QuotaExceeded { .. } => RunStatus::QuotaExceeded,
        VetError::RateLimited { .. } => RunStatus::RateLimited,
        _ => return Ok(()),
    };

    tracing::error!(status = %report.status, reason = %error, "Verification run halted");
    report.detail = Some(error.to_string());
    Ok(())
}

/// Crawls the hit's site and scores each fetched page until one reaches `threshold`
///
/// A verifier failure scores the page zero instead of failing the unit.
async fn crawl_and_verify(
    crawler: Crawler,
    verifier: Arc<dyn Verifier>,
    applicant: ApplicantInfo,
    target: UnitTarget,
    threshold: f64,
    stop: CancellationToken,
) -> Result<UnitFindings, VetError> {
    let outcome = crawler.crawl(&target.hit.url, &stop).await?;
    let mut verdicts = Vec::new();

    for (index, page) in outcome.pages.iter().enumerate() {
        if stop.is_cancelled() {
            break;
        }

        if let Some(error) = &page.error {
            tracing::debug!(url = %page.url, %error, "Skipping failed page");
            continue;
        }

        let verdict = tokio::select! {
            verdict = verifier.verify(&applicant, page) => verdict,
            _ = stop.cancelled() => break,
        };

        let verdict = verdict.unwrap_or_else(|e| {
            tracing::warn!(url = %page.url, error = %e, "Verification failed, scoring zero");
            Verdict::failed(e)
        });

        let score = verdict.score;
        verdicts.push(PageVerdict::new(
            target.search_rank,
            target.result_rank,
            index + 1,
            page,
            verdict,
        ));

        if score >= threshold {
            break;
        }
    }

    Ok(UnitFindings {
        pages_crawled: outcome.len(),
        verdicts,
        interrupted: outcome.interrupted,
    })
}
