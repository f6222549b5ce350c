//! Verification run tests with in-memory collaborators

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vetting_crawler::config::{GovernorConfig, PipelineConfig};
use vetting_crawler::crawler::{CrawlOptions, Crawler};
use vetting_crawler::governor::ManualClock;
use vetting_crawler::pipeline::{
    ApplicantInfo, QueryPlanner, SearchHit, SearchProvider, Verdict, VerificationRun, Verifier,
};
use vetting_crawler::storage::{RunStatus, SqliteStorage, Storage};
use vetting_crawler::{EarlyTermination, Governor, RobotsCache, ScrapedPage, VetError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedPlanner {
    queries: Vec<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl QueryPlanner for FixedPlanner {
    async fn plan_queries(
        &self,
        _applicant: &ApplicantInfo,
        _max_queries: u32,
    ) -> Result<Vec<String>, VetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.queries.clone())
    }
}

struct FixedSearch {
    hits: Vec<SearchHit>,
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str, _count: u32) -> Result<Vec<SearchHit>, VetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VetError::Search("HTTP 503".to_string()));
        }
        Ok(self.hits.clone())
    }
}

/// Scores a page high when its text mentions the applicant's phone number
#[derive(Default)]
struct KeywordVerifier {
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl KeywordVerifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Verifier for KeywordVerifier {
    async fn verify(
        &self,
        applicant: &ApplicantInfo,
        page: &ScrapedPage,
    ) -> Result<Verdict, VetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(VetError::Verifier("model unavailable".to_string()));
        }

        let score = if page.content.contains(&applicant.tel) {
            0.99
        } else {
            0.1
        };
        Ok(Verdict {
            score,
            reasoning: "keyword match".to_string(),
            matched_info: Vec::new(),
            confidence: 1.0,
        })
    }
}

/// Knobs for one verification run under test
struct Scenario {
    limits: GovernorConfig,
    settings: PipelineConfig,
    hits: Vec<SearchHit>,
    fail_search: bool,
    verifier: KeywordVerifier,
    clock: Option<Arc<ManualClock>>,
}

impl Scenario {
    fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            limits: GovernorConfig::default(),
            settings: PipelineConfig {
                max_queries: 2,
                unit_timeout: 10,
                poll_interval: 20,
                ..PipelineConfig::default()
            },
            hits,
            fail_search: false,
            verifier: KeywordVerifier::default(),
            clock: None,
        }
    }

    fn build(self) -> Harness {
        let storage = Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()));
        let governor = match self.clock {
            Some(clock) => Governor::with_clock(self.limits, storage.clone(), clock),
            None => Governor::new(self.limits, storage.clone()),
        };

        let client = Client::new();
        let crawler = Crawler::new(
            client.clone(),
            Arc::new(RobotsCache::new(client, Duration::from_secs(2))),
            CrawlOptions {
                max_depth: 2,
                page_timeout: Duration::from_secs(5),
                pacing_interval: Duration::ZERO,
                robots_agent: "TestBot".to_string(),
            },
        );

        let planner = Arc::new(FixedPlanner {
            queries: vec!["Acme Corp Tokyo".to_string(), "Acme 03-1234-5678".to_string()],
            calls: AtomicUsize::new(0),
        });
        let search = Arc::new(FixedSearch {
            hits: self.hits,
            fail: self.fail_search,
            calls: AtomicUsize::new(0),
        });
        let verifier = Arc::new(self.verifier);

        let run = VerificationRun::new(
            self.settings,
            governor,
            crawler,
            EarlyTermination::new(),
            search.clone(),
            planner.clone(),
            verifier.clone(),
        );

        Harness {
            storage,
            planner,
            search,
            verifier,
            run,
        }
    }
}

struct Harness {
    storage: Arc<Mutex<SqliteStorage>>,
    planner: Arc<FixedPlanner>,
    search: Arc<FixedSearch>,
    verifier: Arc<KeywordVerifier>,
    run: VerificationRun,
}

impl Harness {
    fn calls_used_today(&self) -> u32 {
        self.storage
            .lock()
            .unwrap()
            .calls_used_on(Local::now().date_naive())
            .unwrap()
    }
}

fn applicant() -> ApplicantInfo {
    ApplicantInfo {
        company: "Acme Corp".to_string(),
        address: "1-1-1 Chiyoda, Tokyo".to_string(),
        tel: "03-1234-5678".to_string(),
        other: Vec::new(),
    }
}

fn hit(url: String) -> SearchHit {
    SearchHit {
        title: "Acme".to_string(),
        url,
        snippet: String::new(),
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Acme</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn unrelated_site() -> MockServer {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<p>Nothing relevant here</p>"))
        .mount(&site)
        .await;
    site
}

#[tokio::test]
async fn test_exhausted_quota_halts_before_any_search() {
    let mut scenario = Scenario::new(vec![hit("http://127.0.0.1:9/".to_string())]);
    scenario.limits.daily_limit = 5;
    let h = scenario.build();
    h.storage
        .lock()
        .unwrap()
        .set_calls_used(Local::now().date_naive(), 5)
        .unwrap();

    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::QuotaExceeded);
    assert!(report.is_halted());
    assert!(report.detail.is_some());
    assert!(!report.found);
    assert!(report.results.is_empty());
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls_used_today(), 5);
}

#[tokio::test]
async fn test_strict_rate_limit_halts_run() {
    let start = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut scenario = Scenario::new(Vec::new());
    scenario.limits = GovernorConfig {
        rate_limit_per_minute: 1,
        rate_limit_per_second: 1,
        strict_mode: true,
        ..GovernorConfig::default()
    };
    scenario.clock = Some(Arc::new(ManualClock::new(start)));
    let h = scenario.build();

    let report = h.run.execute(&applicant()).await.unwrap();

    // The first query uses the only call in the bucket; the second is denied
    assert_eq!(report.status, RunStatus::RateLimited);
    assert!(report.is_halted());
    assert!(report.detail.as_deref().unwrap().contains("Rate limited"));
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);

    let used = h
        .storage
        .lock()
        .unwrap()
        .calls_used_on(start.date_naive())
        .unwrap();
    assert_eq!(used, 1);
}

#[tokio::test]
async fn test_high_score_stops_remaining_work() {
    let site = MockServer::start().await;
    let base = site.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<p>Call us: 03-1234-5678</p><a href="/about">About</a>"#))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/second"))
        .respond_with(html("<p>unrelated</p>"))
        .expect(0)
        .mount(&site)
        .await;

    let h = Scenario::new(vec![hit(format!("{}/", base)), hit(format!("{}/second", base))])
        .build();

    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::EarlyTerminated);
    assert!(report.early_terminated);
    assert!(report.found);
    assert_eq!(report.best_score, 0.99);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].url, format!("{}/", base));

    // The second query is never searched and the seed page already matched
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);
    assert!(h.run.termination().is_set());
    assert_eq!(h.calls_used_today(), 1);
}

#[tokio::test]
async fn test_no_match_completes_all_queries() {
    let site = unrelated_site().await;

    let h = Scenario::new(vec![hit(format!("{}/", site.uri()))]).build();
    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.early_terminated);
    assert!(!report.found);
    assert_eq!(report.queries.len(), 2);
    assert_eq!(report.searched_url_count, 2);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.best_score, 0.1);
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.verifier.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_searches_are_counted() {
    let mut scenario = Scenario::new(Vec::new());
    scenario.fail_search = true;
    let h = scenario.build();

    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.failed_queries, 2);
    assert_eq!(report.searched_url_count, 0);

    // Failed calls still count against the quota
    assert_eq!(h.calls_used_today(), 2);
}

#[tokio::test]
async fn test_verifier_failure_scores_zero() {
    let site = unrelated_site().await;

    let mut scenario = Scenario::new(vec![hit(format!("{}/", site.uri()))]);
    scenario.verifier = KeywordVerifier::failing();
    let h = scenario.build();

    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.found);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert_eq!(result.score(), 0.0);
        assert_eq!(result.verdict.confidence, 0.0);
        assert!(result.verdict.reasoning.contains("model unavailable"));
    }
}

#[tokio::test]
async fn test_overrunning_units_are_counted_and_discarded() {
    let site = unrelated_site().await;

    let mut scenario = Scenario::new(vec![hit(format!("{}/", site.uri()))]);
    scenario.settings.unit_timeout = 1;
    scenario.verifier = KeywordVerifier::slow(Duration::from_secs(30));
    let h = scenario.build();

    let started = std::time::Instant::now();
    let report = h.run.execute(&applicant()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.timed_out_units, 2);
    assert!(report.results.is_empty());
    assert_eq!(h.search.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_units_run_concurrently_up_to_limit() {
    let site = unrelated_site().await;
    let base = site.uri();

    let mut scenario = Scenario::new(vec![
        hit(format!("{}/one", base)),
        hit(format!("{}/two", base)),
        hit(format!("{}/three", base)),
    ]);
    scenario.settings.max_concurrent_units = 2;
    scenario.verifier = KeywordVerifier::slow(Duration::from_millis(300));
    let h = scenario.build();

    let report = h.run.execute(&applicant()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.searched_url_count, 6);
    assert_eq!(report.results.len(), 6);
    assert_eq!(h.verifier.max_in_flight.load(Ordering::SeqCst), 2);

    let mut ranks: Vec<(usize, usize)> = report
        .results
        .iter()
        .map(|r| (r.search_rank, r.result_rank))
        .collect();
    ranks.sort();
    assert_eq!(ranks, vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)]);
}
