use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Vetting-Crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl; the seed URL is depth 1
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Per-page fetch timeout (seconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Pause between fetches within one crawl (milliseconds)
    #[serde(rename = "pacing-interval")]
    pub pacing_interval: u64,

    /// Timeout for fetching a domain's robots.txt (seconds)
    #[serde(rename = "robots-timeout", default = "default_robots_timeout")]
    pub robots_timeout: u64,
}

impl CrawlerConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout)
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs(self.robots_timeout)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full `User-Agent` header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }

    /// Product token matched against robots.txt `User-agent` lines
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// Quota and rate limits for the governed search calls
#[derive(Debug, Clone, Deserialize)]
pub struct GovernorConfig {
    #[serde(rename = "daily-limit", default = "default_daily_limit")]
    pub daily_limit: u32,

    #[serde(rename = "rate-limit-per-minute", default = "default_per_minute")]
    pub rate_limit_per_minute: u32,

    #[serde(rename = "rate-limit-per-second", default = "default_per_second")]
    pub rate_limit_per_second: u32,

    /// Usage percentage at which a warning is logged
    #[serde(rename = "warning-threshold", default = "default_warning_threshold")]
    pub warning_threshold: u8,

    /// Deny instead of advising a wait when a rate window is full
    #[serde(rename = "strict-mode", default)]
    pub strict_mode: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            rate_limit_per_minute: default_per_minute(),
            rate_limit_per_second: default_per_second(),
            warning_threshold: default_warning_threshold(),
            strict_mode: false,
        }
    }
}

/// Verification run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(rename = "max-queries", default = "default_max_queries")]
    pub max_queries: u32,

    #[serde(rename = "results-per-query", default = "default_results_per_query")]
    pub results_per_query: u32,

    /// Bound for one crawl-and-verify unit (seconds)
    #[serde(rename = "unit-timeout", default = "default_unit_timeout")]
    pub unit_timeout: u64,

    /// Watchdog poll interval (milliseconds)
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// How long an overrunning unit gets to acknowledge its stop signal (milliseconds)
    #[serde(rename = "grace-period", default = "default_grace_period")]
    pub grace_period: u64,

    #[serde(rename = "score-threshold", default = "default_score_threshold")]
    pub score_threshold: f64,

    #[serde(rename = "max-concurrent-units", default = "default_concurrent_units")]
    pub max_concurrent_units: u32,
}

impl PipelineConfig {
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            results_per_query: default_results_per_query(),
            unit_timeout: default_unit_timeout(),
            poll_interval: default_poll_interval(),
            grace_period: default_grace_period(),
            score_threshold: default_score_threshold(),
            max_concurrent_units: default_concurrent_units(),
        }
    }
}

/// Search provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(rename = "api-key", default)]
    pub api_key: String,

    #[serde(rename = "engine-id", default)]
    pub engine_id: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: String::new(),
            engine_id: String::new(),
        }
    }
}

/// Verifier (LLM scoring) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_verifier_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_verifier_model")]
    pub model: String,

    /// Page text is truncated to this many characters before scoring
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_verifier_endpoint(),
            model: default_verifier_model(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding governor state and run history
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the JSON report
    #[serde(rename = "report-path")]
    pub report_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

fn default_robots_timeout() -> u64 {
    5
}

fn default_daily_limit() -> u32 {
    100
}

fn default_per_minute() -> u32 {
    60
}

fn default_per_second() -> u32 {
    10
}

fn default_warning_threshold() -> u8 {
    80
}

fn default_max_queries() -> u32 {
    5
}

fn default_results_per_query() -> u32 {
    8
}

fn default_unit_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    200
}

fn default_grace_period() -> u64 {
    250
}

fn default_score_threshold() -> f64 {
    0.95
}

fn default_concurrent_units() -> u32 {
    1
}

fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_verifier_endpoint() -> String {
    "http://localhost:11434/api/chat".to_string()
}

fn default_verifier_model() -> String {
    "llama3.1:latest".to_string()
}

fn default_max_content_chars() -> usize {
    3000
}
