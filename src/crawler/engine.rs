use crate::config::Config;
use crate::crawler::{build_http_client, fetch_page, CrawlOutcome, PageError, ScrapedPage};
use crate::robots::RobotsCache;
use crate::url::{normalize_url, same_domain};
use crate::VetError;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-crawl limits and identity
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Deepest level visited; the seed is depth 1
    pub max_depth: u32,
    pub page_timeout: Duration,

    /// Pause before every fetch except the first
    pub pacing_interval: Duration,

    /// Product token matched against robots.txt
    pub robots_agent: String,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_depth: config.crawler.max_depth,
            page_timeout: config.crawler.page_timeout(),
            pacing_interval: config.crawler.pacing_interval(),
            robots_agent: config.user_agent.robots_token().to_string(),
        }
    }
}

/// A group of sibling URLs found on one page, all at the same depth
struct Batch {
    urls: Vec<Url>,
    depth: u32,
}

/// Mutable state owned by a single crawl
#[derive(Default)]
struct CrawlState {
    visited: HashSet<String>,
    pages: Vec<ScrapedPage>,
    fetches: usize,
}

/// Depth-bounded, same-host crawler
///
/// The robots cache is shared across crawls; the visited set is not.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: Client,
    robots: Arc<RobotsCache>,
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(client: Client, robots: Arc<RobotsCache>, options: CrawlOptions) -> Self {
        Self {
            client,
            robots,
            options,
        }
    }

    /// Builds a crawler with its own client and robots cache
    pub fn from_config(config: &Config) -> Result<Self, VetError> {
        let client = build_http_client(&config.user_agent, config.crawler.page_timeout())?;
        let robots = Arc::new(RobotsCache::new(
            client.clone(),
            config.crawler.robots_timeout(),
        ));
        Ok(Self::new(client, robots, CrawlOptions::from_config(config)))
    }

    /// Crawls from `seed`, visiting every same-host page up to `max_depth`
    ///
    /// # Visit Order
    ///
    /// All links found on a page are visited before any of their own children; the
    /// children of those links are then explored one subtree at a time, in the order
    /// the links appeared. The seed is depth 1 and links are only followed from pages
    /// shallower than `max_depth`.
    ///
    /// # Stopping
    ///
    /// `stop` is checked before each visit and interrupts pacing sleeps and
    /// in-flight fetches. A stopped crawl returns what it collected so far with
    /// `interrupted` set.
    ///
    /// # Errors
    ///
    /// Only an invalid seed URL is an error; page failures are recorded in the outcome.
    pub async fn crawl(
        &self,
        seed: &str,
        stop: &CancellationToken,
    ) -> Result<CrawlOutcome, VetError> {
        let seed = normalize_url(seed)?;
        let mut state = CrawlState::default();
        let mut interrupted = false;

        tracing::debug!(seed = %seed, max_depth = self.options.max_depth, "Starting crawl");

        let mut stack = vec![Batch {
            urls: vec![seed.clone()],
            depth: 1,
        }];

        'traversal: while let Some(batch) = stack.pop() {
            let mut children = Vec::new();

            for url in batch.urls {
                if stop.is_cancelled() {
                    interrupted = true;
                    break 'traversal;
                }

                if batch.depth > self.options.max_depth || !state.visited.insert(url.to_string())
                {
                    continue;
                }

                let page = self
                    .visit(&url, &mut state, stop)
                    .await
                    .at_depth(batch.depth);

                if page.is_success() && batch.depth < self.options.max_depth {
                    let next = schedulable_links(&seed, &page, &state.visited);
                    if !next.is_empty() {
                        children.push(Batch {
                            urls: next,
                            depth: batch.depth + 1,
                        });
                    }
                }

                let cancelled = page.error == Some(PageError::Cancelled);
                state.pages.push(page);

                if cancelled {
                    interrupted = true;
                    break 'traversal;
                }
            }

            // Reversed so the first page's subtree is popped first
            stack.extend(children.into_iter().rev());
        }

        tracing::info!(
            seed = %seed,
            pages = state.pages.len(),
            fetches = state.fetches,
            interrupted,
            "Crawl finished"
        );

        Ok(CrawlOutcome {
            pages: state.pages,
            interrupted,
        })
    }

    async fn visit(&self, url: &Url, state: &mut CrawlState, stop: &CancellationToken) -> ScrapedPage {
        if !self
            .robots
            .is_allowed(url, &self.options.robots_agent)
            .await
        {
            tracing::debug!(url = %url, "Blocked by robots.txt");
            return ScrapedPage::failure(url.clone(), PageError::RobotsDisallowed);
        }

        if state.fetches > 0 && !self.options.pacing_interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.options.pacing_interval) => {}
                _ = stop.cancelled() => {
                    return ScrapedPage::failure(url.clone(), PageError::Cancelled);
                }
            }
        }

        state.fetches += 1;

        let page = tokio::select! {
            page = fetch_page(&self.client, url, self.options.page_timeout) => page,
            _ = stop.cancelled() => ScrapedPage::failure(url.clone(), PageError::Cancelled),
        };

        match &page.error {
            None => tracing::debug!(url = %url, links = page.links.len(), "Fetched page"),
            Some(e) => tracing::debug!(url = %url, error = %e, "Page failed"),
        }

        page
    }
}

/// Links on `page` worth visiting: valid, on the seed's host, not yet visited
///
/// Duplicates within the page are dropped, keeping first-seen order.
fn schedulable_links(seed: &Url, page: &ScrapedPage, visited: &HashSet<String>) -> Vec<Url> {
    let mut seen = HashSet::new();

    page.links
        .iter()
        .filter_map(|link| normalize_url(link).ok())
        .filter(|link| same_domain(seed, link))
        .filter(|link| !visited.contains(link.as_str()))
        .filter(|link| seen.insert(link.to_string()))
        .collect()
}
