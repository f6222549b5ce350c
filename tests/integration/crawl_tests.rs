//! End-to-end crawl tests against mock sites

use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vetting_crawler::crawler::{CrawlOptions, Crawler};
use vetting_crawler::{PageError, RobotsCache};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_crawler(max_depth: u32) -> Crawler {
    paced_crawler(max_depth, Duration::ZERO)
}

fn paced_crawler(max_depth: u32, pacing_interval: Duration) -> Crawler {
    let client = Client::new();
    let robots = Arc::new(RobotsCache::new(client.clone(), Duration::from_secs(2)));

    Crawler::new(
        client,
        robots,
        CrawlOptions {
            max_depth,
            page_timeout: Duration::from_secs(5),
            pacing_interval,
            robots_agent: "TestBot".to_string(),
        },
    )
}

fn html(title: &str, links: &[String]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();

    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<html><head><title>{}</title></head><body><p>{} body</p>{}</body></html>",
            title, title, anchors
        ),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_stays_on_seed_host() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    let base = site.uri();
    let other_port = url::Url::parse(&other.uri()).unwrap().port().unwrap();

    mount_robots(&site, "User-agent: *\nAllow: /").await;
    mount_page(
        &site,
        "/",
        html(
            "Home",
            &[
                format!("{}/b", base),
                "/c".to_string(),
                format!("http://localhost:{}/d", other_port),
            ],
        ),
    )
    .await;
    mount_page(&site, "/b", html("B", &[])).await;
    mount_page(&site, "/c", html("C", &[])).await;

    Mock::given(method("GET"))
        .and(path("/d"))
        .respond_with(html("D", &[]))
        .expect(0)
        .mount(&other)
        .await;

    let outcome = test_crawler(2)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.interrupted);
    assert_eq!(outcome.len(), 3);

    let paths: Vec<(&str, u32)> = outcome
        .pages
        .iter()
        .map(|p| (p.url.path(), p.depth))
        .collect();
    assert_eq!(paths, vec![("/", 1), ("/b", 2), ("/c", 2)]);

    let home = &outcome.pages[0];
    assert_eq!(home.title, "Home");
    assert!(home.content.contains("Home body"));
    assert!(outcome.pages.iter().all(|p| p.is_success()));
}

#[tokio::test]
async fn test_robots_denied_page_recorded_without_recursion() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_robots(&site, "User-agent: *\nDisallow: /private").await;
    mount_page(
        &site,
        "/",
        html("Home", &["/private".to_string(), "/public".to_string()]),
    )
    .await;
    mount_page(&site, "/public", html("Public", &[])).await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(html("Private", &["/private/deeper".to_string()]))
        .expect(0)
        .mount(&site)
        .await;

    let outcome = test_crawler(3)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.len(), 3);

    let denied = outcome
        .pages
        .iter()
        .find(|p| p.url.path() == "/private")
        .unwrap();
    assert_eq!(denied.error, Some(PageError::RobotsDisallowed));
    assert_eq!(denied.error.as_ref().unwrap().to_string(), "robots disallowed");
    assert!(outcome.pages.iter().all(|p| p.url.path() != "/private/deeper"));
    assert_eq!(outcome.successful().count(), 2);
}

#[tokio::test]
async fn test_each_url_visited_once() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/",
        html(
            "Home",
            &["/a".to_string(), "/b".to_string(), "/a#section".to_string()],
        ),
    )
    .await;
    mount_page(&site, "/a", html("A", &["/".to_string(), "/b".to_string()])).await;
    mount_page(&site, "/b", html("B", &["/a".to_string(), "/c".to_string()])).await;
    mount_page(&site, "/c", html("C", &["/".to_string()])).await;

    let outcome = test_crawler(5)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    let mut seen = HashSet::new();
    for page in &outcome.pages {
        assert!(seen.insert(page.url.to_string()), "{} visited twice", page.url);
    }
    assert_eq!(outcome.len(), 4);

    let c = outcome.pages.iter().find(|p| p.url.path() == "/c").unwrap();
    assert_eq!(c.depth, 3);
}

#[tokio::test]
async fn test_depth_bound() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", html("Home", &["/level2".to_string()])).await;
    mount_page(&site, "/level2", html("Two", &["/level3".to_string()])).await;

    Mock::given(method("GET"))
        .and(path("/level3"))
        .respond_with(html("Three", &[]))
        .expect(0)
        .mount(&site)
        .await;

    let outcome = test_crawler(2)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.len(), 2);
    assert!(outcome.pages.iter().all(|p| p.depth <= 2));
}

#[tokio::test]
async fn test_failed_pages_recorded_and_not_followed() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/",
        html("Home", &["/missing".to_string(), "/ok".to_string()]),
    )
    .await;
    mount_page(&site, "/missing", ResponseTemplate::new(404)).await;
    mount_page(&site, "/ok", html("Ok", &[])).await;

    let outcome = test_crawler(2)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.len(), 3);
    let missing = outcome
        .pages
        .iter()
        .find(|p| p.url.path() == "/missing")
        .unwrap();
    assert_eq!(missing.error, Some(PageError::Http { status: 404 }));
    assert_eq!(outcome.successful().count(), 2);
}

#[tokio::test]
async fn test_stop_interrupts_slow_fetch() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/",
        html("Slow", &[]).set_delay(Duration::from_secs(10)),
    )
    .await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = test_crawler(2)
        .crawl(&format!("{}/", base), &stop)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.interrupted);
    assert_eq!(outcome.len(), 1);
    assert_eq!(outcome.pages[0].error, Some(PageError::Cancelled));
}

#[tokio::test]
async fn test_pacing_between_fetches() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", html("Home", &["/a".to_string(), "/b".to_string()])).await;
    mount_page(&site, "/a", html("A", &[])).await;
    mount_page(&site, "/b", html("B", &[])).await;

    let started = std::time::Instant::now();
    let outcome = paced_crawler(2, Duration::from_millis(300))
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    // Two pauses: none before the seed, one before each later fetch
    assert_eq!(outcome.successful().count(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(600), "took {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_first_fetch_not_paced() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", html("Only", &[])).await;

    let started = std::time::Instant::now();
    let outcome = paced_crawler(2, Duration::from_secs(10))
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.len(), 1);
    assert!(outcome.pages[0].is_success());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_stop_interrupts_pacing_sleep() {
    let site = MockServer::start().await;
    let base = site.uri();

    mount_page(&site, "/", html("Home", &["/next".to_string()])).await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("Next", &[]))
        .expect(0)
        .mount(&site)
        .await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = paced_crawler(2, Duration::from_secs(10))
        .crawl(&format!("{}/", base), &stop)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.interrupted);
    assert_eq!(outcome.len(), 2);
    assert!(outcome.pages[0].is_success());
    assert_eq!(outcome.pages[1].url.path(), "/next");
    assert_eq!(outcome.pages[1].error, Some(PageError::Cancelled));
}

#[tokio::test]
async fn test_same_host_other_port_not_followed() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    let base = site.uri();

    mount_page(
        &site,
        "/",
        html("Home", &["/local".to_string(), format!("{}/elsewhere", other.uri())]),
    )
    .await;
    mount_page(&site, "/local", html("Local", &[])).await;

    Mock::given(method("GET"))
        .respond_with(html("Elsewhere", &[]))
        .expect(0)
        .mount(&other)
        .await;

    let outcome = test_crawler(2)
        .crawl(&format!("{}/", base), &CancellationToken::new())
        .await
        .unwrap();

    let paths: Vec<&str> = outcome.pages.iter().map(|p| p.url.path()).collect();
    assert_eq!(paths, vec!["/", "/local"]);
}
