//! The out-of-core collaborator that actually touches the network: fetching
//! pages and robots.txt files, and extracting links from fetched HTML.
//!
//! The coordinator and [`crate::worker::WorkerPool`] only depend on the
//! [`Fetcher`] trait. [`HttpFetcher`] is the production implementation
//! (`reqwest` + `scraper` + `robotstxt`, the same stack the teacher crawler
//! used directly); [`ScriptedFetcher`] is a deterministic in-memory double
//! used by the coordinator's own test suite, mirroring the `Downloader`
//! trait seam used for the same reason across the wider crawler ecosystem.

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::FetcherError;

/// The result of fetching a single page.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: Option<u16>,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub status_description: String,
    pub is_broken: bool,
    /// `(anchor text, href)` pairs discovered in the page, in document order.
    pub links: Vec<(String, String)>,
}

/// The result of fetching a host's robots.txt.
#[derive(Debug, Clone)]
pub struct RobotsOutcome {
    pub connected: bool,
    pub robots_txt_body: Option<String>,
}

/// Abstracts "do an HTTP GET" so the coordinator's worker pool can be driven
/// by a real HTTP client in production and a scripted double in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> FetchOutcome;
    async fn fetch_robots(&self, origin: &Url) -> RobotsOutcome;
}

/// A real fetcher backed by `reqwest`, extracting links with `scraper` the
/// same way the teacher crawler's `extract_links` did, generalized to also
/// pull `url(...)` references out of inline and linked CSS (the "CSS link
/// extraction" the distilled spec names as a worker concern).
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Result<Self, FetcherError> {
        let client = Client::builder()
            .user_agent(user_agent.into())
            .build()
            .map_err(FetcherError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> FetchOutcome {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(source) => {
                return FetchOutcome {
                    status: None,
                    final_url: url.clone(),
                    content_type: None,
                    status_description: source.to_string(),
                    is_broken: true,
                    links: Vec::new(),
                };
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let is_html = content_type
            .as_deref()
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = match response.text().await {
            Ok(body) => body,
            Err(source) => {
                return FetchOutcome {
                    status: Some(status.as_u16()),
                    final_url,
                    content_type,
                    status_description: source.to_string(),
                    is_broken: true,
                    links: Vec::new(),
                };
            }
        };

        let links = if is_html { extract_links(&body) } else { Vec::new() };

        FetchOutcome {
            status: Some(status.as_u16()),
            final_url,
            content_type,
            status_description: status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            is_broken: status.is_client_error() || status.is_server_error(),
            links,
        }
    }

    async fn fetch_robots(&self, origin: &Url) -> RobotsOutcome {
        let robots_url = match origin.join("/robots.txt") {
            Ok(url) => url,
            Err(_) => return RobotsOutcome { connected: false, robots_txt_body: None },
        };

        match self.client.get(robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => RobotsOutcome { connected: true, robots_txt_body: Some(body) },
                Err(_) => RobotsOutcome { connected: true, robots_txt_body: None },
            },
            Ok(_) => RobotsOutcome { connected: true, robots_txt_body: None },
            Err(_) => RobotsOutcome { connected: false, robots_txt_body: None },
        }
    }
}

/// Extracts `<a href>` targets and CSS `url(...)` references from `body`.
fn extract_links(body: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(body);
    let mut links = Vec::new();

    if let Ok(anchor_selector) = Selector::parse("a[href]") {
        for element in document.select(&anchor_selector) {
            if let Some(href) = element.value().attr("href") {
                let text = element.text().collect::<String>();
                let anchor = if text.trim().is_empty() { href.to_string() } else { text };
                links.push((anchor, href.to_string()));
            }
        }
    }

    if let Ok(style_selector) = Selector::parse("style") {
        for element in document.select(&style_selector) {
            let css = element.text().collect::<String>();
            for href in extract_css_urls(&css) {
                links.push(("css url()".to_string(), href));
            }
        }
    }

    links
}

/// A conservative scan for `url(...)` references inside a CSS fragment. Not
/// a full CSS parser, just enough to find link targets a link checker
/// should also verify (background images, `@import`s).
fn extract_css_urls(css: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = css;
    while let Some(start) = rest.find("url(") {
        rest = &rest[start + 4..];
        if let Some(end) = rest.find(')') {
            let raw = rest[..end].trim().trim_matches(['\'', '"']);
            if !raw.is_empty() && !raw.starts_with("data:") {
                out.push(raw.to_string());
            }
            rest = &rest[end + 1..];
        } else {
            break;
        }
    }
    out
}

/// A single scripted response, as configured for [`ScriptedFetcher`].
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub links: Vec<(String, String)>,
    pub redirect_to: Option<Url>,
}

impl ScriptedPage {
    pub fn ok(links: Vec<(&str, &str)>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html".to_string()),
            links: links
                .into_iter()
                .map(|(a, h)| (a.to_string(), h.to_string()))
                .collect(),
            redirect_to: None,
        }
    }

    pub fn not_found() -> Self {
        Self { status: 404, content_type: None, links: Vec::new(), redirect_to: None }
    }
}

/// A deterministic, in-memory [`Fetcher`] double driven by a fixed script of
/// responses, keyed by URL. Hosts not present in `unreachable_hosts` and
/// with no configured robots.txt allow everything with no crawl-delay.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<Url, ScriptedPage>>,
    robots: Mutex<HashMap<String, String>>,
    unreachable_hosts: Mutex<std::collections::HashSet<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: Url, page: ScriptedPage) -> Self {
        self.pages.lock().unwrap().insert(url, page);
        self
    }

    pub fn with_robots(self, host_origin: impl Into<String>, body: impl Into<String>) -> Self {
        self.robots.lock().unwrap().insert(host_origin.into(), body.into());
        self
    }

    pub fn with_unreachable_host(self, host_origin: impl Into<String>) -> Self {
        self.unreachable_hosts.lock().unwrap().insert(host_origin.into());
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_page(&self, url: &Url) -> FetchOutcome {
        let pages = self.pages.lock().unwrap();
        match pages.get(url) {
            Some(page) => FetchOutcome {
                status: Some(page.status),
                final_url: page.redirect_to.clone().unwrap_or_else(|| url.clone()),
                content_type: page.content_type.clone(),
                status_description: canonical_reason(page.status),
                is_broken: page.status >= 400,
                links: page.links.clone(),
            },
            None => FetchOutcome {
                status: Some(404),
                final_url: url.clone(),
                content_type: None,
                status_description: canonical_reason(404),
                is_broken: true,
                links: Vec::new(),
            },
        }
    }

    async fn fetch_robots(&self, origin: &Url) -> RobotsOutcome {
        let key = origin.origin().ascii_serialization();
        if self.unreachable_hosts.lock().unwrap().contains(&key) {
            return RobotsOutcome { connected: false, robots_txt_body: None };
        }
        let robots = self.robots.lock().unwrap();
        RobotsOutcome {
            connected: true,
            robots_txt_body: robots.get(&key).cloned(),
        }
    }
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_anchor_links() {
        let html = r#"<html><body><a href="/a">A</a><a href="https://x.test/b">B</a></body></html>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], ("A".to_string(), "/a".to_string()));
    }

    #[test]
    fn extracts_css_urls_from_style_blocks() {
        let html = r#"<html><head><style>body { background: url("/bg.png"); }</style></head></html>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].1, "/bg.png");
    }

    #[test]
    fn ignores_data_uris_in_css() {
        let css = "div { background: url(data:image/png;base64,AAAA); }";
        assert!(extract_css_urls(css).is_empty());
    }

    #[tokio::test]
    async fn scripted_fetcher_returns_configured_page() {
        let url = Url::parse("https://example.com/").unwrap();
        let fetcher = ScriptedFetcher::new()
            .with_page(url.clone(), ScriptedPage::ok(vec![("x", "/x")]));
        let outcome = fetcher.fetch_page(&url).await;
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.links, vec![("x".to_string(), "/x".to_string())]);
    }

    #[tokio::test]
    async fn scripted_fetcher_defaults_to_not_found() {
        let url = Url::parse("https://example.com/missing").unwrap();
        let fetcher = ScriptedFetcher::new();
        let outcome = fetcher.fetch_page(&url).await;
        assert_eq!(outcome.status, Some(404));
        assert!(outcome.is_broken);
    }

    #[tokio::test]
    async fn scripted_fetcher_reports_unreachable_hosts() {
        let origin = Url::parse("https://down.example/").unwrap();
        let fetcher = ScriptedFetcher::new().with_unreachable_host("https://down.example");
        let outcome = fetcher.fetch_robots(&origin).await;
        assert!(!outcome.connected);
    }
}
