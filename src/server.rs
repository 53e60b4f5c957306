//! Per-host state: reachability, the robots.txt "bouncer", and the
//! throttling schedule that enforces politeness between requests.

use robotstxt::DefaultMatcher;
use std::time::{Duration, Instant};

/// A compiled robots.txt for one host: whether a given path is allowed for
/// our user agent. Wraps `robotstxt::DefaultMatcher`, the same crate the
/// teacher crawler used directly.
pub struct Bouncer {
    robots_txt_body: String,
    user_agent: String,
}

impl Bouncer {
    pub fn new(robots_txt_body: String, user_agent: String) -> Self {
        Self {
            robots_txt_body,
            user_agent,
        }
    }

    /// Whether `url` is allowed to be fetched per this host's robots.txt.
    pub fn allows(&self, url: &str) -> bool {
        DefaultMatcher::default().one_agent_allowed_by_robots(
            &self.robots_txt_body,
            &self.user_agent,
            url,
        )
    }
}

impl std::fmt::Debug for Bouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bouncer")
            .field("user_agent", &self.user_agent)
            .field("robots_txt_len", &self.robots_txt_body.len())
            .finish()
    }
}

/// Per-host reachability, robots policy, and throttling state.
#[derive(Debug)]
pub struct ServerInfo {
    pub host: String,
    pub has_not_connected: bool,
    pub bouncer: Option<Bouncer>,
    min_delay: Duration,
    /// The instant the next request to this host is allowed to actually
    /// begin. Set by `mark_request_start` to "now + the delay the caller is
    /// about to wait", not to "now"; see `throttling_duration`.
    next_available_at: Option<Instant>,
}

impl ServerInfo {
    /// Below this, a computed throttling wait is not worth deferring a
    /// dispatch over: dispatch immediately and let the worker absorb the
    /// (sub-threshold) delay itself.
    pub const MINIMUM_DELAY: Duration = Duration::from_millis(100);

    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            has_not_connected: false,
            bouncer: None,
            min_delay: Duration::ZERO,
            next_available_at: None,
        }
    }

    pub fn unreachable(host: impl Into<String>) -> Self {
        Self {
            has_not_connected: true,
            ..Self::new(host)
        }
    }

    /// Install a parsed robots.txt and the crawl-delay it specifies, if any.
    pub fn apply_robots(&mut self, robots_txt_body: String, user_agent: &str) {
        if let Some(delay) = extract_crawl_delay(&robots_txt_body) {
            self.min_delay = delay;
        }
        self.bouncer = Some(Bouncer::new(robots_txt_body, user_agent.to_string()));
    }

    /// How long a new request to this host must wait before it may begin.
    /// Zero if no request is currently scheduled, or if that schedule has
    /// already elapsed.
    pub fn throttling_duration(&self) -> Duration {
        match self.next_available_at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Record that a request has been handed to a worker which will wait
    /// `delay` before actually sending it, and that the host may not be hit
    /// again until `min_delay` after that.
    pub fn mark_request_start(&mut self, delay: Duration) {
        self.next_available_at = Some(Instant::now() + delay + self.min_delay);
    }
}

/// Extracts a `Crawl-delay` directive from a robots.txt body, the same way
/// the teacher's crawler did it: a plain text scan, not a full per-agent
/// parse (the `robotstxt` crate's matcher only answers allow/disallow, not
/// crawl-delay, so this stays a manual scan).
fn extract_crawl_delay(robots_txt_body: &str) -> Option<Duration> {
    robots_txt_body
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.to_lowercase().starts_with("crawl-delay") {
                line.split(':').nth(1)?.trim().parse::<f64>().ok()
            } else {
                None
            }
        })
        .next()
        .map(Duration::from_secs_f64)
}
