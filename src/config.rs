//! Crawl configuration: the ambient builder surface wrapped around the
//! coordinator's entry point, generalized from the teacher's
//! `CrawlerConfig`/`CrawlerBuilder`.

use std::sync::Arc;
use std::time::Duration;

use crate::skip::{NoopSkipper, UrlSkipper};

const USER_AGENT: &str = "LinkwalkerBot";

/// Worker-count policy and the defaults named in the coordinator's
/// initialization steps.
pub struct CrawlConfig {
    pub host_globs: Vec<String>,
    pub should_check_external: bool,
    pub skipper: Arc<dyn UrlSkipper>,
    pub verbose: bool,
    pub user_agent: String,
    pub minimum_delay: Duration,
}

impl CrawlConfig {
    /// Worker count used unless the crawl is localhost-only and external
    /// checking is disabled.
    pub const DEFAULT_THREADS: usize = 8;
    /// Worker count used for a localhost-only, internal-only crawl, where a
    /// large pool would just contend against the single server under test.
    pub const LOCALHOST_ONLY_THREADS: usize = 4;
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            host_globs: Vec::new(),
            should_check_external: false,
            skipper: Arc::new(NoopSkipper),
            verbose: false,
            user_agent: USER_AGENT.into(),
            minimum_delay: crate::server::ServerInfo::MINIMUM_DELAY,
        }
    }
}

/// Builder pattern for [`CrawlConfig`]. Allows for customizable crawl
/// configurations, in the same style as the teacher's `CrawlerBuilder`.
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
}

impl Default for CrawlConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CrawlConfig::default(),
        }
    }

    /// Patterns defining which hosts count as "internal".
    pub fn with_host_globs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.host_globs = globs.into_iter().map(Into::into).collect();
        self
    }

    /// Whether external hosts are checked one hop past a seed's internal
    /// pages, rather than closed immediately without being dispatched.
    pub fn with_check_external(mut self, should_check_external: bool) -> Self {
        self.config.should_check_external = should_check_external;
        self
    }

    /// Install a skip predicate for discovered link targets.
    pub fn with_skipper(mut self, skipper: Arc<dyn UrlSkipper>) -> Self {
        self.config.skipper = skipper;
        self
    }

    /// Emit `tracing::debug!` diagnostics for per-URL dispatch decisions.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set a custom user agent, sent on every request and presented to
    /// robots.txt matching.
    pub fn with_user_agent<S: AsRef<str>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.as_ref().into();
        self
    }

    /// Override the minimum per-host delay below which throttling is
    /// ignored (see `ServerInfo::MINIMUM_DELAY`).
    pub fn with_minimum_delay(mut self, minimum_delay: Duration) -> Self {
        self.config.minimum_delay = minimum_delay;
        self
    }

    pub fn build(self) -> CrawlConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = CrawlConfigBuilder::new()
            .with_host_globs(["example.com"])
            .with_check_external(true)
            .with_verbose(true)
            .with_user_agent("TestBot")
            .build();

        assert_eq!(config.host_globs, vec!["example.com".to_string()]);
        assert!(config.should_check_external);
        assert!(config.verbose);
        assert_eq!(config.user_agent, "TestBot");
    }

    #[test]
    fn default_config_checks_nothing_external_and_skips_nothing() {
        let config = CrawlConfig::default();
        assert!(!config.should_check_external);
        assert!(config.host_globs.is_empty());
        let url = reqwest::Url::parse("https://example.com/x").unwrap();
        assert!(!config.skipper.skips(&url));
    }
}
