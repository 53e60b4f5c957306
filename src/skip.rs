//! URL-skip pattern engine.
//!
//! The coordinator never builds skip policy itself: it consumes an
//! [`UrlSkipper`] as a predicate with an explain hook for verbose logging.
//! [`GlobSkipper`] is the default, pattern-based implementation, built on the
//! same `*`-wildcard matcher as [`crate::glob::UriGlob`], applied to the full
//! URL string rather than just the host.

use crate::glob::UriGlob;
use reqwest::Url;

/// A predicate deciding whether a discovered link target should be skipped
/// (closed without ever being dispatched), plus an explain hook used only
/// when verbose logging is enabled.
pub trait UrlSkipper: Send + Sync {
    fn skips(&self, url: &Url) -> bool;

    /// Returns a human-readable reason the URL would be (or was) skipped,
    /// if any. Used for verbose diagnostics only, never consulted for the
    /// skip decision itself.
    fn explain(&self, url: &Url) -> Option<String>;
}

/// A skipper with no patterns: skips nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopSkipper;

impl UrlSkipper for NoopSkipper {
    fn skips(&self, _url: &Url) -> bool {
        false
    }

    fn explain(&self, _url: &Url) -> Option<String> {
        None
    }
}

/// A skipper defined by a list of `*`-wildcard patterns matched against the
/// full URL string (including any fragment, since the fragment is part of
/// what a skip pattern like `*#comments` would target).
#[derive(Debug, Clone, Default)]
pub struct GlobSkipper {
    patterns: Vec<(String, UriGlob)>,
}

impl GlobSkipper {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let raw = p.into();
                (raw.clone(), UriGlob::new(raw))
            })
            .collect();
        Self { patterns }
    }

    fn matching_pattern(&self, url_with_fragment: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, glob)| glob.matches_host(url_with_fragment))
            .map(|(raw, _)| raw.as_str())
    }
}

impl UrlSkipper for GlobSkipper {
    fn skips(&self, url: &Url) -> bool {
        self.matching_pattern(url.as_str()).is_some()
    }

    fn explain(&self, url: &Url) -> Option<String> {
        self.matching_pattern(url.as_str())
            .map(|pattern| format!("matched skip pattern `{pattern}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_skipper_skips_nothing() {
        let skipper = NoopSkipper;
        let url = Url::parse("https://example.com/ignore/me").unwrap();
        assert!(!skipper.skips(&url));
        assert!(skipper.explain(&url).is_none());
    }

    #[test]
    fn glob_skipper_matches_pattern() {
        let skipper = GlobSkipper::new(["*/ignore/*"]);
        let hit = Url::parse("https://example.com/ignore/me").unwrap();
        let miss = Url::parse("https://example.com/keep/me").unwrap();
        assert!(skipper.skips(&hit));
        assert!(!skipper.skips(&miss));
        assert!(skipper.explain(&hit).unwrap().contains("*/ignore/*"));
    }
}
