//! Host/URL pattern matching.
//!
//! `UriGlob` is a narrow, single-purpose predicate: it answers "does this
//! host match this pattern", where a pattern may contain `*` as a wildcard
//! over any run of characters (e.g. `*.example.com`). It is intentionally
//! not a general globbing library: the coordinator only ever consumes it
//! as a compiled predicate over a URL's host.

use reqwest::Url;

/// A single compiled host pattern.
#[derive(Debug, Clone)]
pub struct UriGlob {
    pattern: String,
}

impl UriGlob {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
        }
    }

    /// Whether `host` matches this pattern.
    pub fn matches_host(&self, host: &str) -> bool {
        glob_match(self.pattern.as_bytes(), host.to_lowercase().as_bytes())
    }
}

/// Classic two-pointer glob matcher supporting only the `*` wildcard
/// (no `?`, no character classes; hosts don't need them).
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_pi, mut star_ti) = (None, 0usize);

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == b'*') {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if pi < pattern.len() && pattern[pi] == text[ti] {
            pi += 1;
            ti += 1;
        } else if let Some(sp) = star_pi {
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == b'*' {
        pi += 1;
    }

    pi == pattern.len()
}

/// A compiled set of [`UriGlob`]s, used by the coordinator to classify a
/// destination as internal or external.
#[derive(Debug, Clone, Default)]
pub struct HostGlobSet {
    globs: Vec<UriGlob>,
}

impl HostGlobSet {
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            globs: patterns.into_iter().map(UriGlob::new).collect(),
        }
    }

    /// Whether `url`'s host matches any compiled pattern. A URL with no host
    /// (e.g. `data:` URIs) never matches.
    pub fn matches(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.globs.iter().any(|g| g.matches_host(host)),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.globs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_host_matches() {
        let glob = UriGlob::new("example.com");
        assert!(glob.matches_host("example.com"));
        assert!(!glob.matches_host("sub.example.com"));
    }

    #[test]
    fn wildcard_subdomain_matches() {
        let glob = UriGlob::new("*.example.com");
        assert!(glob.matches_host("docs.example.com"));
        assert!(glob.matches_host("a.b.example.com"));
        assert!(!glob.matches_host("example.com"));
    }

    #[test]
    fn leading_and_trailing_star_matches_anything_containing() {
        let glob = UriGlob::new("*example*");
        assert!(glob.matches_host("myexampleserver.com"));
    }

    #[test]
    fn case_insensitive() {
        let glob = UriGlob::new("Example.COM");
        assert!(glob.matches_host("example.com"));
    }

    #[test]
    fn host_glob_set_classifies_internal_urls() {
        let set = HostGlobSet::compile(["example.com", "*.example.org"]);
        assert!(set.matches(&Url::parse("https://example.com/a").unwrap()));
        assert!(set.matches(&Url::parse("https://docs.example.org/a").unwrap()));
        assert!(!set.matches(&Url::parse("https://other.net/a").unwrap()));
    }

    #[test]
    fn empty_host_glob_set_matches_nothing() {
        let set = HostGlobSet::default();
        assert!(set.is_empty());
        assert!(!set.matches(&Url::parse("https://example.com/a").unwrap()));
    }
}
