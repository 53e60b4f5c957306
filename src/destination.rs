//! A URL together with everything discovered about it over the course of a
//! crawl: how it was reached, whether it was reachable, and what came back.

use reqwest::Url;
use std::hash::{Hash, Hasher};

/// Where a [`Destination`] currently lives. Every URL the coordinator has
/// ever seen belongs to exactly one bin at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bin {
    Open,
    OpenExternal,
    InProgress,
    Closed,
}

/// A URL (fragment stripped) with its discovered attributes and outcome.
///
/// Identity is by canonical URL alone: two `Destination`s with the same
/// `url` are the same destination regardless of any other field, which is
/// why equality and hashing are implemented by hand rather than derived.
#[derive(Debug, Clone)]
pub struct Destination {
    pub url: Url,

    pub is_seed: bool,
    pub is_source: bool,
    pub is_external: bool,
    pub is_invalid: bool,
    pub is_unsupported_scheme: bool,
    pub was_skipped: bool,
    pub did_not_connect: bool,
    pub was_denied_by_robots_txt: bool,
    pub was_tried: bool,

    pub status: Option<u16>,
    pub final_url: Option<Url>,
    pub content_type: Option<String>,
    pub status_description: Option<String>,
    pub is_broken: bool,
}

impl Destination {
    /// A destination as it exists the moment it is first discovered: no
    /// result fields populated yet, every flag false except those the
    /// caller names explicitly.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            is_seed: false,
            is_source: false,
            is_external: false,
            is_invalid: false,
            is_unsupported_scheme: false,
            was_skipped: false,
            did_not_connect: false,
            was_denied_by_robots_txt: false,
            was_tried: false,
            status: None,
            final_url: None,
            content_type: None,
            status_description: None,
            is_broken: false,
        }
    }

    /// A seed destination: always internal, always a source, dispatched
    /// front-of-queue like any other source.
    pub fn seed(url: Url) -> Self {
        Self {
            is_seed: true,
            is_source: true,
            ..Self::new(url)
        }
    }

    /// The authority-keyed "server" this destination belongs to, expressed
    /// as an origin (`scheme://host:port`) so that `http://h` and `https://h`
    /// are never conflated under one `ServerInfo`.
    pub fn server_key(&self) -> Option<String> {
        server_key_of(&self.url)
    }

    /// This destination is terminal: it was actually tried, or it was
    /// closed without being tried for one of the documented reasons.
    pub fn is_terminal(&self) -> bool {
        self.was_tried
            || self.is_unsupported_scheme
            || self.is_invalid
            || self.was_denied_by_robots_txt
            || self.did_not_connect
            || self.was_skipped
            || (self.is_external && self.status.is_none() && !self.was_tried)
    }
}

/// The authority-keyed "server" a URL belongs to, see [`Destination::server_key`].
pub fn server_key_of(url: &Url) -> Option<String> {
    if url.cannot_be_a_base() {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

impl PartialEq for Destination {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Destination {}

impl Hash for Destination {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}
