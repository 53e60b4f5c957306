//! The immutable final output of a crawl.

use crate::destination::Destination;
use crate::link::Link;

/// Everything discovered over the course of a crawl: every link seen
/// (including skipped ones) and every destination that reached a terminal
/// state (`closed` at the moment the coordinator stopped).
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub links: Vec<Link>,
    pub destinations: Vec<Destination>,
}

impl CrawlResult {
    /// The subset of destinations whose fetch outcome was broken: a 4xx/5xx
    /// status, or a connection failure.
    pub fn broken(&self) -> impl Iterator<Item = &Destination> {
        self.destinations
            .iter()
            .filter(|d| d.is_broken || d.did_not_connect)
    }
}
