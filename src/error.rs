//! Error types for the crawl coordinator and its fetcher collaborator.
//!
//! Leaf errors are `thiserror` enums; the crate's fallible entry points wrap
//! them in `anyhow::Result`, matching the layering used throughout the
//! surrounding ecosystem of crawlers this crate was modeled on. Once the
//! coordinator's event loop is running it never returns an error (see
//! `CrawlResult`): these types only cover setup failures.

use thiserror::Error;

/// Failures that can occur while a [`crate::fetcher::Fetcher`] talks to a server.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response body for {url} was not valid UTF-8 text")]
    InvalidBody { url: String },
}

/// Failures that can occur while setting up a crawl, before the coordinator's
/// event loop begins.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no seed URLs were provided")]
    NoSeeds,

    #[error("seed URL `{url}` could not be parsed")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Fetcher(#[from] FetcherError),
}
