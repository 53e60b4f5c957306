//! `linkwalker` is a link-checking crawl coordinator: given seed URLs, a
//! set of host patterns defining "internal", and a policy on external
//! checking, it dispatches fetch work to a worker pool, respects
//! `robots.txt` and per-host rate limits, and reports every link it found
//! and whether each destination it reached was broken.
//!
//! The coordinator itself never touches the network: it drives a
//! [`Fetcher`] through a [`WorkerPool`]. Production callers use
//! [`HttpFetcher`]; tests drive the same coordinator deterministically with
//! [`ScriptedFetcher`].

mod cancel;
mod config;
mod coordinator;
mod destination;
mod error;
mod fetcher;
mod glob;
mod link;
mod result;
mod server;
mod skip;
mod worker;

pub use cancel::{ctrl_c_signal, never as never_cancel};
pub use config::{CrawlConfig, CrawlConfigBuilder};
pub use coordinator::{crawl, parse_seeds};
pub use destination::{Bin, Destination};
pub use error::{CrawlError, FetcherError};
pub use fetcher::{Fetcher, FetchOutcome, HttpFetcher, RobotsOutcome, ScriptedFetcher, ScriptedPage};
pub use glob::{HostGlobSet, UriGlob};
pub use link::Link;
pub use result::CrawlResult;
pub use server::ServerInfo;
pub use skip::{GlobSkipper, NoopSkipper, UrlSkipper};
pub use worker::WorkerPool;

pub use reqwest::Url;
