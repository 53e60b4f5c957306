//! The fixed-size pool of workers the coordinator dispatches fetch work to.
//!
//! Modeled on the teacher's single shared `reqwest::Client` behind an `Arc`,
//! generalized from "one client, recursive async calls" to "N worker tasks
//! pulling off a shared request channel, each pushing results onto a
//! dedicated result channel", the `mpsc`-per-stream idiom used across the
//! wider crawler corpus this crate draws from.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::{mpsc, Mutex};

use crate::fetcher::Fetcher;
use crate::link::Link;

/// A request a worker can process.
#[derive(Debug)]
pub enum PoolRequest {
    /// Probe a host's reachability and fetch its robots.txt.
    CheckServer { host: String },
    /// Fetch a single page after waiting `delay`.
    CheckPage { url: Url, delay: Duration },
}

/// The result of a `CheckServer` request.
#[derive(Debug)]
pub struct ServerCheckResult {
    pub host: String,
    pub did_not_connect: bool,
    pub robots_txt_body: Option<String>,
}

/// The result of a `CheckPage` request: the updated result fields for the
/// checked URL, plus every link discovered on that page.
#[derive(Debug)]
pub struct FetchResults {
    pub url: Url,
    pub status: Option<u16>,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub status_description: String,
    pub is_broken: bool,
    pub links: Vec<Link>,
}

/// An informational message, emitted only when verbose logging is enabled.
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
}

/// A fixed-size set of workers. `checkServer`/`checkPage` enqueue work onto a
/// shared request channel (load-balanced across workers by the channel
/// itself); results arrive on the three public receivers, each fed by every
/// worker task.
pub struct WorkerPool {
    request_tx: Option<mpsc::Sender<PoolRequest>>,
    in_flight: Arc<AtomicUsize>,
    worker_count: usize,
    pub server_check_results: mpsc::Receiver<ServerCheckResult>,
    pub fetch_results: mpsc::Receiver<FetchResults>,
    pub messages: mpsc::Receiver<Message>,
}

impl WorkerPool {
    /// Spawns `worker_count` tokio tasks, each looping on the shared request
    /// channel until it is closed.
    #[tracing::instrument(skip(fetcher))]
    pub fn spawn(worker_count: usize, fetcher: Arc<dyn Fetcher>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<PoolRequest>(worker_count.max(1) * 4);
        let request_rx = Arc::new(Mutex::new(request_rx));

        let (server_tx, server_check_results) = mpsc::channel(worker_count.max(1) * 4);
        let (fetch_tx, fetch_results) = mpsc::channel(worker_count.max(1) * 4);
        let (msg_tx, messages) = mpsc::channel(worker_count.max(1) * 4);

        let in_flight = Arc::new(AtomicUsize::new(0));

        for id in 0..worker_count {
            let request_rx = Arc::clone(&request_rx);
            let fetcher = Arc::clone(&fetcher);
            let server_tx = server_tx.clone();
            let fetch_tx = fetch_tx.clone();
            let msg_tx = msg_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(worker_loop(id, request_rx, fetcher, server_tx, fetch_tx, msg_tx, in_flight));
        }

        tracing::info!(worker_count, "worker pool spawned");

        Self {
            request_tx: Some(request_tx),
            in_flight,
            worker_count,
            server_check_results,
            fetch_results,
            messages,
        }
    }

    /// Enqueues a server probe. No-op if the pool has been closed.
    pub async fn check_server(&self, host: impl Into<String>) {
        if let Some(tx) = &self.request_tx {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if tx.send(PoolRequest::CheckServer { host: host.into() }).await.is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Enqueues a page fetch, to begin after `delay`. No-op if the pool has
    /// been closed.
    pub async fn check_page(&self, url: Url, delay: Duration) {
        if let Some(tx) = &self.request_tx {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if tx.send(PoolRequest::CheckPage { url, delay }).await.is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Whether at least one worker slot is not currently servicing a
    /// dispatched-but-not-yet-completed request.
    pub fn any_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) < self.worker_count
    }

    pub fn all_busy(&self) -> bool {
        !self.any_idle()
    }

    pub fn all_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Initiates shutdown: dropping the request sender lets in-flight worker
    /// tasks drain their last request and exit. Idempotent.
    pub fn close(&mut self) {
        if self.request_tx.take().is_some() {
            tracing::info!("worker pool closing");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.request_tx.is_none()
    }
}

#[tracing::instrument(skip(requests, fetcher, server_tx, fetch_tx, _msg_tx, in_flight))]
async fn worker_loop(
    id: usize,
    requests: Arc<Mutex<mpsc::Receiver<PoolRequest>>>,
    fetcher: Arc<dyn Fetcher>,
    server_tx: mpsc::Sender<ServerCheckResult>,
    fetch_tx: mpsc::Sender<FetchResults>,
    _msg_tx: mpsc::Sender<Message>,
    in_flight: Arc<AtomicUsize>,
) {
    loop {
        let request = {
            let mut guard = requests.lock().await;
            guard.recv().await
        };
        let Some(request) = request else {
            break;
        };

        match request {
            PoolRequest::CheckServer { host } => {
                let result = check_server(&*fetcher, &host).await;
                // Decrement before sending: the coordinator's termination
                // test runs as soon as it receives this result, and on a
                // multi-threaded runtime it can race ahead of a decrement
                // that happens after the send.
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = server_tx.send(result).await;
            }
            PoolRequest::CheckPage { url, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let result = check_page(&*fetcher, url).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = fetch_tx.send(result).await;
            }
        }
    }

    tracing::debug!(worker = id, "worker exiting");
}

async fn check_server(fetcher: &dyn Fetcher, host: &str) -> ServerCheckResult {
    let origin = match Url::parse(host) {
        Ok(url) => url,
        Err(_) => {
            return ServerCheckResult {
                host: host.to_string(),
                did_not_connect: true,
                robots_txt_body: None,
            }
        }
    };

    let outcome = fetcher.fetch_robots(&origin).await;
    ServerCheckResult {
        host: host.to_string(),
        did_not_connect: !outcome.connected,
        robots_txt_body: outcome.robots_txt_body,
    }
}

async fn check_page(fetcher: &dyn Fetcher, url: Url) -> FetchResults {
    let outcome = fetcher.fetch_page(&url).await;

    let links = outcome
        .links
        .iter()
        .filter_map(|(anchor, href)| {
            outcome
                .final_url
                .join(href)
                .ok()
                .map(|target| Link::new(url.clone(), anchor.clone(), target))
        })
        .collect();

    FetchResults {
        url,
        status: outcome.status,
        final_url: outcome.final_url,
        content_type: outcome.content_type,
        status_description: outcome.status_description,
        is_broken: outcome.is_broken,
        links,
    }
}
