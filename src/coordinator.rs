//! The crawl coordinator: the single-threaded control loop that owns all
//! URL and server state, dispatches work to the worker pool, and drives the
//! crawl to quiescence or cancellation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexSet;
use reqwest::Url;
use tokio::sync::oneshot;

use crate::config::CrawlConfig;
use crate::destination::{server_key_of, Bin, Destination};
use crate::error::CrawlError;
use crate::fetcher::Fetcher;
use crate::glob::HostGlobSet;
use crate::link::Link;
use crate::result::CrawlResult;
use crate::server::ServerInfo;
use crate::skip::UrlSkipper;
use crate::worker::{FetchResults, ServerCheckResult, WorkerPool};

/// A fair merge of two URL queues: one element from `a`, then one from `b`,
/// repeating; once one is exhausted, drains the other. Does not materialize
/// either queue: it only ever holds the two deque iterators.
struct Interleave<'a> {
    a: std::collections::vec_deque::Iter<'a, Url>,
    b: std::collections::vec_deque::Iter<'a, Url>,
    take_from_a: bool,
}

impl<'a> Interleave<'a> {
    fn new(a: &'a VecDeque<Url>, b: &'a VecDeque<Url>) -> Self {
        Self {
            a: a.iter(),
            b: b.iter(),
            take_from_a: true,
        }
    }
}

impl<'a> Iterator for Interleave<'a> {
    type Item = &'a Url;

    fn next(&mut self) -> Option<Self::Item> {
        let (first, second) = if self.take_from_a {
            (&mut self.a, &mut self.b)
        } else {
            (&mut self.b, &mut self.a)
        };
        self.take_from_a = !self.take_from_a;

        first.next().or_else(|| second.next())
    }
}

/// Owns every piece of mutable crawl state. Never accessed from more than
/// one logical thread at a time: `dispatch` and the result handlers are
/// only ever called from the event loop in [`crawl`].
struct Coordinator {
    destinations: HashMap<Url, Destination>,
    bin: HashMap<Url, Bin>,

    open: VecDeque<Url>,
    open_external: VecDeque<Url>,
    in_progress: HashSet<Url>,
    closed: HashSet<Url>,

    servers: HashMap<String, ServerInfo>,
    unknown_servers: VecDeque<String>,
    servers_in_progress: HashSet<String>,

    links: IndexSet<Link>,

    host_globs: HostGlobSet,
    should_check_external: bool,
    skipper: Arc<dyn UrlSkipper>,
    verbose: bool,
    user_agent: String,
    minimum_delay: std::time::Duration,

    all_done: bool,
    cancelled: bool,
}

impl Coordinator {
    fn new(
        host_globs: HostGlobSet,
        should_check_external: bool,
        skipper: Arc<dyn UrlSkipper>,
        verbose: bool,
        user_agent: String,
        minimum_delay: std::time::Duration,
    ) -> Self {
        Self {
            destinations: HashMap::new(),
            bin: HashMap::new(),
            open: VecDeque::new(),
            open_external: VecDeque::new(),
            in_progress: HashSet::new(),
            closed: HashSet::new(),
            servers: HashMap::new(),
            unknown_servers: VecDeque::new(),
            servers_in_progress: HashSet::new(),
            links: IndexSet::new(),
            host_globs,
            should_check_external,
            skipper,
            verbose,
            user_agent,
            minimum_delay,
            all_done: false,
            cancelled: false,
        }
    }

    fn seed(&mut self, url: Url) {
        let destination = Destination::seed(url.clone());
        self.bin.insert(url.clone(), Bin::Open);
        self.open.push_back(url.clone());
        self.destinations.insert(url.clone(), destination);
        self.register_host_if_new(&url);
    }

    fn register_host_if_new(&mut self, url: &Url) {
        let Some(host) = server_key_of(url) else {
            return;
        };
        if !self.servers.contains_key(&host)
            && !self.servers_in_progress.contains(&host)
            && !self.unknown_servers.contains(&host)
        {
            self.unknown_servers.push_back(host);
        }
    }

    fn close(&mut self, url: Url) {
        self.bin.insert(url.clone(), Bin::Closed);
        self.in_progress.remove(&url);
        self.closed.insert(url);
    }

    /// The core scheduling routine. Only ever called from the event loop in
    /// [`crawl`]; re-entrancy is forbidden.
    #[tracing::instrument(skip(self, pool))]
    async fn dispatch(&mut self, pool: &mut WorkerPool) {
        // Step 1: server checks.
        while pool.any_idle() {
            let Some(host) = self.unknown_servers.pop_front() else {
                break;
            };
            self.servers_in_progress.insert(host.clone());
            pool.check_server(host).await;
        }

        // Step 2: page fetches, over a fair merge of `open` and `open_external`.
        let candidates: Vec<Url> = {
            Interleave::new(&self.open, &self.open_external)
                .filter(|url| {
                    self.destinations
                        .get(*url)
                        .and_then(Destination::server_key)
                        .map(|host| self.servers.contains_key(&host))
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        let mut dispatched_or_closed: Vec<Url> = Vec::new();

        for url in candidates {
            if !pool.any_idle() {
                break;
            }

            let Some(host) = self
                .destinations
                .get(&url)
                .and_then(Destination::server_key)
            else {
                continue;
            };

            enum Decision {
                Unreachable,
                Disallowed,
                Throttled,
                Dispatch(std::time::Duration),
            }

            let decision = match self.servers.get(&host) {
                None => {
                    tracing::warn!(%host, "dispatch candidate references an unregistered server");
                    Decision::Unreachable
                }
                Some(server) if server.has_not_connected => Decision::Unreachable,
                Some(server) => match &server.bouncer {
                    Some(bouncer) if !bouncer.allows(url.as_str()) => Decision::Disallowed,
                    _ => {
                        let delay = server.throttling_duration();
                        if delay > self.minimum_delay {
                            Decision::Throttled
                        } else {
                            Decision::Dispatch(delay)
                        }
                    }
                },
            };

            match decision {
                Decision::Unreachable => {
                    if let Some(dest) = self.destinations.get_mut(&url) {
                        dest.did_not_connect = true;
                    }
                    self.close(url.clone());
                    dispatched_or_closed.push(url);
                }
                Decision::Disallowed => {
                    if let Some(dest) = self.destinations.get_mut(&url) {
                        dest.was_denied_by_robots_txt = true;
                    }
                    self.close(url.clone());
                    dispatched_or_closed.push(url);
                }
                Decision::Throttled => {
                    if self.verbose {
                        tracing::debug!(%url, "deferring dispatch, host is throttled");
                    }
                    // Left in its queue: blocks later same-host candidates
                    // from this round but not candidates on other hosts.
                }
                Decision::Dispatch(delay) => {
                    pool.check_page(url.clone(), delay).await;
                    if let Some(server) = self.servers.get_mut(&host) {
                        server.mark_request_start(delay);
                    }
                    self.bin.insert(url.clone(), Bin::InProgress);
                    self.in_progress.insert(url.clone());
                    dispatched_or_closed.push(url);
                }
            }
        }

        for url in &dispatched_or_closed {
            self.open.retain(|u| u != url);
            self.open_external.retain(|u| u != url);
        }

        // Step 3: termination test.
        if self.unknown_servers.is_empty()
            && self.open.is_empty()
            && self.open_external.is_empty()
            && pool.all_idle()
        {
            self.all_done = true;
        }
    }

    #[tracing::instrument(skip(self, update))]
    fn handle_server_check_result(&mut self, update: ServerCheckResult) {
        self.servers_in_progress.remove(&update.host);

        let server = if update.did_not_connect {
            ServerInfo::unreachable(update.host.clone())
        } else {
            let mut server = ServerInfo::new(update.host.clone());
            if let Some(body) = update.robots_txt_body {
                server.apply_robots(body, &self.user_agent);
            }
            server
        };
        self.servers.insert(update.host, server);
    }

    #[tracing::instrument(skip(self, result))]
    fn handle_fetch_result(&mut self, result: FetchResults) {
        let url = result.url.clone();

        if self.bin.get(&url) != Some(&Bin::InProgress) {
            tracing::warn!(%url, "fetch result for a destination not marked in-progress");
            return;
        }
        if !self.in_progress.remove(&url) {
            tracing::warn!(%url, "fetch result with no matching in-progress destination");
            return;
        }

        {
            let Some(dest) = self.destinations.get_mut(&url) else {
                tracing::warn!(%url, "fetch result for a url with no destination record");
                return;
            };
            dest.was_tried = true;
            dest.status = result.status;
            dest.final_url = Some(result.final_url.clone());
            dest.content_type = result.content_type.clone();
            dest.status_description = Some(result.status_description.clone());
            dest.is_broken = result.is_broken;
        }
        self.close(url);

        let mut new_destinations: IndexSet<Url> = IndexSet::new();
        for mut link in result.links {
            // The skipper decides on the fragment-bearing URL a page actually
            // linked to, but a Destination's identity is the fragment-stripped
            // canonical URL (spec: "A URL (fragment stripped)"), so `/a#x` and
            // `/a#y` are one destination, not two.
            let target_with_fragment = link.target.clone();
            let mut target = target_with_fragment.clone();
            target.set_fragment(None);

            if self.skipper.skips(&target_with_fragment) {
                link.was_skipped = true;
                if self.verbose {
                    if let Some(reason) = self.skipper.explain(&target_with_fragment) {
                        tracing::debug!(url = %target_with_fragment, %reason, "skipping link target");
                    }
                }
            } else if !self.bin.contains_key(&target) {
                new_destinations.insert(target.clone());
            }
            link.target = target;
            self.links.insert(link);
        }

        for target_url in new_destinations {
            self.place_new_destination(target_url);
        }
    }

    /// Classifies and places a freshly discovered destination into the
    /// right bin, per the fetch-result handler's step 7. Destinations whose
    /// href could not be parsed into a URL never reach here: the worker
    /// filters those out before they are minted, so `Destination::is_invalid`
    /// is never actually set by this coordinator.
    fn place_new_destination(&mut self, url: Url) {
        let is_external = !self.host_globs.matches(&url);
        let is_unsupported_scheme = !matches!(url.scheme(), "http" | "https");

        let mut destination = Destination::new(url.clone());
        destination.is_external = is_external;
        destination.is_unsupported_scheme = is_unsupported_scheme;

        if is_unsupported_scheme {
            self.bin.insert(url.clone(), Bin::Closed);
            self.closed.insert(url.clone());
            self.destinations.insert(url, destination);
            return;
        }

        if is_external {
            if self.should_check_external {
                self.bin.insert(url.clone(), Bin::OpenExternal);
                self.open_external.push_back(url.clone());
                self.destinations.insert(url.clone(), destination);
                self.register_host_if_new(&url);
            } else {
                self.bin.insert(url.clone(), Bin::Closed);
                self.closed.insert(url.clone());
                self.destinations.insert(url, destination);
            }
            return;
        }

        // Internal. `is_source` is never true here: only seeds are sources
        // at creation, and seeds never re-enter this path.
        let is_source = destination.is_source;
        self.bin.insert(url.clone(), Bin::Open);
        if is_source {
            self.open.push_front(url.clone());
        } else {
            self.open.push_back(url.clone());
        }
        self.destinations.insert(url.clone(), destination);
        self.register_host_if_new(&url);
    }

    /// The shortest wait, if any, until a currently-throttled candidate in
    /// `open`/`open_external` becomes dispatchable. `dispatch` only runs in
    /// response to a pool result or cancellation; when the sole remaining
    /// work is a single host's throttle delay (no other candidate to make
    /// progress on, no in-flight request to eventually wake the loop), this
    /// is what schedules the wake-up that lets the crawl actually finish
    /// instead of stalling forever on the event loop's select.
    fn next_wake_delay(&self) -> Option<std::time::Duration> {
        Interleave::new(&self.open, &self.open_external)
            .filter_map(|url| self.destinations.get(url).and_then(Destination::server_key))
            .filter_map(|host| self.servers.get(&host))
            .map(ServerInfo::throttling_duration)
            .filter(|delay| *delay > std::time::Duration::ZERO)
            .min()
    }

    /// Retargets every link to the canonical destination for its URL, and
    /// returns the closed destinations and discovered links as the crawl's
    /// final output.
    fn finish(self) -> CrawlResult {
        let closed: HashMap<Url, Destination> = self
            .closed
            .iter()
            .filter_map(|url| self.destinations.get(url).map(|d| (url.clone(), d.clone())))
            .collect();

        let mut links: Vec<Link> = self.links.into_iter().collect();
        for link in &mut links {
            if let Some(canonical) = closed.get(&link.target) {
                link.target = canonical.url.clone();
            }
        }

        if !self.cancelled {
            debug_assert!(self.open.is_empty(), "open queue must be empty at completion");
            for destination in closed.values() {
                if !destination.is_terminal() {
                    tracing::warn!(url = %destination.url, "closed destination is not terminal");
                }
            }
        }

        CrawlResult {
            links,
            destinations: closed.into_values().collect(),
        }
    }
}

/// Parses a list of raw seed strings into absolute URLs, the form [`crawl`]
/// expects. A convenience for callers (e.g. a CLI) that collect seeds as
/// user-supplied strings rather than already-parsed `Url`s.
pub fn parse_seeds<I, S>(raw: I) -> Result<Vec<Url>, CrawlError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|s| {
            let s = s.as_ref();
            Url::parse(s).map_err(|source| CrawlError::InvalidSeed {
                url: s.to_string(),
                source,
            })
        })
        .collect()
}

/// Drives a crawl to completion: dispatches fetch work to a pool of
/// `worker_count` workers, enforces per-host politeness and robots.txt, and
/// terminates on quiescence or `stop_signal`.
#[tracing::instrument(skip(fetcher, stop_signal))]
pub async fn crawl(
    seeds: Vec<Url>,
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    mut stop_signal: oneshot::Receiver<()>,
) -> anyhow::Result<CrawlResult> {
    if seeds.is_empty() {
        return Err(CrawlError::NoSeeds.into());
    }

    let host_globs = HostGlobSet::compile(config.host_globs.iter().cloned());
    let mut coordinator = Coordinator::new(
        host_globs,
        config.should_check_external,
        config.skipper.clone(),
        config.verbose,
        config.user_agent.clone(),
        config.minimum_delay,
    );

    let mut all_seed_hosts_local = true;
    for seed in seeds {
        if !matches!(seed.host_str(), Some("localhost") | Some("127.0.0.1")) {
            all_seed_hosts_local = false;
        }
        coordinator.seed(seed);
    }

    let worker_count = if config.should_check_external || !all_seed_hosts_local {
        CrawlConfig::DEFAULT_THREADS
    } else {
        CrawlConfig::LOCALHOST_ONLY_THREADS
    };

    let mut pool = WorkerPool::spawn(worker_count, fetcher);
    coordinator.dispatch(&mut pool).await;

    while !coordinator.all_done {
        let wake_delay = coordinator.next_wake_delay();

        tokio::select! {
            _ = &mut stop_signal, if !coordinator.cancelled => {
                tracing::info!("crawl cancelled");
                coordinator.cancelled = true;
                pool.close();
                coordinator.all_done = true;
            }
            update = pool.server_check_results.recv() => {
                match update {
                    Some(update) => {
                        coordinator.handle_server_check_result(update);
                        coordinator.dispatch(&mut pool).await;
                    }
                    None => coordinator.all_done = true,
                }
            }
            result = pool.fetch_results.recv() => {
                match result {
                    Some(result) => {
                        coordinator.handle_fetch_result(result);
                        coordinator.dispatch(&mut pool).await;
                    }
                    None => coordinator.all_done = true,
                }
            }
            message = pool.messages.recv() => {
                if let Some(message) = message {
                    if coordinator.verbose {
                        tracing::debug!(text = %message.text, "worker message");
                    }
                }
            }
            _ = tokio::time::sleep(wake_delay.unwrap_or(std::time::Duration::MAX)), if wake_delay.is_some() => {
                coordinator.dispatch(&mut pool).await;
            }
        }
    }

    pool.close();
    tracing::info!(
        destinations = coordinator.closed.len(),
        links = coordinator.links.len(),
        "crawl complete"
    );
    Ok(coordinator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfigBuilder;
    use crate::fetcher::{ScriptedFetcher, ScriptedPage};
    use crate::skip::GlobSkipper;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn s1_single_seed_no_links() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(url("http://a/"), ScriptedPage::ok(vec![])),
        );
        let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.links.len(), 0);
        assert!(result.destinations[0].was_tried);
        assert!(!result.destinations[0].is_broken);
    }

    #[tokio::test]
    async fn s2_external_disabled_closes_external_target() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(url("http://a/"), ScriptedPage::ok(vec![("b", "http://b/x")])),
        );
        let config = CrawlConfigBuilder::new()
            .with_host_globs(["a"])
            .with_check_external(false)
            .build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        assert_eq!(result.destinations.len(), 2);
        assert_eq!(result.links.len(), 1);
        let target = result
            .destinations
            .iter()
            .find(|d| d.url.as_str() == "http://b/x")
            .unwrap();
        assert!(!target.was_tried);
        assert!(target.is_external);
    }

    #[tokio::test]
    async fn s3_robots_disallow_blocks_dispatch() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\nDisallow: /private\n")
                .with_page(
                    url("http://a/"),
                    ScriptedPage::ok(vec![("p", "/private")]),
                ),
        );
        let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        let private = result
            .destinations
            .iter()
            .find(|d| d.url.path() == "/private")
            .unwrap();
        assert!(private.was_denied_by_robots_txt);
        assert!(!private.was_tried);
    }

    #[tokio::test]
    async fn s4_unreachable_server_closes_seed() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(url("http://a/"), ScriptedPage::ok(vec![]))
                .with_unreachable_host("http://b"),
        );
        let config = CrawlConfigBuilder::new().with_host_globs(["a", "b"]).build();
        let result = crawl(
            vec![url("http://a/"), url("http://b/")],
            config,
            fetcher,
            crate::cancel::never(),
        )
        .await
        .unwrap();

        let b = result
            .destinations
            .iter()
            .find(|d| d.url.as_str() == "http://b/")
            .unwrap();
        assert!(b.did_not_connect);
    }

    #[tokio::test]
    async fn s5_cycle_closes_each_destination_once() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(url("http://a/"), ScriptedPage::ok(vec![("x", "/x")]))
                .with_page(url("http://a/x"), ScriptedPage::ok(vec![("root", "/")])),
        );
        let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        assert_eq!(result.destinations.len(), 2);
        assert_eq!(result.links.len(), 2);
    }

    #[tokio::test]
    async fn s6_skip_pattern_marks_link_without_creating_destination() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(
                    url("http://a/"),
                    ScriptedPage::ok(vec![("ignore", "/ignore/me")]),
                ),
        );
        let config = CrawlConfigBuilder::new()
            .with_host_globs(["a"])
            .with_skipper(Arc::new(GlobSkipper::new(["*/ignore*"])))
            .build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].was_skipped);
    }

    #[tokio::test]
    async fn fragment_variants_of_the_same_url_share_one_destination() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            ScriptedFetcher::new()
                .with_robots("http://a", "User-agent: *\n")
                .with_page(
                    url("http://a/"),
                    ScriptedPage::ok(vec![("x", "/x#one"), ("y", "/x#two")]),
                )
                .with_page(url("http://a/x"), ScriptedPage::ok(vec![])),
        );
        let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();
        let result = crawl(vec![url("http://a/")], config, fetcher, crate::cancel::never())
            .await
            .unwrap();

        assert_eq!(result.destinations.len(), 2);
        assert_eq!(result.links.len(), 2);
        for link in &result.links {
            assert_eq!(link.target.fragment(), None);
        }
        let x = result
            .destinations
            .iter()
            .find(|d| d.url.as_str() == "http://a/x")
            .unwrap();
        assert!(x.was_tried);
    }

    #[tokio::test]
    async fn empty_seed_list_is_an_error() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new());
        let config = CrawlConfigBuilder::new().build();
        let result = crawl(vec![], config, fetcher, crate::cancel::never()).await;
        assert!(result.is_err());
    }

    #[test]
    fn parse_seeds_reports_which_seed_was_invalid() {
        let err = parse_seeds(["http://a/", "not a url"]).unwrap_err();
        match err {
            CrawlError::InvalidSeed { url, .. } => assert_eq!(url, "not a url"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn interleave_alternates_then_drains_remainder() {
        let mut a = VecDeque::new();
        a.push_back(url("http://a/1"));
        a.push_back(url("http://a/2"));
        let mut b = VecDeque::new();
        b.push_back(url("http://b/1"));

        let order: Vec<String> = Interleave::new(&a, &b).map(|u| u.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "http://a/1".to_string(),
                "http://b/1".to_string(),
                "http://a/2".to_string(),
            ]
        );
    }
}
