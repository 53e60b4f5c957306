//! Black-box property tests driven entirely through the public crate API,
//! complementing the scenario tests next to the coordinator's internals.

use std::sync::Arc;
use std::time::Duration;

use linkwalker::{crawl, CrawlConfigBuilder, Fetcher, ScriptedFetcher, ScriptedPage, Url};
use tokio::sync::oneshot;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn cancellation_returns_a_well_formed_result() {
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        ScriptedFetcher::new()
            .with_robots("http://a", "User-agent: *\n")
            .with_page(url("http://a/"), ScriptedPage::ok(vec![("x", "/x")]))
            .with_page(url("http://a/x"), ScriptedPage::ok(vec![("y", "/y")])),
    );
    let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();

    let (tx, rx) = oneshot::channel();
    tx.send(()).unwrap();

    let result = crawl(vec![url("http://a/")], config, fetcher, rx)
        .await
        .expect("cancellation must not surface as an error");

    // Well-formed: no destination appears twice.
    let mut seen = std::collections::HashSet::new();
    for destination in &result.destinations {
        assert!(seen.insert(destination.url.clone()), "duplicate destination in result");
    }
}

#[tokio::test]
async fn no_destination_is_dispatched_twice_across_a_converging_link_graph() {
    // a/ links to a/x and a/y, both of which link back to a/.
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        ScriptedFetcher::new()
            .with_robots("http://a", "User-agent: *\n")
            .with_page(
                url("http://a/"),
                ScriptedPage::ok(vec![("x", "/x"), ("y", "/y")]),
            )
            .with_page(url("http://a/x"), ScriptedPage::ok(vec![("root", "/")]))
            .with_page(url("http://a/y"), ScriptedPage::ok(vec![("root", "/")])),
    );
    let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();

    let result = crawl(
        vec![url("http://a/")],
        config,
        fetcher,
        linkwalker::never_cancel(),
    )
    .await
    .unwrap();

    assert_eq!(result.destinations.len(), 3);
    assert!(result.destinations.iter().all(|d| d.was_tried));
}

#[tokio::test]
async fn throttle_defers_but_does_not_drop_a_second_request_to_the_same_host() {
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        ScriptedFetcher::new()
            .with_robots("http://a", "User-agent: *\nCrawl-delay: 1\n")
            .with_page(
                url("http://a/"),
                ScriptedPage::ok(vec![("x", "/x"), ("y", "/y")]),
            )
            .with_page(url("http://a/x"), ScriptedPage::ok(vec![]))
            .with_page(url("http://a/y"), ScriptedPage::ok(vec![])),
    );
    let config = CrawlConfigBuilder::new().with_host_globs(["a"]).build();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        crawl(vec![url("http://a/")], config, fetcher, linkwalker::never_cancel()),
    )
    .await
    .expect("crawl must terminate even with a throttled host")
    .unwrap();

    assert_eq!(result.destinations.len(), 3);
    assert!(result.destinations.iter().all(|d| d.was_tried));
}

#[tokio::test]
async fn empty_seed_list_is_rejected_before_any_dispatch() {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ScriptedFetcher::new());
    let config = CrawlConfigBuilder::new().build();
    let err = crawl(vec![], config, fetcher, linkwalker::never_cancel())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no seed"));
}
