//! The crawl's single external cancellation signal.

use tokio::sync::oneshot;

/// Spawns a task that resolves the returned receiver the first time the
/// process receives SIGINT, via `tokio::signal::ctrl_c`. Feeds the
/// `stop_signal` the coordinator subscribes to in normal (non-test) use.
pub fn ctrl_c_signal() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });
    rx
}

/// A `stop_signal` that never fires, for callers that don't need
/// cancellation (most tests). Leaks the paired sender rather than dropping
/// it, since a dropped sender resolves the receiver immediately with an
/// error, the opposite of "never".
pub fn never() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::mem::forget(tx);
    rx
}
