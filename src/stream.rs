//! Turns a point-in-time fetch into a long-lived, cancellable sequence of
//! snapshots.
//!
//! The producing task writes into a bounded channel and the consumer reads
//! until it closes. Phases:
//!
//! - priming: one fetch runs immediately and its result is emitted, success or
//!   not, before the interval loop starts. A configuration-class failure
//!   ([`FeedError::is_terminal`]) ends the stream right there.
//! - steady state: after each interval wait, fetch again. A transient failure
//!   emits an empty snapshot and keeps polling; a configuration-class failure
//!   ends the stream.
//!
//! Cancellation: dropping the stream aborts the task mid-await, and a consumer
//! that merely stops reading trips `tx.closed()` at the next sleep, so no
//! further upstream calls are issued either way.

use crate::error::FeedError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 8;

pub struct PollingStream<T> {
    rx: mpsc::Receiver<Result<T, FeedError>>,
    task: JoinHandle<()>,
}

impl<T> PollingStream<T>
where
    T: Default + Send + 'static,
{
    /// Spawns the polling task. `fetch` is invoked once immediately and then
    /// once per `interval`.
    pub fn spawn<F, Fut>(interval: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FeedError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            // Priming: the consumer hears about the first result either way.
            match fetch().await {
                Ok(snapshot) => {
                    if tx.send(Ok(snapshot)).await.is_err() {
                        return;
                    }
                }
                Err(e) if e.is_terminal() => {
                    debug!(error = %e, "priming fetch hit a configuration error, ending stream");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "priming fetch failed");
                    if tx.send(Err(e)).await.is_err() {
                        return;
                    }
                }
            }

            loop {
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep(interval) => {}
                }

                match fetch().await {
                    Ok(snapshot) => {
                        if tx.send(Ok(snapshot)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) if e.is_terminal() => {
                        debug!(error = %e, "poll hit a configuration error, ending stream");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "poll failed, emitting empty snapshot");
                        if tx.send(Ok(T::default())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        PollingStream { rx, task }
    }
}

impl<T> PollingStream<T> {
    /// Next snapshot, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<T, FeedError>> {
        self.rx.recv().await
    }
}

impl<T> Drop for PollingStream<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
