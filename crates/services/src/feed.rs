//! In-process change notifications for live queries.
//!
//! Writers call [`ChangeFeed::notify`] after a write lands. Each live query
//! listens on its topic and re-runs the full query on every tick, so a
//! subscriber always receives complete ordered snapshots, never diffs.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

const TOPIC_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Topic {
    /// Messages of one chat thread.
    Chat(String),
    Bulletin,
    VisitorLog,
    PackageLog,
}

pub struct ChangeFeed {
    topics: DashMap<Topic, broadcast::Sender<()>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    pub fn listen(&self, topic: Topic) -> broadcast::Receiver<()> {
        self.topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    pub fn notify(&self, topic: &Topic) {
        let delivered = match self.topics.get(topic) {
            Some(sender) => sender.send(()).is_ok(),
            None => return,
        };
        if !delivered {
            // Nobody is listening any more.
            self.release(topic);
        }
    }

    /// Drops the topic's sender once its last receiver is gone.
    pub fn release(&self, topic: &Topic) {
        if self
            .topics
            .remove_if(topic, |_, sender| sender.receiver_count() == 0)
            .is_some()
        {
            debug!(?topic, "Dropped idle topic");
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a one-shot query into a live one: emits the current result
/// immediately, then again after every change on `topic`.
///
/// The stream ends when the feed drops the topic's sender.
pub fn live_query<T, E, F, Fut>(
    feed: &ChangeFeed,
    topic: Topic,
    query: F,
) -> impl Stream<Item = Result<T, E>> + Send + 'static
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    // Listen before the first query so no change can slip in between.
    let rx = feed.listen(topic);

    futures::stream::unfold((rx, query, true), |(mut rx, query, first)| async move {
        if !first {
            loop {
                match rx.recv().await {
                    Ok(()) => break,
                    // Missed ticks collapse into one re-query.
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
        let result = query().await;
        Some((result, (rx, query, false)))
    })
}

/// A running live query forwarding into a channel. Cancelled explicitly with
/// [`Subscription::cancel`] or implicitly when dropped. When the task ends
/// the topic is released, so idle chat topics do not pile up in the feed.
#[derive(Debug)]
pub struct Subscription {
    topic: Topic,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn spawn<S>(
        feed: &Arc<ChangeFeed>,
        topic: Topic,
        stream: S,
        out: mpsc::UnboundedSender<S::Item>,
    ) -> Self
    where
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
    {
        let release = Release {
            feed: feed.clone(),
            topic: topic.clone(),
        };
        // Tuple fields drop in order: the stream (and its receiver) goes
        // before the release runs, whether the task ends or is aborted.
        let mut forward = (Box::pin(stream), release, out);
        let handle = tokio::spawn(async move {
            let (stream, _release, out) = &mut forward;
            while let Some(item) = stream.next().await {
                if out.send(item).is_err() {
                    break;
                }
            }
        });
        Self { topic, handle }
    }

    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(topic = ?self.topic, "Subscription cancelled");
    }
}

struct Release {
    feed: Arc<ChangeFeed>,
    topic: Topic,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.feed.release(&self.topic);
    }
}
