//! Auto-Refresh Stream Module
//!
//! Subscriber side of `CacheEngine::get_with_auto_refresh`.

use futures::stream::{self, Stream};
use tokio::sync::watch;

// == Refresh Stream ==
/// Latest value published for one key.
///
/// Every subscriber of a key shares the same underlying channel and timer.
/// The stream ends when the subscription is torn down by `clear` or
/// `stop_auto_refresh`.
#[derive(Debug, Clone)]
pub struct RefreshStream<V> {
    key: String,
    receiver: watch::Receiver<Option<V>>,
    primed: bool,
}

impl<V: Clone> RefreshStream<V> {
    pub(crate) fn new(key: &str, receiver: watch::Receiver<Option<V>>) -> Self {
        Self {
            key: key.to_string(),
            receiver,
            primed: false,
        }
    }

    /// The key this stream follows.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Most recently published value, None until the first fetch completes.
    pub fn latest(&self) -> Option<V> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next value.
    ///
    /// The first call returns the current value right away if one has already
    /// been published. Returns None once the subscription is gone.
    pub async fn next(&mut self) -> Option<V> {
        if !self.primed {
            self.primed = true;
            let current = self.receiver.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }

        loop {
            self.receiver.changed().await.ok()?;
            let current = self.receiver.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
        }
    }

    /// Adapts this subscription into a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = V>
    where
        V: Send + Sync + 'static,
    {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|value| (value, subscription))
        })
    }
}
