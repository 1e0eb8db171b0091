//! Live subscriptions.
//!
//! A [`Subscription`] first delivers the current state of whatever it
//! watches as [`ChangeKind::Added`] changes, then every committed change in
//! commit order. Changes to a single document are always observed in the
//! order they were committed; there is no ordering promise across
//! documents watched by different subscriptions.
//!
//! Subscriptions never complete on their own. They must be released with
//! [`Subscription::unsubscribe`] (or by dropping the handle) when the view
//! that owns them is torn down.

use std::pin::Pin;
use std::sync::{Mutex, Weak};
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::memory::Inner;
use crate::paths;

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watch {
    /// A single document.
    Document(String),
    /// Every direct child document of a collection.
    Collection(String),
}

impl Watch {
    /// Whether a change at `path` concerns this watch.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Document(doc) => doc == path,
            Self::Collection(collection) => paths::is_child_of(path, collection),
        }
    }
}

/// Kind of change delivered to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The document appeared (or was present when the subscription opened).
    Added,
    /// The document was overwritten.
    Modified,
    /// The document was deleted.
    Removed,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// What happened.
    pub kind: ChangeKind,
    /// Path of the changed document.
    pub path: String,
    /// New contents (`None` for [`ChangeKind::Removed`]).
    pub data: Option<Value>,
}

impl Change {
    /// The document ID (last path segment).
    pub fn id(&self) -> &str {
        paths::leaf(&self.path)
    }

    /// Decode the new contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the contents do not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        self.data
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(StoreError::from)
    }
}

/// Registration held by the store for one open subscription.
#[derive(Debug)]
pub(crate) struct Listener {
    pub(crate) id: u64,
    pub(crate) watch: Watch,
    pub(crate) tx: mpsc::UnboundedSender<Change>,
}

/// Handle to an open subscription.
///
/// Dropping the handle releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    watch: Watch,
    rx: mpsc::UnboundedReceiver<Change>,
    registry: Weak<Mutex<Inner>>,
}

impl Subscription {
    pub(crate) const fn new(
        id: u64,
        watch: Watch,
        rx: mpsc::UnboundedReceiver<Change>,
        registry: Weak<Mutex<Inner>>,
    ) -> Self {
        Self {
            id,
            watch,
            rx,
            registry,
        }
    }

    /// What this subscription watches.
    pub const fn watch(&self) -> &Watch {
        &self.watch
    }

    /// Wait for the next change.
    ///
    /// Returns `None` only if the store itself was dropped.
    pub async fn next(&mut self) -> Option<Change> {
        self.rx.recv().await
    }

    /// Return an already-delivered change without waiting.
    pub fn try_next(&mut self) -> Option<Change> {
        self.rx.try_recv().ok()
    }

    /// Release the subscription. No further changes are delivered.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            if let Ok(mut guard) = inner.lock() {
                guard.remove_listener(self.id);
            }
        }
    }
}

impl futures::Stream for Subscription {
    type Item = Change;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
