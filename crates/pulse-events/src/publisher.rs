//! Append-only writer for vote stream events.
//!
//! One [`StreamEvent`] is appended per counted vote, tagged with the poll
//! epoch the vote was counted in. Events are never updated. On reset the
//! events of older epochs are purged best effort; any leftovers are
//! filtered by readers comparing epochs.

use chrono::Utc;
use pulse_store::{MemoryStore, paths};
use pulse_types::{Epoch, PollId, StreamEvent, StreamEventId};
use tracing::{debug, warn};

use crate::error::StreamError;

/// Outcome of a best-effort purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCount {
    /// Documents deleted.
    pub deleted: u64,
    /// Deletes that failed and were left behind.
    pub failed: u64,
}

impl PurgeCount {
    /// Count one successful delete.
    pub const fn record_deleted(&mut self) {
        self.deleted = self.deleted.saturating_add(1);
    }

    /// Count one failed delete.
    pub const fn record_failed(&mut self) {
        self.failed = self.failed.saturating_add(1);
    }

    /// Combine two purge counts.
    pub const fn merged(self, other: Self) -> Self {
        Self {
            deleted: self.deleted.saturating_add(other.deleted),
            failed: self.failed.saturating_add(other.failed),
        }
    }
}

/// Writes stream events to `streams/{poll}/events`.
#[derive(Debug, Clone)]
pub struct StreamPublisher {
    store: MemoryStore,
}

impl StreamPublisher {
    /// Create a publisher writing to `store`.
    pub const fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Append one event for a vote on `option_index` counted in `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Store`] if the append fails.
    pub fn publish(
        &self,
        poll_id: PollId,
        option_index: usize,
        epoch: Epoch,
    ) -> Result<StreamEvent, StreamError> {
        let event = StreamEvent {
            id: StreamEventId::new(),
            poll_id,
            option_index,
            timestamp: Utc::now(),
            epoch,
        };
        self.store
            .set_json(&paths::event(poll_id, event.id), &event)?;
        debug!(poll = %poll_id, event = %event.id, option_index, %epoch, "stream event published");
        Ok(event)
    }

    /// Every stored event for `poll_id`, in path order.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Store`] if listing or decoding fails.
    pub fn events(&self, poll_id: PollId) -> Result<Vec<StreamEvent>, StreamError> {
        Ok(self.store.list_json(&paths::events(poll_id))?)
    }

    /// Delete every event of `poll_id` whose epoch is older than `current`.
    ///
    /// Individual delete failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Store`] only if the events cannot be listed.
    pub fn purge_before(&self, poll_id: PollId, current: Epoch) -> Result<PurgeCount, StreamError> {
        let mut count = PurgeCount::default();
        for event in self.events(poll_id)? {
            if event.epoch >= current {
                continue;
            }
            match self.store.delete(&paths::event(poll_id, event.id)) {
                Ok(()) => count.record_deleted(),
                Err(e) => {
                    warn!(poll = %poll_id, event = %event.id, error = %e, "failed to purge stale stream event");
                    count.record_failed();
                }
            }
        }
        Ok(count)
    }
}
