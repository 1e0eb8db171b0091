//! Live, epoch-filtered view of one poll's vote stream.
//!
//! A [`StreamFeed`] holds two subscriptions: the poll document and the
//! poll's event collection. It turns their changes into discrete
//! [`FeedMessage`]s for the presentation loop. Events are passed through an
//! [`EpochGate`] so that only events of the poll's current epoch are
//! yielded, and a reset is reported before any event of the new epoch.

use std::collections::VecDeque;

use pulse_store::{Change, ChangeKind, MemoryStore, Subscription, Watch, paths};
use pulse_types::{Epoch, Poll, PollId, StreamEvent};
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::gate::{Admission, EpochGate};

/// A message produced by a [`StreamFeed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A counted vote of the current epoch: spawn a particle for it.
    Spawn(StreamEvent),
    /// The poll was reset. Everything from older epochs must be cleared.
    Reset {
        /// The new epoch.
        epoch: Epoch,
    },
    /// The poll document changed (status, options, epoch).
    PollChanged(Poll),
    /// The poll document was deleted.
    PollRemoved,
}

/// Epoch-gated subscription to a poll's stream events.
#[derive(Debug)]
pub struct StreamFeed {
    poll_id: PollId,
    poll_sub: Subscription,
    events_sub: Subscription,
    gate: EpochGate,
    pending: VecDeque<FeedMessage>,
}

impl StreamFeed {
    /// Open a feed for `poll_id`.
    ///
    /// The poll is read first so the gate starts at the poll's current
    /// epoch; events already stored for that epoch are yielded as spawns.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::PollNotFound`] if the poll does not exist, or
    /// [`StreamError::Store`] if a subscription cannot be opened.
    pub fn open(store: &MemoryStore, poll_id: PollId) -> Result<Self, StreamError> {
        let poll: Poll = store
            .get_json(&paths::poll(poll_id))?
            .ok_or(StreamError::PollNotFound(poll_id))?;
        let poll_sub = store.subscribe(Watch::Document(paths::poll(poll_id)))?;
        let events_sub = store.subscribe(Watch::Collection(paths::events(poll_id)))?;
        info!(poll = %poll_id, epoch = %poll.reset_epoch, "stream feed opened");
        Ok(Self {
            poll_id,
            poll_sub,
            events_sub,
            gate: EpochGate::new(poll.reset_epoch),
            pending: VecDeque::new(),
        })
    }

    /// The poll this feed follows.
    pub const fn poll_id(&self) -> PollId {
        self.poll_id
    }

    /// The epoch currently admitted.
    pub const fn epoch(&self) -> Epoch {
        self.gate.current()
    }

    /// Wait for the next message.
    ///
    /// Poll document changes are handled before event changes when both
    /// are ready. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<FeedMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }
            tokio::select! {
                biased;
                change = self.poll_sub.next() => self.on_poll_change(change?),
                change = self.events_sub.next() => self.on_event_change(change?),
            }
        }
    }

    /// Return the next message if one is ready without waiting.
    pub fn try_next(&mut self) -> Option<FeedMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }
            if let Some(change) = self.poll_sub.try_next() {
                self.on_poll_change(change);
            } else if let Some(change) = self.events_sub.try_next() {
                self.on_event_change(change);
            } else {
                return None;
            }
        }
    }

    /// Release both subscriptions.
    pub fn close(self) {
        debug!(poll = %self.poll_id, "stream feed closed");
        drop(self);
    }

    fn on_poll_change(&mut self, change: Change) {
        if change.kind == ChangeKind::Removed {
            self.pending.push_back(FeedMessage::PollRemoved);
            return;
        }
        let poll: Poll = match change.decode() {
            Ok(Some(poll)) => poll,
            Ok(None) => return,
            Err(e) => {
                warn!(poll = %self.poll_id, error = %e, "undecodable poll document");
                return;
            }
        };
        let epoch = poll.reset_epoch;
        self.pending.push_back(FeedMessage::PollChanged(poll));
        if let Some(released) = self.gate.advance(epoch) {
            debug!(poll = %self.poll_id, %epoch, released = released.len(), "feed advanced to new epoch");
            self.pending.push_back(FeedMessage::Reset { epoch });
            self.pending
                .extend(released.into_iter().map(FeedMessage::Spawn));
        }
    }

    fn on_event_change(&mut self, change: Change) {
        // Events are append-only; only additions matter.
        if change.kind != ChangeKind::Added {
            return;
        }
        let event: StreamEvent = match change.decode() {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!(poll = %self.poll_id, error = %e, "undecodable stream event");
                return;
            }
        };
        match self.gate.admit(event) {
            Admission::Accept(event) => self.pending.push_back(FeedMessage::Spawn(event)),
            Admission::Stale => debug!(poll = %self.poll_id, "stale stream event ignored"),
            Admission::Deferred => debug!(poll = %self.poll_id, "stream event deferred until its epoch"),
        }
    }
}
