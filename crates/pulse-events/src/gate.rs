//! Epoch filtering for stream consumers.
//!
//! Events and poll documents arrive through separate subscriptions, so an
//! event from a newly started epoch can reach the consumer before the poll
//! document that announces the epoch. The gate therefore distinguishes
//! three cases by comparing epochs, never timestamps:
//!
//! - same epoch: admit
//! - older epoch: stale, drop
//! - newer epoch: defer until [`EpochGate::advance`] reaches it

use std::collections::BTreeMap;

use pulse_types::{Epoch, StreamEvent};

/// What the gate decided for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The event belongs to the current epoch.
    Accept(StreamEvent),
    /// The event belongs to an older epoch and must be ignored.
    Stale,
    /// The event belongs to a newer epoch and was held back.
    Deferred,
}

/// Filters stream events against the consumer's known poll epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochGate {
    current: Epoch,
    deferred: BTreeMap<Epoch, Vec<StreamEvent>>,
}

impl EpochGate {
    /// Create a gate for a poll currently at `epoch`.
    pub const fn new(epoch: Epoch) -> Self {
        Self {
            current: epoch,
            deferred: BTreeMap::new(),
        }
    }

    /// The epoch the gate currently admits.
    pub const fn current(&self) -> Epoch {
        self.current
    }

    /// Number of events held for a future epoch.
    pub fn deferred_len(&self) -> usize {
        self.deferred.values().map(Vec::len).sum()
    }

    /// Classify `event`.
    pub fn admit(&mut self, event: StreamEvent) -> Admission {
        match event.epoch.cmp(&self.current) {
            core::cmp::Ordering::Equal => Admission::Accept(event),
            core::cmp::Ordering::Less => Admission::Stale,
            core::cmp::Ordering::Greater => {
                self.deferred.entry(event.epoch).or_default().push(event);
                Admission::Deferred
            }
        }
    }

    /// Move the gate to `epoch`.
    ///
    /// Returns `None` if `epoch` is not newer than the current one.
    /// Otherwise returns the deferred events of exactly `epoch`, in arrival
    /// order; deferred events of older epochs are discarded and those of
    /// even newer epochs stay held.
    pub fn advance(&mut self, epoch: Epoch) -> Option<Vec<StreamEvent>> {
        if epoch <= self.current {
            return None;
        }
        self.current = epoch;
        let mut later = self.deferred.split_off(&epoch);
        self.deferred.clear();
        let released = later.remove(&epoch).unwrap_or_default();
        self.deferred = later;
        Some(released)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pulse_types::{PollId, StreamEventId};

    use super::*;

    fn event(epoch: u64) -> StreamEvent {
        StreamEvent {
            id: StreamEventId::new(),
            poll_id: PollId::new(),
            option_index: 0,
            timestamp: Utc::now(),
            epoch: Epoch(epoch),
        }
    }

    #[test]
    fn current_epoch_is_accepted_older_is_stale() {
        let mut gate = EpochGate::new(Epoch(5));
        assert!(matches!(gate.admit(event(5)), Admission::Accept(_)));
        assert_eq!(gate.admit(event(4)), Admission::Stale);
    }

    #[test]
    fn newer_events_are_released_on_advance() {
        let mut gate = EpochGate::new(Epoch(5));
        let early = event(7);
        let early_id = early.id;
        assert_eq!(gate.admit(early), Admission::Deferred);
        assert_eq!(gate.admit(event(6)), Admission::Deferred);
        assert_eq!(gate.admit(event(9)), Admission::Deferred);
        assert_eq!(gate.deferred_len(), 3);

        let released = gate.advance(Epoch(7)).unwrap_or_default();
        assert_eq!(released.len(), 1);
        assert_eq!(released.first().map(|e| e.id), Some(early_id));
        // Epoch 6 was skipped and discarded, epoch 9 is still held.
        assert_eq!(gate.deferred_len(), 1);
        assert_eq!(gate.current(), Epoch(7));
    }

    #[test]
    fn advancing_backwards_is_ignored() {
        let mut gate = EpochGate::new(Epoch(5));
        assert!(gate.advance(Epoch(5)).is_none());
        assert!(gate.advance(Epoch(3)).is_none());
        assert_eq!(gate.current(), Epoch(5));
    }
}
