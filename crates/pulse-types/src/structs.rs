//! Document structs stored in the real-time store.
//!
//! Each struct here maps 1:1 to a document at a path listed in
//! `pulse_store::paths`. Documents are serialized as plain JSON objects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::PollStatus;
use crate::epoch::Epoch;
use crate::ids::{ClassroomId, MessageId, ParticipantId, PollId, StreamEventId};

// ---------------------------------------------------------------------------
// Classroom
// ---------------------------------------------------------------------------

/// A presenter's live session: the container for polls, chat and attendees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Classroom {
    /// Classroom identifier.
    pub id: ClassroomId,
    /// Display name shown to participants.
    pub name: String,
    /// Gate for all participant interaction (votes and chat).
    pub is_active: bool,
    /// The poll currently shown to participants, if any.
    pub active_poll_id: Option<PollId>,
    /// Number of distinct poll launches, used for participation rates.
    pub total_polls_count: u64,
    /// When the classroom was created.
    pub created_at: DateTime<Utc>,
}

impl Classroom {
    /// Create a new, active classroom with no poll launched.
    pub fn new(name: String) -> Self {
        Self {
            id: ClassroomId::new(),
            name,
            is_active: true,
            active_poll_id: None,
            total_polls_count: 0,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// A single poll question with 2 to 6 options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Poll {
    /// Poll identifier.
    pub id: PollId,
    /// The classroom the poll belongs to.
    pub classroom_id: ClassroomId,
    /// The question text.
    pub prompt: String,
    /// Ordered option texts. A vote refers to an option by its index.
    pub options: Vec<String>,
    /// Lifecycle status.
    pub status: PollStatus,
    /// When the poll was created.
    pub created_at: DateTime<Utc>,
    /// The current reset epoch. Votes and events from older epochs are
    /// ignored by every reader.
    pub reset_epoch: Epoch,
}

impl Poll {
    /// Return the text of option `index`, if it exists.
    pub fn option(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Votes and counters
// ---------------------------------------------------------------------------

/// One participant's vote within one poll epoch.
///
/// Stored at a key derived from the participant ID, so a second write for
/// the same participant and epoch collides with the first instead of
/// creating a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteRecord {
    /// The voter.
    pub participant_id: ParticipantId,
    /// Index into [`Poll::options`].
    pub option_index: usize,
    /// The epoch the vote was counted in.
    pub epoch: Epoch,
    /// When the vote was committed.
    pub submitted_at: DateTime<Utc>,
}

/// Per-poll vote totals for a single epoch.
///
/// Invariant: `total == counts_by_option.values().sum()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AggregateCounters {
    /// Votes per option index. Options with no votes may be absent.
    pub counts_by_option: BTreeMap<usize, u64>,
    /// Total votes across all options.
    pub total: u64,
    /// The epoch these counters belong to.
    pub epoch: Epoch,
}

impl AggregateCounters {
    /// Zeroed counters for `epoch`.
    pub const fn zeroed(epoch: Epoch) -> Self {
        Self {
            counts_by_option: BTreeMap::new(),
            total: 0,
            epoch,
        }
    }

    /// Count one vote for `option_index`.
    ///
    /// Returns `None` (leaving the counters untouched) if either the option
    /// count or the total would overflow.
    pub fn increment(&mut self, option_index: usize) -> Option<()> {
        let current = self.count(option_index);
        let next = current.checked_add(1)?;
        let total = self.total.checked_add(1)?;
        self.counts_by_option.insert(option_index, next);
        self.total = total;
        Some(())
    }

    /// Votes counted for `option_index`.
    pub fn count(&self, option_index: usize) -> u64 {
        self.counts_by_option
            .get(&option_index)
            .copied()
            .unwrap_or(0)
    }

    /// Sum of the per-option counts, or `None` on overflow.
    pub fn option_sum(&self) -> Option<u64> {
        self.counts_by_option
            .values()
            .try_fold(0_u64, |acc, n| acc.checked_add(*n))
    }
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

/// Append-only record published once per counted vote, consumed by the
/// particle visualization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StreamEvent {
    /// Event identifier; becomes the particle ID.
    pub id: StreamEventId,
    /// The poll voted on.
    pub poll_id: PollId,
    /// The option voted for.
    pub option_index: usize,
    /// Writer-side wall-clock time. Informational only.
    pub timestamp: DateTime<Utc>,
    /// The poll epoch the vote was counted in.
    pub epoch: Epoch,
}

// ---------------------------------------------------------------------------
// Attendees and chat
// ---------------------------------------------------------------------------

/// A participant who joined a classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Attendee {
    /// The participant.
    pub participant_id: ParticipantId,
    /// Name shown next to chat messages.
    pub display_name: String,
    /// Votes counted across all polls of the classroom.
    pub vote_count: u64,
    /// Times the presenter spotlighted one of this attendee's messages.
    pub spotlight_count: u64,
    /// When the participant first joined.
    pub joined_at: DateTime<Utc>,
}

/// A chat message in a classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// The classroom the message was posted to.
    pub classroom_id: ClassroomId,
    /// The author.
    pub sender_id: ParticipantId,
    /// The author's display name at send time.
    pub sender_name: String,
    /// Message body (trimmed, non-empty).
    pub text: String,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_stay_consistent() {
        let mut counters = AggregateCounters::zeroed(Epoch(1));
        assert!(counters.increment(0).is_some());
        assert!(counters.increment(0).is_some());
        assert!(counters.increment(1).is_some());
        assert_eq!(counters.count(0), 2);
        assert_eq!(counters.count(1), 1);
        assert_eq!(counters.count(5), 0);
        assert_eq!(counters.total, 3);
        assert_eq!(counters.option_sum(), Some(3));
    }

    #[test]
    fn counter_overflow_is_rejected() {
        let mut counters = AggregateCounters::zeroed(Epoch(1));
        counters.counts_by_option.insert(0, u64::MAX);
        counters.total = u64::MAX;
        assert!(counters.increment(0).is_none());
        assert_eq!(counters.count(0), u64::MAX);
    }

    #[test]
    fn counters_roundtrip_with_integer_keys() {
        let mut counters = AggregateCounters::zeroed(Epoch(7));
        let _ = counters.increment(3);
        let json = serde_json::to_value(&counters).ok();
        let back: Option<AggregateCounters> =
            json.and_then(|v| serde_json::from_value(v).ok());
        assert_eq!(back, Some(counters));
    }
}
