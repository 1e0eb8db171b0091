//! Vote ledger and poll state machine for the Pulse engagement engine.
//!
//! Every vote in a classroom poll is accounted for through this crate. The
//! ledger guarantees that, per poll epoch, each participant is counted at
//! most once and that the aggregate counters always equal the number of
//! vote records they summarize:
//!
//! ```text
//! counters.total == sum(counters.counts_by_option) == |votes in epoch|
//! ```
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`VoteLedger`]: classrooms, polls, votes, resets.
//! - [`lifecycle`] -- The poll transition table.
//! - [`consistency`] -- Recount and compare counters with vote records.
//! - [`participation`] -- Per-attendee participation rates.
//!
//! The ledger never panics; it returns errors.

pub mod consistency;
pub mod ledger;
pub mod lifecycle;
pub mod participation;

pub use consistency::{CounterAnomaly, CounterCheck, verify_counters};
pub use ledger::{LedgerOptions, MAX_OPTIONS, MIN_OPTIONS, ResetReport, VoteLedger, VoteOutcome};
pub use lifecycle::{PollAction, transition};
pub use participation::{ParticipationReport, ParticipationRow, participation_rate};

use pulse_store::StoreError;
use pulse_types::{ClassroomId, PollId, PollStatus};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The classroom does not exist.
    #[error("classroom not found: {0}")]
    ClassroomNotFound(ClassroomId),

    /// The poll does not exist.
    #[error("poll not found: {0}")]
    PollNotFound(PollId),

    /// The classroom is closed to participant interaction.
    #[error("classroom {0} is not active")]
    ClassroomInactive(ClassroomId),

    /// The poll is not the classroom's active poll, so participants are not
    /// shown it and may not vote on it.
    #[error("poll {0} is not the classroom's active poll")]
    PollNotPresented(PollId),

    /// The poll is not accepting votes in its current status.
    #[error("poll {poll} is not accepting votes (status {status})")]
    PollNotAccepting {
        /// The poll.
        poll: PollId,
        /// Its current status.
        status: PollStatus,
    },

    /// The option index does not exist on the poll.
    #[error("option {index} out of range for a poll with {options} options")]
    OptionOutOfRange {
        /// The submitted index.
        index: usize,
        /// Number of options on the poll.
        options: usize,
    },

    /// The action is not allowed in the poll's current status.
    #[error("cannot {action} poll {poll} in status {from}")]
    InvalidTransition {
        /// The poll.
        poll: PollId,
        /// Its current status.
        from: PollStatus,
        /// The rejected action.
        action: PollAction,
    },

    /// The poll can no longer be edited.
    #[error("poll {poll} is {status} and can no longer be edited")]
    NotEditable {
        /// The poll.
        poll: PollId,
        /// Its current status.
        status: PollStatus,
    },

    /// Input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A counter would overflow.
    #[error("counter overflow on poll {0}")]
    CounterOverflow(PollId),
}

impl LedgerError {
    /// Whether retrying the same operation later may succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
