//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Poll lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle status of a poll.
///
/// ```text
/// Draft --> Active <--> Locked --> Ended
///              \___________________^
/// ```
///
/// `Ended` is terminal for a poll instance; a new poll must be created to
/// collect more votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PollStatus {
    /// Being authored. Prompt and options may still be edited.
    Draft,
    /// Live and accepting votes.
    Active,
    /// Live but temporarily not accepting votes.
    Locked,
    /// Closed for good.
    Ended,
}

impl PollStatus {
    /// Whether a vote submitted in this status may be counted.
    pub const fn accepts_votes(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the poll has been launched and not yet ended.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Locked)
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl core::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Locked => "locked",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}
