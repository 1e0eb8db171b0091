//! Poll lifecycle transitions.
//!
//! | From | Action | To |
//! |------|--------|----|
//! | draft | launch | active |
//! | active | lock | locked |
//! | locked | resume | active |
//! | active, locked | end | ended |
//! | active, locked | reset | unchanged (new epoch) |
//!
//! Every other pair is rejected.

use pulse_types::PollStatus;

/// A presenter action on a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollAction {
    /// Open a draft poll for voting.
    Launch,
    /// Temporarily stop accepting votes.
    Lock,
    /// Accept votes again after a lock.
    Resume,
    /// Close the poll for good.
    End,
    /// Discard all votes and start a new epoch.
    Reset,
}

impl core::fmt::Display for PollAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Launch => "launch",
            Self::Lock => "lock",
            Self::Resume => "resume",
            Self::End => "end",
            Self::Reset => "reset",
        };
        f.write_str(s)
    }
}

/// The status a poll in `from` moves to under `action`, or `None` if the
/// pair is not allowed.
pub const fn transition(from: PollStatus, action: PollAction) -> Option<PollStatus> {
    match (from, action) {
        (PollStatus::Draft, PollAction::Launch) | (PollStatus::Locked, PollAction::Resume) => {
            Some(PollStatus::Active)
        }
        (PollStatus::Active, PollAction::Lock) => Some(PollStatus::Locked),
        (PollStatus::Active | PollStatus::Locked, PollAction::End) => Some(PollStatus::Ended),
        (status @ (PollStatus::Active | PollStatus::Locked), PollAction::Reset) => Some(status),
        _ => None,
    }
}

/// The action `toggle_lock` stands for in `status`.
pub const fn toggle_lock_action(status: PollStatus) -> PollAction {
    match status {
        PollStatus::Locked => PollAction::Resume,
        PollStatus::Draft | PollStatus::Active | PollStatus::Ended => PollAction::Lock,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [PollStatus; 4] = [
        PollStatus::Draft,
        PollStatus::Active,
        PollStatus::Locked,
        PollStatus::Ended,
    ];
    const ALL_ACTIONS: [PollAction; 5] = [
        PollAction::Launch,
        PollAction::Lock,
        PollAction::Resume,
        PollAction::End,
        PollAction::Reset,
    ];

    #[test]
    fn allowed_transitions_match_table() {
        let mut allowed = Vec::new();
        for from in ALL_STATUSES {
            for action in ALL_ACTIONS {
                if let Some(to) = transition(from, action) {
                    allowed.push((from, action, to));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (PollStatus::Draft, PollAction::Launch, PollStatus::Active),
                (PollStatus::Active, PollAction::Lock, PollStatus::Locked),
                (PollStatus::Active, PollAction::End, PollStatus::Ended),
                (PollStatus::Active, PollAction::Reset, PollStatus::Active),
                (PollStatus::Locked, PollAction::Resume, PollStatus::Active),
                (PollStatus::Locked, PollAction::End, PollStatus::Ended),
                (PollStatus::Locked, PollAction::Reset, PollStatus::Locked),
            ]
        );
    }

    #[test]
    fn ended_is_terminal() {
        for action in ALL_ACTIONS {
            assert_eq!(transition(PollStatus::Ended, action), None);
        }
    }

    #[test]
    fn toggle_lock_flips() {
        assert_eq!(toggle_lock_action(PollStatus::Active), PollAction::Lock);
        assert_eq!(toggle_lock_action(PollStatus::Locked), PollAction::Resume);
    }
}
