//! Shared application state for the API server.

use chrono::{DateTime, Utc};
use pulse_events::ChatRoom;
use pulse_ledger::VoteLedger;

/// State injected into every handler through Axum's `State` extractor.
///
/// Both the ledger and the chat room are cheap handles onto the same store,
/// so cloning the state never copies data.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Classrooms, polls and votes.
    pub ledger: VoteLedger,
    /// Classroom chat.
    pub chat: ChatRoom,
    /// When the server was started.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state around an existing ledger and chat room.
    pub fn new(ledger: VoteLedger, chat: ChatRoom) -> Self {
        Self {
            ledger,
            chat,
            started_at: Utc::now(),
        }
    }
}
