//! HTTP and `WebSocket` API for Pulse.
//!
//! This crate exposes the vote ledger and classroom chat over Axum:
//!
//! - **REST endpoints** for classrooms, attendees, chat, poll authoring,
//!   poll lifecycle control, vote submission and participation analytics
//! - **`WebSocket` endpoint** (`/ws/polls/{id}/events`) streaming a poll's
//!   epoch-filtered vote events to presenter views
//! - **Minimal HTML status page** (`GET /`)
//!
//! Handlers hold no state of their own. Every request goes straight to
//! the [`VoteLedger`](pulse_ledger::VoteLedger) or
//! [`ChatRoom`](pulse_events::ChatRoom) in [`AppState`], so concurrency
//! control stays with the store's transactions.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
pub use ws::WsMessage;
