//! Shared type definitions for the Pulse live engagement engine.
//!
//! This crate is the single source of truth for the documents exchanged
//! with the real-time store and over the HTTP API. Types flow downstream
//! to `TypeScript` via `ts-rs` for the presenter and participant front ends.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for every document identifier
//! - [`enums`] -- Poll lifecycle status
//! - [`epoch`] -- Monotonic reset epochs
//! - [`structs`] -- Classroom, poll, vote, counter, stream and chat documents

pub mod enums;
pub mod epoch;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::PollStatus;
pub use epoch::Epoch;
pub use ids::{ClassroomId, MessageId, ParticipantId, PollId, StreamEventId};
pub use structs::{
    AggregateCounters, Attendee, ChatMessage, Classroom, Poll, StreamEvent, VoteRecord,
};
