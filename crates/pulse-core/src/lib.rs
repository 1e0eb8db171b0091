//! Configuration, presentation loop and participant sessions for Pulse.
//!
//! This crate ties the ledger, the vote stream and the particle simulation
//! together for the two kinds of client:
//!
//! - the presenter, whose view runs a [`presentation`] loop that turns
//!   the poll's stream feed into particles;
//! - the participant, whose [`session`] submits votes optimistically and
//!   posts to chat.
//!
//! # Modules
//!
//! - [`config`] -- Loading `pulse-config.yaml` into strongly-typed structs.
//! - [`control`] -- Teardown signal shared with a running presentation.
//! - [`presentation`] -- The single-task `select!` loop of the presenter view.
//! - [`session`] -- Participant voting with local flag rollback.

pub mod config;
pub mod control;
pub mod presentation;
pub mod session;

pub use config::{ConfigError, LogFormat, PulseConfig};
pub use control::ViewControl;
pub use presentation::{
    PresentationEnd, PresentationError, PresentationHandle, PresentationOptions,
    PresentationSummary, Presented, ViewEvent, run_presentation, spawn_configured_presentation,
    spawn_presentation,
};
pub use session::{ParticipantSession, SessionError};
