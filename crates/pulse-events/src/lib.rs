//! Vote stream events and classroom chat for the Pulse engagement engine.
//!
//! Every counted vote is appended to the poll's stream as one
//! [`StreamEvent`](pulse_types::StreamEvent) tagged with the poll epoch.
//! The presentation loop consumes the stream through a [`StreamFeed`],
//! which admits only events of the poll's current epoch.
//!
//! # Modules
//!
//! - [`publisher`] -- Append-only event writer and stale-epoch purge
//! - [`gate`] -- Epoch comparison for consumers
//! - [`feed`] -- Live epoch-gated feed of one poll
//! - [`chat`] -- Classroom chat, live chat window, spotlight
//! - [`error`] -- [`StreamError`] and [`ChatError`]

pub mod chat;
pub mod error;
pub mod feed;
pub mod gate;
pub mod publisher;

pub use chat::{ChatFeed, ChatRoom, ChatSettings};
pub use error::{ChatError, StreamError};
pub use feed::{FeedMessage, StreamFeed};
pub use gate::{Admission, EpochGate};
pub use publisher::{PurgeCount, StreamPublisher};
