//! Real-time document store for the Pulse engagement engine.
//!
//! The engine talks to a remote real-time store through a small contract:
//! point reads and writes, live subscriptions, and optimistic multi-document
//! transactions. [`MemoryStore`] implements that contract in-process and is
//! what the service binary and every test run against.
//!
//! # Modules
//!
//! - [`paths`] -- Document path layout
//! - [`memory`] -- The [`MemoryStore`] itself
//! - [`transaction`] -- Snapshots, write sets and transaction outcomes
//! - [`subscription`] -- Watches, change notifications, subscription handles
//! - [`identity`] -- Participant identity provider
//! - [`error`] -- [`StoreError`]

pub mod error;
pub mod identity;
pub mod memory;
pub mod paths;
pub mod subscription;
pub mod transaction;

pub use error::StoreError;
pub use identity::{AnonymousIdentity, IdentityProvider};
pub use memory::{DEFAULT_MAX_ATTEMPTS, MemoryStore};
pub use subscription::{Change, ChangeKind, Subscription, Watch};
pub use transaction::{TxOutcome, TxSnapshot, Write, WriteSet};
