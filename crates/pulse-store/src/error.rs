//! Error types for the store layer.
//!
//! All store operations return [`StoreError`]. Callers at an operation
//! boundary (vote submission, poll control) decide whether an error is
//! worth a retry prompt via [`StoreError::is_transient`].

/// Errors that can occur when talking to the real-time store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A document could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transaction kept losing to concurrent writers and gave up.
    #[error("transaction aborted after {attempts} conflicting attempts")]
    Contention {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The commit sequence counter would overflow.
    #[error("commit sequence overflow")]
    SequenceOverflow,

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store state poisoned")]
    Poisoned,
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. } | Self::Unavailable(_))
    }
}
