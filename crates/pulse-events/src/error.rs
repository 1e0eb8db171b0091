//! Error types for stream publishing, stream feeds and chat.

use pulse_store::StoreError;
use pulse_types::{ClassroomId, MessageId, ParticipantId, PollId};

/// Errors raised while publishing or consuming the vote stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The poll a feed was opened for does not exist.
    #[error("poll not found: {0}")]
    PollNotFound(PollId),
}

/// Errors raised by chat operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The classroom does not exist.
    #[error("classroom not found: {0}")]
    ClassroomNotFound(ClassroomId),

    /// The classroom is closed to participant interaction.
    #[error("classroom {0} is not active")]
    ClassroomInactive(ClassroomId),

    /// The sender never joined the classroom.
    #[error("participant {participant} has not joined classroom {classroom}")]
    NotJoined {
        /// The classroom.
        classroom: ClassroomId,
        /// The would-be sender.
        participant: ParticipantId,
    },

    /// The message is empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// The message exceeds the configured length limit.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong {
        /// Length of the trimmed message in characters.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The message to spotlight does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
}
