//! A participant's device-side session in one classroom.
//!
//! Voting is optimistic: the local "voted" flag for a poll is raised before
//! the ledger round-trip so the UI can disable the buttons at once, and is
//! put back the way it was if the submission fails. The failure is then
//! surfaced as a [`SessionError`] whose [`user_message`] is a retry prompt.
//!
//! [`user_message`]: SessionError::user_message

use std::collections::HashMap;

use pulse_events::{ChatError, ChatRoom};
use pulse_ledger::{LedgerError, VoteLedger, VoteOutcome};
use pulse_store::IdentityProvider;
use pulse_types::{Attendee, ChatMessage, ClassroomId, Epoch, ParticipantId, Poll, PollId};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors surfaced to the participant.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The vote was not recorded. The local flag has been rolled back.
    #[error("vote on poll {poll} failed: {source}")]
    VoteFailed {
        /// The poll.
        poll: PollId,
        /// Why the ledger refused or failed.
        source: LedgerError,
    },

    /// A submission for this poll is still in flight.
    #[error("a vote on poll {0} is already being submitted")]
    VoteInFlight(PollId),

    /// Joining the classroom failed.
    #[error("join failed: {0}")]
    Join(#[source] LedgerError),

    /// Sending a chat message failed.
    #[error("chat failed: {0}")]
    Chat(#[from] ChatError),
}

impl SessionError {
    /// Whether trying again later may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::VoteFailed { source, .. } | Self::Join(source) => source.is_transient(),
            Self::VoteInFlight(_) => true,
            Self::Chat(ChatError::Store(e)) => e.is_transient(),
            Self::Chat(_) => false,
        }
    }

    /// Short text for the participant's screen.
    pub fn user_message(&self) -> String {
        match self {
            Self::VoteFailed { .. } if self.is_retryable() => {
                "Your vote didn't go through. Tap your answer to try again.".to_owned()
            }
            Self::VoteFailed {
                source: LedgerError::PollNotAccepting { .. } | LedgerError::PollNotPresented(_),
                ..
            } => "Voting is closed for this question.".to_owned(),
            Self::VoteFailed {
                source: LedgerError::ClassroomInactive(_),
                ..
            } => "This classroom is not active right now.".to_owned(),
            Self::VoteFailed { .. } => "Your vote could not be recorded.".to_owned(),
            Self::VoteInFlight(_) => "Sending your vote...".to_owned(),
            Self::Join(_) if self.is_retryable() => {
                "Couldn't join the classroom. Please try again.".to_owned()
            }
            Self::Join(_) => "This classroom is not available.".to_owned(),
            Self::Chat(ChatError::EmptyMessage) => "Type a message first.".to_owned(),
            Self::Chat(ChatError::MessageTooLong { max, .. }) => {
                format!("Messages can be at most {max} characters.")
            }
            Self::Chat(_) if self.is_retryable() => {
                "Your message didn't send. Please try again.".to_owned()
            }
            Self::Chat(e) => e.to_string(),
        }
    }
}

/// Local vote state for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteFlag {
    /// Submitted, awaiting the ledger.
    Pending,
    /// Counted (or already counted) in this epoch.
    Voted(Epoch),
}

/// One participant's view of a classroom.
#[derive(Debug)]
pub struct ParticipantSession<I> {
    ledger: VoteLedger,
    chat: ChatRoom,
    identity: I,
    classroom_id: ClassroomId,
    flags: Mutex<HashMap<PollId, VoteFlag>>,
}

impl<I: IdentityProvider> ParticipantSession<I> {
    /// Start a session for the participant `identity` resolves to.
    pub fn new(ledger: VoteLedger, chat: ChatRoom, identity: I, classroom_id: ClassroomId) -> Self {
        Self {
            ledger,
            chat,
            identity,
            classroom_id,
            flags: Mutex::new(HashMap::new()),
        }
    }

    /// The classroom this session belongs to.
    pub const fn classroom_id(&self) -> ClassroomId {
        self.classroom_id
    }

    /// The participant, established on first use.
    pub fn participant_id(&self) -> ParticipantId {
        self.identity.ensure_identity()
    }

    /// Join the classroom under `display_name`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Join`] if the ledger refuses or fails.
    pub async fn join(&self, display_name: &str) -> Result<Attendee, SessionError> {
        self.ledger
            .join_classroom(self.classroom_id, self.participant_id(), display_name)
            .await
            .map_err(SessionError::Join)
    }

    /// Whether the local flag says this participant voted in `poll`'s
    /// current epoch, or a vote is being submitted.
    pub async fn has_voted(&self, poll: &Poll) -> bool {
        match self.flags.lock().await.get(&poll.id) {
            Some(VoteFlag::Pending) => true,
            Some(VoteFlag::Voted(epoch)) => *epoch == poll.reset_epoch,
            None => false,
        }
    }

    /// Vote for `option_index` on `poll_id`.
    ///
    /// The local flag is raised before the ledger call. On success it
    /// records the epoch the vote belongs to; on failure it is restored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::VoteInFlight`] if a submission for this poll
    /// has not finished, or [`SessionError::VoteFailed`] if the ledger
    /// rejected or failed the vote.
    pub async fn vote(&self, poll_id: PollId, option_index: usize) -> Result<VoteOutcome, SessionError> {
        let previous = {
            let mut flags = self.flags.lock().await;
            let previous = flags.get(&poll_id).copied();
            if previous == Some(VoteFlag::Pending) {
                return Err(SessionError::VoteInFlight(poll_id));
            }
            flags.insert(poll_id, VoteFlag::Pending);
            previous
        };

        let participant = self.participant_id();
        let result = self
            .ledger
            .submit_vote(poll_id, participant, option_index)
            .await;

        let mut flags = self.flags.lock().await;
        match result {
            Ok(outcome) => {
                let epoch = match &outcome {
                    VoteOutcome::Counted { epoch, .. } | VoteOutcome::AlreadyVoted { epoch } => *epoch,
                };
                flags.insert(poll_id, VoteFlag::Voted(epoch));
                debug!(poll = %poll_id, %participant, %epoch, counted = outcome.is_counted(), "vote settled");
                Ok(outcome)
            }
            Err(source) => {
                match previous {
                    Some(flag) => flags.insert(poll_id, flag),
                    None => flags.remove(&poll_id),
                };
                warn!(poll = %poll_id, %participant, error = %source, "vote failed, local flag rolled back");
                Err(SessionError::VoteFailed {
                    poll: poll_id,
                    source,
                })
            }
        }
    }

    /// Post `text` to the classroom chat.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Chat`] for invalid text, a closed classroom,
    /// or a store failure.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, SessionError> {
        Ok(self
            .chat
            .send(self.classroom_id, self.participant_id(), text)
            .await?)
    }

    /// The most recent chat messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Chat`] on store failure.
    pub fn recent_messages(&self) -> Result<Vec<ChatMessage>, SessionError> {
        Ok(self.chat.recent(self.classroom_id)?)
    }
}
