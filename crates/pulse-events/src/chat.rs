//! Classroom chat.
//!
//! Messages are append-only documents under `classrooms/{id}/messages`.
//! Sending is gated by the classroom's `is_active` flag and requires the
//! sender to have joined. Readers only ever see the most recent
//! `history_limit` messages, oldest first.

use std::cmp::Ordering;

use chrono::Utc;
use pulse_store::{
    Change, ChangeKind, MemoryStore, Subscription, TxOutcome, Watch, WriteSet, paths,
};
use pulse_types::{Attendee, ChatMessage, Classroom, ClassroomId, MessageId, ParticipantId};
use tracing::{debug, info, warn};

use crate::error::ChatError;

/// Default number of messages a reader sees.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default maximum message length in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 500;

/// Chat limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    /// Number of most recent messages shown to readers.
    pub history_limit: usize,
    /// Maximum trimmed message length, in characters.
    pub max_message_len: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

fn chronological(a: &ChatMessage, b: &ChatMessage) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id))
}

/// Keep the last `limit` messages of an already sorted list.
fn keep_recent(messages: &mut Vec<ChatMessage>, limit: usize) {
    let excess = messages.len().saturating_sub(limit);
    if excess > 0 {
        messages.drain(..excess);
    }
}

/// Chat operations for every classroom in a store.
#[derive(Debug, Clone)]
pub struct ChatRoom {
    store: MemoryStore,
    settings: ChatSettings,
}

impl ChatRoom {
    /// Create a chat room over `store`.
    pub const fn new(store: MemoryStore, settings: ChatSettings) -> Self {
        Self { store, settings }
    }

    /// The configured limits.
    pub const fn settings(&self) -> ChatSettings {
        self.settings
    }

    /// Post `text` to `classroom_id` as `sender_id`.
    ///
    /// The classroom and attendee are read in the same transaction as the
    /// message is written, so a message can never land in a classroom that
    /// was deactivated concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyMessage`] or [`ChatError::MessageTooLong`]
    /// for invalid text, [`ChatError::ClassroomNotFound`],
    /// [`ChatError::ClassroomInactive`] or [`ChatError::NotJoined`] when
    /// the sender may not post, and [`ChatError::Store`] on store failure.
    pub async fn send(
        &self,
        classroom_id: ClassroomId,
        sender_id: ParticipantId,
        text: &str,
    ) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > self.settings.max_message_len {
            return Err(ChatError::MessageTooLong {
                len,
                max: self.settings.max_message_len,
            });
        }

        let classroom_path = paths::classroom(classroom_id);
        let attendee_path = paths::attendee(classroom_id, sender_id);
        let message_id = MessageId::new();

        let result = self
            .store
            .transact(&[classroom_path.clone(), attendee_path.clone()], |snap| {
                let Some(classroom) = snap.get_json::<Classroom>(&classroom_path)? else {
                    return Ok(TxOutcome::read_only(Err(ChatError::ClassroomNotFound(
                        classroom_id,
                    ))));
                };
                if !classroom.is_active {
                    return Ok(TxOutcome::read_only(Err(ChatError::ClassroomInactive(
                        classroom_id,
                    ))));
                }
                let Some(attendee) = snap.get_json::<Attendee>(&attendee_path)? else {
                    return Ok(TxOutcome::read_only(Err(ChatError::NotJoined {
                        classroom: classroom_id,
                        participant: sender_id,
                    })));
                };
                let message = ChatMessage {
                    id: message_id,
                    classroom_id,
                    sender_id,
                    sender_name: attendee.display_name,
                    text: text.to_owned(),
                    timestamp: Utc::now(),
                };
                let mut writes = WriteSet::new();
                writes.set_json(paths::message(classroom_id, message_id), &message)?;
                Ok(TxOutcome::commit(writes, Ok(message)))
            })
            .await?;

        if let Ok(message) = &result {
            debug!(classroom = %classroom_id, message = %message.id, sender = %sender_id, "chat message sent");
        }
        result
    }

    /// The most recent messages of `classroom_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the messages cannot be listed.
    pub fn recent(&self, classroom_id: ClassroomId) -> Result<Vec<ChatMessage>, ChatError> {
        let mut messages: Vec<ChatMessage> = self.store.list_json(&paths::messages(classroom_id))?;
        messages.sort_by(chronological);
        keep_recent(&mut messages, self.settings.history_limit);
        Ok(messages)
    }

    /// Spotlight a message: bump its sender's `spotlight_count`.
    ///
    /// Returns the updated attendee.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::MessageNotFound`] if the message does not
    /// exist, [`ChatError::NotJoined`] if its sender has no attendee
    /// record, and [`ChatError::Store`] on store failure.
    pub async fn spotlight(
        &self,
        classroom_id: ClassroomId,
        message_id: MessageId,
    ) -> Result<Attendee, ChatError> {
        let message: ChatMessage = self
            .store
            .get_json(&paths::message(classroom_id, message_id))?
            .ok_or(ChatError::MessageNotFound(message_id))?;
        let attendee_path = paths::attendee(classroom_id, message.sender_id);

        let result = self
            .store
            .transact(std::slice::from_ref(&attendee_path), |snap| {
                let Some(mut attendee) = snap.get_json::<Attendee>(&attendee_path)? else {
                    return Ok(TxOutcome::read_only(Err(ChatError::NotJoined {
                        classroom: classroom_id,
                        participant: message.sender_id,
                    })));
                };
                attendee.spotlight_count = attendee.spotlight_count.saturating_add(1);
                let mut writes = WriteSet::new();
                writes.set_json(attendee_path.clone(), &attendee)?;
                Ok(TxOutcome::commit(writes, Ok(attendee)))
            })
            .await?;

        if let Ok(attendee) = &result {
            info!(
                classroom = %classroom_id,
                message = %message_id,
                participant = %attendee.participant_id,
                spotlight_count = attendee.spotlight_count,
                "message spotlighted"
            );
        }
        result
    }

    /// Open a live view of the most recent messages of `classroom_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the subscription cannot be opened.
    pub fn feed(&self, classroom_id: ClassroomId) -> Result<ChatFeed, ChatError> {
        let sub = self
            .store
            .subscribe(Watch::Collection(paths::messages(classroom_id)))?;
        let mut feed = ChatFeed {
            sub,
            limit: self.settings.history_limit,
            messages: Vec::new(),
        };
        // Fold in the initial snapshot so the window is ready immediately.
        while let Some(change) = feed.sub.try_next() {
            feed.apply(&change);
        }
        Ok(feed)
    }
}

/// Live window over the most recent messages of one classroom.
#[derive(Debug)]
pub struct ChatFeed {
    sub: Subscription,
    limit: usize,
    messages: Vec<ChatMessage>,
}

impl ChatFeed {
    /// The current window, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Wait for the next change and fold it into the window.
    ///
    /// Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        let Some(change) = self.sub.next().await else {
            return false;
        };
        self.apply(&change);
        while let Some(change) = self.sub.try_next() {
            self.apply(&change);
        }
        true
    }

    /// Release the subscription.
    pub fn close(self) {
        drop(self);
    }

    fn apply(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Removed => {
                self.messages
                    .retain(|m| m.id.to_string() != change.id());
            }
            ChangeKind::Added | ChangeKind::Modified => match change.decode::<ChatMessage>() {
                Ok(Some(message)) => {
                    self.messages.retain(|m| m.id != message.id);
                    let at = self
                        .messages
                        .partition_point(|m| chronological(m, &message) == Ordering::Less);
                    self.messages.insert(at, message);
                    keep_recent(&mut self.messages, self.limit);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %change.path, error = %e, "undecodable chat message"),
            },
        }
    }
}
