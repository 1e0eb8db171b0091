//! Document path layout.
//!
//! | Path | Document |
//! |------|----------|
//! | `classrooms/{id}` | [`Classroom`](pulse_types::Classroom) |
//! | `classrooms/{id}/attendees/{participant}` | [`Attendee`](pulse_types::Attendee) |
//! | `classrooms/{id}/messages/{message}` | [`ChatMessage`](pulse_types::ChatMessage) |
//! | `polls/{id}` | [`Poll`](pulse_types::Poll) |
//! | `polls/{id}/epochs/{epoch}/votes/{participant}` | [`VoteRecord`](pulse_types::VoteRecord) |
//! | `stats/{id}` | [`AggregateCounters`](pulse_types::AggregateCounters) |
//! | `streams/{id}/events/{event}` | [`StreamEvent`](pulse_types::StreamEvent) |
//!
//! Votes live under an epoch segment so that the participant key space of
//! each epoch is distinct: a participant who voted before a reset can vote
//! again afterwards without colliding with their old record.

use pulse_types::{ClassroomId, Epoch, MessageId, ParticipantId, PollId, StreamEventId};

/// `classrooms/{id}`
pub fn classroom(id: ClassroomId) -> String {
    format!("classrooms/{id}")
}

/// `classrooms/{id}/attendees`
pub fn attendees(classroom: ClassroomId) -> String {
    format!("classrooms/{classroom}/attendees")
}

/// `classrooms/{id}/attendees/{participant}`
pub fn attendee(classroom: ClassroomId, participant: ParticipantId) -> String {
    format!("classrooms/{classroom}/attendees/{participant}")
}

/// `classrooms/{id}/messages`
pub fn messages(classroom: ClassroomId) -> String {
    format!("classrooms/{classroom}/messages")
}

/// `classrooms/{id}/messages/{message}`
pub fn message(classroom: ClassroomId, message: MessageId) -> String {
    format!("classrooms/{classroom}/messages/{message}")
}

/// `polls`
pub const POLLS: &str = "polls";

/// `polls/{id}`
pub fn poll(id: PollId) -> String {
    format!("polls/{id}")
}

/// Prefix covering the vote records of every epoch of a poll.
pub fn all_votes(poll: PollId) -> String {
    format!("polls/{poll}/epochs/")
}

/// `polls/{id}/epochs/{epoch}/votes`
pub fn votes(poll: PollId, epoch: Epoch) -> String {
    format!("polls/{poll}/epochs/{epoch}/votes")
}

/// `polls/{id}/epochs/{epoch}/votes/{participant}`
pub fn vote(poll: PollId, epoch: Epoch, participant: ParticipantId) -> String {
    format!("polls/{poll}/epochs/{epoch}/votes/{participant}")
}

/// `stats/{id}`
pub fn stats(poll: PollId) -> String {
    format!("stats/{poll}")
}

/// `streams/{id}/events`
pub fn events(poll: PollId) -> String {
    format!("streams/{poll}/events")
}

/// `streams/{id}/events/{event}`
pub fn event(poll: PollId, event: StreamEventId) -> String {
    format!("streams/{poll}/events/{event}")
}

/// The last segment of a path (the document's own ID).
pub fn leaf(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, id)| id)
}

/// Whether `path` is a direct child document of `collection`.
pub fn is_child_of(path: &str, collection: &str) -> bool {
    path.strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|id| !id.is_empty() && !id.contains('/'))
}
