//! REST endpoint handlers.
//!
//! Every handler is a thin adapter: parse the path ids and JSON body, call
//! the ledger or chat room, and return the resulting document as JSON.
//! Domain errors become HTTP errors through [`ObserverError`]'s `From`
//! impls.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `POST` | `/api/classrooms` | Create a classroom |
//! | `GET` | `/api/classrooms/{id}` | Read a classroom |
//! | `POST` | `/api/classrooms/{id}/active` | Set or toggle the active flag |
//! | `POST` | `/api/classrooms/{id}/join` | Join as an attendee |
//! | `GET` | `/api/classrooms/{id}/attendees` | List attendees |
//! | `POST` | `/api/classrooms/{id}/chat` | Return to chat |
//! | `GET` | `/api/classrooms/{id}/messages` | Recent messages |
//! | `POST` | `/api/classrooms/{id}/messages` | Send a message |
//! | `POST` | `/api/classrooms/{id}/messages/{mid}/spotlight` | Spotlight a message |
//! | `GET` | `/api/classrooms/{id}/participation` | Participation analytics |
//! | `GET` | `/api/classrooms/{id}/polls` | List polls, newest first |
//! | `POST` | `/api/classrooms/{id}/polls` | Create a draft poll |
//! | `GET` | `/api/polls/{id}` | Read a poll |
//! | `PUT` | `/api/polls/{id}` | Edit a draft poll |
//! | `GET` | `/api/polls/{id}/stats` | Aggregate counters |
//! | `POST` | `/api/polls/{id}/launch` | Launch |
//! | `POST` | `/api/polls/{id}/lock` | Lock |
//! | `POST` | `/api/polls/{id}/resume` | Resume |
//! | `POST` | `/api/polls/{id}/end` | End |
//! | `POST` | `/api/polls/{id}/reset` | Reset to a new epoch |
//! | `POST` | `/api/polls/{id}/votes` | Submit a vote |

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use pulse_ledger::VoteOutcome;
use pulse_types::{ClassroomId, MessageId, ParticipantId, PollId};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/classrooms`.
#[derive(Debug, serde::Deserialize)]
pub struct CreateClassroomRequest {
    /// Display name of the classroom.
    pub name: String,
}

/// Body of `POST /api/classrooms/{id}/active`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SetActiveRequest {
    /// New value of the flag. Omitted means toggle.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Body of `POST /api/classrooms/{id}/join`.
#[derive(Debug, serde::Deserialize)]
pub struct JoinRequest {
    /// Existing participant id. A new one is issued when omitted.
    #[serde(default)]
    pub participant_id: Option<ParticipantId>,
    /// Name shown to the presenter.
    pub display_name: String,
}

/// Body of `POST /api/classrooms/{id}/messages`.
#[derive(Debug, serde::Deserialize)]
pub struct SendMessageRequest {
    /// The sender, who must have joined.
    pub participant_id: ParticipantId,
    /// Message text.
    pub text: String,
}

/// Body of `POST /api/classrooms/{id}/polls` and `PUT /api/polls/{id}`.
#[derive(Debug, serde::Deserialize)]
pub struct PollContentRequest {
    /// The question.
    pub prompt: String,
    /// Two to six answer texts.
    pub options: Vec<String>,
}

/// Body of `POST /api/polls/{id}/votes`.
#[derive(Debug, serde::Deserialize)]
pub struct VoteRequest {
    /// The voter.
    pub participant_id: ParticipantId,
    /// Index of the chosen option.
    pub option_index: usize,
}

/// Parse a path segment into a typed id.
fn parse_id<T>(raw: &str) -> Result<T, ObserverError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ObserverError::InvalidId(format!("{raw}: {e}")))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API routes.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = state.started_at.format("%Y-%m-%d %H:%M:%S UTC");
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds()
        .max(0);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Pulse</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        .method {{ color: #7ee787; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Pulse</h1>
    <p class="subtitle">Live classroom polls, vote stream and chat</p>

    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric">
            <div class="label">Started</div>
            <div class="value">{started}</div>
        </div>
        <div class="metric">
            <div class="label">Uptime (s)</div>
            <div class="value">{uptime}</div>
        </div>
    </div>

    <hr>

    <h2>API</h2>
    <ul>
        <li><span class="method">POST</span> /api/classrooms</li>
        <li><span class="method">GET</span> /api/classrooms/{{id}}</li>
        <li><span class="method">POST</span> /api/classrooms/{{id}}/polls</li>
        <li><span class="method">GET</span> /api/polls/{{id}}/stats</li>
        <li><span class="method">POST</span> /api/polls/{{id}}/votes</li>
        <li><span class="method">WS</span> /ws/polls/{{id}}/events</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// Classrooms
// ---------------------------------------------------------------------------

/// `POST /api/classrooms`
pub async fn create_classroom(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateClassroomRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let classroom = state.ledger.create_classroom(&body.name)?;
    Ok((StatusCode::CREATED, Json(classroom)))
}

/// `GET /api/classrooms/{id}`
pub async fn get_classroom(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    Ok(Json(state.ledger.classroom(id)?))
}

/// `POST /api/classrooms/{id}/active`
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let classroom = match body.is_active {
        Some(active) => state.ledger.set_classroom_active(id, active).await?,
        None => state.ledger.toggle_classroom_active(id).await?,
    };
    Ok(Json(classroom))
}

/// `POST /api/classrooms/{id}/join`
pub async fn join_classroom(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<JoinRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let participant = body.participant_id.unwrap_or_default();
    let attendee = state
        .ledger
        .join_classroom(id, participant, &body.display_name)
        .await?;
    Ok(Json(attendee))
}

/// `GET /api/classrooms/{id}/attendees`
pub async fn list_attendees(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    // Distinguish an empty roster from a missing classroom.
    state.ledger.classroom(id)?;
    let attendees = state.ledger.attendees(id)?;
    Ok(Json(serde_json::json!({
        "count": attendees.len(),
        "attendees": attendees,
    })))
}

/// `POST /api/classrooms/{id}/chat`
pub async fn return_to_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    Ok(Json(state.ledger.return_to_chat(id).await?))
}

/// `GET /api/classrooms/{id}/participation`
pub async fn participation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    Ok(Json(state.ledger.participation(id)?))
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// `GET /api/classrooms/{id}/messages`
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    state.ledger.classroom(id)?;
    let messages = state.chat.recent(id)?;
    Ok(Json(serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

/// `POST /api/classrooms/{id}/messages`
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let message = state.chat.send(id, body.participant_id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /api/classrooms/{id}/messages/{mid}/spotlight`
pub async fn spotlight(
    State(state): State<Arc<AppState>>,
    Path((id, mid)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let mid: MessageId = parse_id(&mid)?;
    Ok(Json(state.chat.spotlight(id, mid).await?))
}

// ---------------------------------------------------------------------------
// Polls
// ---------------------------------------------------------------------------

/// `GET /api/classrooms/{id}/polls`
pub async fn list_polls(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let polls = state.ledger.polls(id)?;
    Ok(Json(serde_json::json!({
        "count": polls.len(),
        "polls": polls,
    })))
}

/// `POST /api/classrooms/{id}/polls`
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PollContentRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: ClassroomId = parse_id(&id)?;
    let poll = state
        .ledger
        .create_poll(id, &body.prompt, &body.options)
        .await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

/// `GET /api/polls/{id}`
pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.poll(id)?))
}

/// `PUT /api/polls/{id}`
pub async fn edit_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PollContentRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    let poll = state
        .ledger
        .edit_poll(id, &body.prompt, &body.options)
        .await?;
    Ok(Json(poll))
}

/// `GET /api/polls/{id}/stats`
pub async fn poll_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.counters(id)?))
}

/// `POST /api/polls/{id}/launch`
pub async fn launch_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.launch_poll(id).await?))
}

/// `POST /api/polls/{id}/lock`
pub async fn lock_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.lock_poll(id).await?))
}

/// `POST /api/polls/{id}/resume`
pub async fn resume_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.resume_poll(id).await?))
}

/// `POST /api/polls/{id}/end`
pub async fn end_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    Ok(Json(state.ledger.end_poll(id).await?))
}

/// `POST /api/polls/{id}/reset`
///
/// Returns the new epoch and how much superseded data was purged.
pub async fn reset_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    let report = state.ledger.reset_poll(id).await?;
    info!(poll = %id, epoch = %report.epoch, "poll reset via API");
    Ok(Json(serde_json::json!({
        "poll_id": report.poll_id,
        "previous_epoch": report.previous_epoch,
        "epoch": report.epoch,
        "purged": {
            "votes": report.votes.deleted,
            "events": report.events.deleted,
            "failed": report.votes.failed.saturating_add(report.events.failed),
        },
    })))
}

/// `POST /api/polls/{id}/votes`
///
/// `201 Created` when the vote was counted, `200 OK` with
/// `"outcome": "already_voted"` when the participant had already voted in
/// the current epoch.
pub async fn submit_vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<VoteRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let id: PollId = parse_id(&id)?;
    let outcome = state
        .ledger
        .submit_vote(id, body.participant_id, body.option_index)
        .await?;

    let response = match outcome {
        VoteOutcome::Counted { epoch, event } => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "outcome": "counted",
                "epoch": epoch,
                "event": event,
            })),
        ),
        VoteOutcome::AlreadyVoted { epoch } => (
            StatusCode::OK,
            Json(serde_json::json!({
                "outcome": "already_voted",
                "epoch": epoch,
            })),
        ),
    };
    Ok(response)
}
