//! `WebSocket` handler for a poll's live vote stream.
//!
//! Clients connect to `GET /ws/polls/{id}/events` and receive one JSON
//! [`WsMessage`] per [`FeedMessage`]: a `spawn` for each counted vote of the
//! current epoch, a `reset` when the poll moves to a new epoch, a `poll`
//! snapshot whenever the poll document changes, and a final
//! `poll_removed` if the poll is deleted. Events from superseded epochs
//! never reach the socket; the feed's epoch gate drops them.
//!
//! The feed is opened before the upgrade so an unknown poll is answered
//! with a plain `404` instead of an empty socket.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use pulse_events::{FeedMessage, StreamFeed};
use pulse_types::{Epoch, Poll, PollId, StreamEvent};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// JSON frame pushed to stream clients.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A counted vote: spawn a particle.
    Spawn {
        /// The stream event.
        event: StreamEvent,
    },
    /// The poll was reset. Clear everything.
    Reset {
        /// The new epoch.
        epoch: Epoch,
    },
    /// The poll document as it is now.
    Poll {
        /// The poll.
        poll: Poll,
    },
    /// The poll was deleted. No further frames follow.
    PollRemoved {
        /// The deleted poll.
        poll_id: PollId,
    },
}

impl WsMessage {
    fn from_feed(poll_id: PollId, message: FeedMessage) -> Self {
        match message {
            FeedMessage::Spawn(event) => Self::Spawn { event },
            FeedMessage::Reset { epoch } => Self::Reset { epoch },
            FeedMessage::PollChanged(poll) => Self::Poll { poll },
            FeedMessage::PollRemoved => Self::PollRemoved { poll_id },
        }
    }
}

/// Upgrade to a `WebSocket` streaming the poll's feed.
///
/// # Route
///
/// `GET /ws/polls/{id}/events`
pub async fn ws_poll_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let feed = match open_feed(&state, &id) {
        Ok(feed) => feed,
        Err(e) => return e.into_response(),
    };
    match ws {
        Ok(ws) => ws.on_upgrade(|socket| handle_ws(socket, feed)),
        Err(rejection) => {
            feed.close();
            rejection.into_response()
        }
    }
}

fn open_feed(state: &AppState, raw: &str) -> Result<StreamFeed, ObserverError> {
    let poll_id: PollId = raw
        .parse()
        .map_err(|e| ObserverError::InvalidId(format!("{raw}: {e}")))?;
    Ok(StreamFeed::open(state.ledger.store(), poll_id)?)
}

/// Forward feed messages as text frames until either side goes away.
async fn handle_ws(mut socket: WebSocket, mut feed: StreamFeed) {
    let poll_id = feed.poll_id();
    debug!(poll = %poll_id, epoch = %feed.epoch(), "WebSocket client connected");

    loop {
        tokio::select! {
            message = feed.next() => {
                let Some(message) = message else {
                    debug!(poll = %poll_id, "stream feed ended, closing WebSocket");
                    break;
                };
                let last = message == FeedMessage::PollRemoved;
                let frame = WsMessage::from_feed(poll_id, message);
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(poll = %poll_id, "Failed to serialize stream message: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!(poll = %poll_id, "WebSocket client disconnected (send failed)");
                    break;
                }
                if last {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(poll = %poll_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(poll = %poll_id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(poll = %poll_id, "WebSocket error: {e}");
                        break;
                    }
                    // Clients have nothing to say on this stream.
                    _ => {}
                }
            }
        }
    }

    feed.close();
}
