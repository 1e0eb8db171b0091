//! Error types for the Pulse API layer.
//!
//! [`ObserverError`] collects every failure a handler can report and turns
//! it into a JSON body of the form `{"error": "...", "status": 409}` via its
//! [`IntoResponse`] implementation. Domain errors from the ledger, chat and
//! stream crates are mapped onto HTTP statuses by the `From` impls below.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pulse_events::{ChatError, StreamError};
use pulse_ledger::LedgerError;
use pulse_store::StoreError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An identifier in the request path could not be parsed.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// The request was well-formed but its content was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The resource is not in a state that allows the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store is temporarily unable to serve the request.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ObserverError {
    /// The HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidId(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ObserverError {
    fn from(e: StoreError) -> Self {
        if e.is_transient() {
            Self::Unavailable(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl From<LedgerError> for ObserverError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Store(inner) => inner.into(),
            LedgerError::ClassroomNotFound(_) | LedgerError::PollNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            LedgerError::ClassroomInactive(_)
            | LedgerError::PollNotPresented(_)
            | LedgerError::PollNotAccepting { .. }
            | LedgerError::InvalidTransition { .. }
            | LedgerError::NotEditable { .. } => Self::Conflict(e.to_string()),
            LedgerError::InvalidInput(_) | LedgerError::OptionOutOfRange { .. } => {
                Self::InvalidRequest(e.to_string())
            }
            LedgerError::CounterOverflow(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ChatError> for ObserverError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Store(inner) => inner.into(),
            ChatError::ClassroomNotFound(_) | ChatError::MessageNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            ChatError::ClassroomInactive(_) | ChatError::NotJoined { .. } => {
                Self::Conflict(e.to_string())
            }
            ChatError::EmptyMessage | ChatError::MessageTooLong { .. } => {
                Self::InvalidRequest(e.to_string())
            }
        }
    }
}

impl From<StreamError> for ObserverError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Store(inner) => inner.into(),
            StreamError::PollNotFound(_) => Self::NotFound(e.to_string()),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::NotFound(msg)
            | Self::InvalidId(msg)
            | Self::InvalidRequest(msg)
            | Self::Conflict(msg)
            | Self::Unavailable(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Serialization(e) => format!("JSON error: {e}"),
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pulse_types::{PollId, PollStatus};

    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let poll = PollId::new();
        let cases = [
            (LedgerError::PollNotFound(poll), StatusCode::NOT_FOUND),
            (LedgerError::PollNotPresented(poll), StatusCode::CONFLICT),
            (
                LedgerError::PollNotAccepting {
                    poll,
                    status: PollStatus::Locked,
                },
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::OptionOutOfRange {
                    index: 9,
                    options: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                LedgerError::Store(StoreError::Contention { attempts: 5 }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                LedgerError::Store(StoreError::Poisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ObserverError::from(err).status(), status);
        }
    }

    #[test]
    fn chat_errors_map_to_statuses() {
        assert_eq!(
            ObserverError::from(ChatError::EmptyMessage).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ObserverError::from(ChatError::MessageNotFound(pulse_types::MessageId::new())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn response_body_carries_status() {
        let response = ObserverError::Conflict("poll is locked".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 409);
        assert_eq!(body["error"], "poll is locked");
    }
}
