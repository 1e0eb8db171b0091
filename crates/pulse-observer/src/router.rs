//! Axum router construction.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS enabled so presenter and participant front-ends served from
//! other origins can call the API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router. See [`handlers`] for the route table.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/polls/{id}/events", get(ws::ws_poll_events))
        // Classrooms
        .route("/api/classrooms", post(handlers::create_classroom))
        .route("/api/classrooms/{id}", get(handlers::get_classroom))
        .route("/api/classrooms/{id}/active", post(handlers::set_active))
        .route("/api/classrooms/{id}/join", post(handlers::join_classroom))
        .route("/api/classrooms/{id}/attendees", get(handlers::list_attendees))
        .route("/api/classrooms/{id}/chat", post(handlers::return_to_chat))
        .route(
            "/api/classrooms/{id}/participation",
            get(handlers::participation),
        )
        // Chat
        .route(
            "/api/classrooms/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/classrooms/{id}/messages/{mid}/spotlight",
            post(handlers::spotlight),
        )
        // Polls
        .route(
            "/api/classrooms/{id}/polls",
            get(handlers::list_polls).post(handlers::create_poll),
        )
        .route(
            "/api/polls/{id}",
            get(handlers::get_poll).put(handlers::edit_poll),
        )
        .route("/api/polls/{id}/stats", get(handlers::poll_stats))
        .route("/api/polls/{id}/launch", post(handlers::launch_poll))
        .route("/api/polls/{id}/lock", post(handlers::lock_poll))
        .route("/api/polls/{id}/resume", post(handlers::resume_poll))
        .route("/api/polls/{id}/end", post(handlers::end_poll))
        .route("/api/polls/{id}/reset", post(handlers::reset_poll))
        .route("/api/polls/{id}/votes", post(handlers::submit_vote))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
