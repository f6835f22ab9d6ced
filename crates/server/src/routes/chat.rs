//! Chat routes for the meal-planning assistant.
//!
//! `POST /chat/send` answers with server-sent events; every other route is
//! plain JSON.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Sse,
    routing::{delete, get, post},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use larder_core::ChatSessionId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{ChatMessage, ChatSession};
use crate::services::{AuthService, ChatService, stream_chat_message};
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/sessions", get(list_sessions))
        .route("/chat/sessions/{id}", delete(delete_session))
        .route("/chat/sessions/{id}/messages", get(get_messages))
        .route("/chat/send", post(send_message))
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Continue this session; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<ChatSessionId>,
    pub message: String,
}

/// GET /chat/sessions
async fn list_sessions(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ChatSession>>> {
    let sessions = ChatService::new(state.pool()).list_sessions(user.id).await?;
    Ok(Json(sessions))
}

/// GET /chat/sessions/{id}/messages
async fn get_messages(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ChatSessionId>,
) -> Result<Json<Vec<ChatMessage>>> {
    let messages = ChatService::new(state.pool())
        .get_messages(user.id, id)
        .await?;
    Ok(Json(messages))
}

/// DELETE /chat/sessions/{id}
async fn delete_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ChatSessionId>,
) -> Result<StatusCode> {
    ChatService::new(state.pool())
        .delete_session(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a message and stream the assistant's reply.
///
/// POST /chat/send
///
/// The message is saved and the session resolved before the stream opens,
/// so a blank message or an unknown session is a normal error response.
async fn send_message(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(request): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = ChatService::new(state.pool())
        .begin_message(current.id, request.session_id, &request.message)
        .await?;
    let user = AuthService::new(state.pool()).get_user(current.id).await?;

    let event_stream = stream_chat_message(
        state.pool().clone(),
        state.claude().clone(),
        user,
        session.id,
    );

    let sse_stream = event_stream.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
        });
        Ok(Event::default().data(json))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_without_session() {
        let request: SendMessageRequest =
            serde_json::from_str(r#"{"message": "What can I cook tonight?"}"#)
                .expect("deserialize");
        assert!(request.session_id.is_none());
        assert_eq!(request.message, "What can I cook tonight?");
    }

    #[test]
    fn test_send_request_with_session() {
        let request: SendMessageRequest = serde_json::from_str(
            r#"{"session_id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "message": "More"}"#,
        )
        .expect("deserialize");
        assert_eq!(
            request.session_id.map(|id| id.to_string()).as_deref(),
            Some("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }
}
