use super::error::ApiError;
use super::AppState;
use crate::client::{MessageContent, WaSocket};
use crate::types::{GroupSummary, Jid, JidParseError, WebMessageInfo};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Body of `POST /api/messages/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/messages`: mirrored inbound messages, oldest first.
pub async fn list_messages(State(state): State<AppState>) -> Json<Vec<WebMessageInfo>> {
    Json(state.mirror.read().await.snapshot())
}

/// `GET /api/groups`: participating groups as `{id, name, participants}`.
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    let failed = || {
        ApiError::status(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Failed to fetch groups" }),
        )
    };
    let Some(socket) = current_socket(&state).await else {
        tracing::error!("error fetching groups: no client connected");
        return Err(failed());
    };
    match socket.group_fetch_all_participating().await {
        Ok(groups) => Ok(Json(groups.values().map(GroupSummary::from).collect())),
        Err(e) => {
            tracing::error!(error = %e, "error fetching groups");
            Err(failed())
        }
    }
}

/// `POST /api/messages/send`: send a text message to `to`.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let to = req.to.filter(|s| !s.is_empty());
    let message = req.message.filter(|s| !s.is_empty());
    let (Some(to), Some(message)) = (to, message) else {
        return Err(ApiError::bad_request(r#"Missing "to" or "message" field"#));
    };
    let failed = |details: String| {
        ApiError::status(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "Failed to send message", "details": details }),
        )
    };
    let to: Jid = to.parse().map_err(|e: JidParseError| {
        tracing::warn!(error = %e, "send via API failed");
        failed(crate::Error::from(e).to_string())
    })?;
    let Some(socket) = current_socket(&state).await else {
        return Err(failed(crate::Error::NotConnected.to_string()));
    };
    match socket.send_message(&to, MessageContent::text(message)).await {
        Ok(resp) => {
            tracing::info!(%to, id = %resp.id, "message sent via API");
            Ok(Json(json!({ "status": "success", "message": "Message sent" })))
        }
        Err(e) => {
            tracing::warn!(%to, error = %e, "send via API failed");
            Err(failed(e.to_string()))
        }
    }
}

/// `GET /api/updates`: the whole in-memory store.
pub async fn get_updates(State(state): State<AppState>) -> Json<Value> {
    Json(state.store.read().await.to_json())
}

/// Clone the current socket out of the lock so no guard is held across client calls.
async fn current_socket(state: &AppState) -> Option<Arc<dyn WaSocket>> {
    state.socket.read().await.clone()
}
