//! Direct message handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::SocialError;
use crate::messaging::{self, MessageView};
use crate::storage::UserBrief;
use crate::web::identity::Caller;
use crate::web::state::SharedState;

#[derive(Deserialize)]
pub struct SendMessagePayload {
    recipient_id: i64,
    #[serde(default)]
    content: String,
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageView>), SocialError> {
    let st = state.lock().await;
    let msg = messaging::send_message(&st.storage, caller.0, req.recipient_id, &req.content)?;
    Ok((StatusCode::CREATED, Json(msg)))
}

pub async fn get_thread_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<MessageView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(messaging::get_thread(&st.storage, caller.0, user_id)?))
}

pub async fn list_conversations_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<UserBrief>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(messaging::list_conversations(&st.storage, caller.0)?))
}

pub async fn unread_count_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    let count = messaging::unread_count(&st.storage, caller.0)?;
    Ok(Json(serde_json::json!({ "count": count })))
}
