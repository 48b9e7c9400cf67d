//! Notification handlers. All operations are scoped to the caller's own records.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::error::SocialError;
use crate::notifications::{self, NotificationView};
use crate::web::identity::Caller;
use crate::web::state::SharedState;

pub async fn list_notifications_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<NotificationView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(notifications::list(&st.storage, caller.0)?))
}

pub async fn unread_count_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    let count = notifications::unread_count(&st.storage, caller.0)?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn mark_read_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(notifications::mark_read(&st.storage, caller.0, id)?))
}

pub async fn mark_all_read_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    let updated = notifications::mark_all_read(&st.storage, caller.0)?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn delete_notification_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    notifications::delete(&st.storage, caller.0, id)?;
    Ok(Json(serde_json::json!({ "message": "notification deleted" })))
}
