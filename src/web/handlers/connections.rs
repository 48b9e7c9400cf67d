//! Connection request handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::connections::{self, ConnectionView};
use crate::error::SocialError;
use crate::web::identity::Caller;
use crate::web::state::SharedState;

#[derive(Deserialize)]
pub struct RequestConnectionPayload {
    recipient_id: i64,
}

pub async fn request_connection_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<RequestConnectionPayload>,
) -> Result<(StatusCode, Json<ConnectionView>), SocialError> {
    let st = state.lock().await;
    let conn = connections::request_connection(&st.storage, caller.0, req.recipient_id)?;
    Ok((StatusCode::CREATED, Json(conn)))
}

pub async fn accept_connection_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<ConnectionView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(connections::accept_connection(&st.storage, caller.0, id)?))
}

pub async fn reject_connection_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    connections::reject_connection(&st.storage, caller.0, id)?;
    Ok(Json(serde_json::json!({ "message": "connection request rejected" })))
}

pub async fn remove_connection_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    connections::remove_connection(&st.storage, caller.0, id)?;
    Ok(Json(serde_json::json!({ "message": "connection removed" })))
}

pub async fn list_requests_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<ConnectionView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(connections::list_requests(&st.storage, caller.0)?))
}

pub async fn list_connections_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<ConnectionView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(connections::list_connections(&st.storage, caller.0)?))
}
