//! Comment handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::SocialError;
use crate::posts::{self, CommentView};
use crate::web::identity::Caller;
use crate::web::state::SharedState;

#[derive(Deserialize)]
pub struct CreateCommentPayload {
    post_id: i64,
    #[serde(default)]
    text: String,
}

pub async fn create_comment_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateCommentPayload>,
) -> Result<(StatusCode, Json<CommentView>), SocialError> {
    let st = state.lock().await;
    let comment = posts::create_comment(&st.storage, caller.0, req.post_id, &req.text)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments_handler(
    State(state): State<SharedState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(posts::list_comments(&st.storage, post_id)?))
}

pub async fn delete_comment_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    posts::delete_comment(&st.storage, caller.0, id)?;
    Ok(Json(serde_json::json!({ "message": "comment deleted" })))
}
