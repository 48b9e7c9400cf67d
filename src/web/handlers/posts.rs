//! Post and like handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::SocialError;
use crate::posts::{self, LikeState, PostView};
use crate::web::identity::Caller;
use crate::web::state::SharedState;

#[derive(Deserialize)]
pub struct CreatePostPayload {
    #[serde(default)]
    content: String,
    image: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePostPayload {
    content: Option<String>,
}

pub async fn create_post_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreatePostPayload>,
) -> Result<(StatusCode, Json<PostView>), SocialError> {
    let st = state.lock().await;
    let post = posts::create_post(&st.storage, caller.0, &req.content, req.image)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts_handler(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PostView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(posts::list_posts(&st.storage)?))
}

pub async fn get_post_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<PostView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(posts::get_post(&st.storage, id)?))
}

pub async fn update_post_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePostPayload>,
) -> Result<Json<PostView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(posts::update_post(&st.storage, caller.0, id, req.content)?))
}

pub async fn delete_post_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, SocialError> {
    let st = state.lock().await;
    posts::delete_post(&st.storage, caller.0, id)?;
    Ok(Json(serde_json::json!({ "message": "post deleted" })))
}

pub async fn toggle_like_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>, SocialError> {
    let st = state.lock().await;
    Ok(Json(posts::toggle_like(&st.storage, caller.0, id)?))
}
