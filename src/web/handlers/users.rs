//! Profile directory handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::error::SocialError;
use crate::users::{self, NewUser, ProfileUpdate, UserView};
use crate::web::identity::Caller;
use crate::web::state::SharedState;

pub async fn register_handler(
    State(state): State<SharedState>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>), SocialError> {
    let st = state.lock().await;
    let user = users::register(&st.storage, req)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users_handler(
    State(state): State<SharedState>,
) -> Result<Json<Vec<UserView>>, SocialError> {
    let st = state.lock().await;
    Ok(Json(users::list_users(&st.storage)?))
}

pub async fn get_profile_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<UserView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(users::get_profile(&st.storage, caller.0)?))
}

pub async fn update_profile_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<UserView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(users::update_profile(&st.storage, caller.0, req)?))
}

pub async fn get_user_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, SocialError> {
    let st = state.lock().await;
    Ok(Json(users::get_user(&st.storage, id)?))
}
