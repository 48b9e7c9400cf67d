//! Caller identity resolution.
//!
//! Every protected route runs behind [`require_caller`], which reads the
//! `X-User-Id` header, checks the user exists and stores a [`Caller`] in the
//! request extensions for handlers to pick up.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::SocialError;
use crate::web::state::SharedState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub i64);

pub async fn require_caller(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Response {
    let id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());
    let Some(id) = id else {
        return SocialError::Unauthenticated.into_response();
    };

    let exists = {
        let st = state.lock().await;
        st.storage.user_exists(id)
    };
    match exists {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!("rejecting request from unknown {}", crate::logging::user_id(id));
            return SocialError::Unauthenticated.into_response();
        }
        Err(e) => return SocialError::from(e).into_response(),
    }

    req.extensions_mut().insert(Caller(id));
    next.run(req).await
}
