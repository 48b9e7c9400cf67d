//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let st = state.lock().await;
    match st.storage.counts() {
        Ok(counts) => {
            let body = serde_json::json!({
                "status": "ok",
                "users": counts.users,
                "connections": counts.connections,
                "messages": counts.messages,
                "notifications": counts.notifications,
                "posts": counts.posts,
            });
            (StatusCode::OK, axum::Json(body))
        }
        Err(e) => {
            tracing::error!("health check failed: {e}");
            let body = serde_json::json!({ "status": "error", "error": e.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body))
        }
    }
}
