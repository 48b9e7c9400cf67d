//! Axum router construction.

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::identity::require_caller;
use crate::web::state::SharedState;

/// Build the complete router. Everything except health and registration
/// requires an `X-User-Id` header naming an existing user.
pub fn build_router(state: SharedState) -> Router {
    let auth = from_fn_with_state(state.clone(), require_caller);

    let public = Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route(
            "/api/users",
            get(handlers::users::list_users_handler)
                .route_layer(auth.clone())
                .post(handlers::users::register_handler),
        );

    let protected = Router::new()
        // Users API
        .route(
            "/api/users/profile",
            get(handlers::users::get_profile_handler).put(handlers::users::update_profile_handler),
        )
        .route("/api/users/:id", get(handlers::users::get_user_handler))
        // Connections API
        .route(
            "/api/connections",
            get(handlers::connections::list_connections_handler),
        )
        .route(
            "/api/connections/request",
            post(handlers::connections::request_connection_handler),
        )
        .route(
            "/api/connections/requests",
            get(handlers::connections::list_requests_handler),
        )
        .route(
            "/api/connections/accept/:id",
            put(handlers::connections::accept_connection_handler),
        )
        .route(
            "/api/connections/reject/:id",
            put(handlers::connections::reject_connection_handler),
        )
        .route(
            "/api/connections/:id",
            delete(handlers::connections::remove_connection_handler),
        )
        // Messages API
        .route(
            "/api/messages",
            post(handlers::messages::send_message_handler),
        )
        .route(
            "/api/messages/conversations",
            get(handlers::messages::list_conversations_handler),
        )
        .route(
            "/api/messages/unread-count",
            get(handlers::messages::unread_count_handler),
        )
        .route(
            "/api/messages/:user_id",
            get(handlers::messages::get_thread_handler),
        )
        // Notifications API
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications_handler),
        )
        .route(
            "/api/notifications/unread-count",
            get(handlers::notifications::unread_count_handler),
        )
        .route(
            "/api/notifications/read-all",
            put(handlers::notifications::mark_all_read_handler),
        )
        .route(
            "/api/notifications/:id/read",
            put(handlers::notifications::mark_read_handler),
        )
        .route(
            "/api/notifications/:id",
            delete(handlers::notifications::delete_notification_handler),
        )
        // Posts API
        .route(
            "/api/posts",
            get(handlers::posts::list_posts_handler).post(handlers::posts::create_post_handler),
        )
        .route(
            "/api/posts/:id",
            get(handlers::posts::get_post_handler)
                .put(handlers::posts::update_post_handler)
                .delete(handlers::posts::delete_post_handler),
        )
        .route(
            "/api/posts/:id/like",
            put(handlers::posts::toggle_like_handler),
        )
        // Comments API
        .route(
            "/api/comments",
            post(handlers::comments::create_comment_handler),
        )
        .route(
            "/api/comments/post/:post_id",
            get(handlers::comments::list_comments_handler),
        )
        .route(
            "/api/comments/:id",
            delete(handlers::comments::delete_comment_handler),
        )
        .route_layer(auth);

    public.merge(protected).with_state(state)
}
