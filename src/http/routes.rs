use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn accounts() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(handlers::register_account))
        .route("/accounts/lookup", get(handlers::lookup_account))
        .route("/accounts/:id", get(handlers::get_account))
        .route("/account/privacy", patch(handlers::set_privacy))
}

pub fn relationships() -> Router<AppState> {
    Router::new()
        .route("/accounts/:id/follow", post(handlers::follow_account))
        .route("/accounts/:id/unfollow", post(handlers::unfollow_account))
        .route(
            "/accounts/:id/remove-follower",
            post(handlers::remove_follower),
        )
        .route("/accounts/:id/block", post(handlers::block_account))
        .route("/accounts/:id/unblock", post(handlers::unblock_account))
        .route("/accounts/:id/followers", get(handlers::list_followers))
        .route("/accounts/:id/following", get(handlers::list_following))
        .route("/account/blocked", get(handlers::list_blocked))
}

pub fn follow_requests() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts/:id/follow-request",
            post(handlers::send_follow_request),
        )
        .route(
            "/accounts/:id/follow-request",
            delete(handlers::cancel_follow_request),
        )
        .route(
            "/follow-requests/:requester_id/respond",
            post(handlers::respond_follow_request),
        )
        .route(
            "/follow-requests/received",
            get(handlers::list_pending_received),
        )
        .route("/follow-requests/sent", get(handlers::list_pending_sent))
}

pub fn messages() -> Router<AppState> {
    Router::new()
        .route("/messages", post(handlers::send_message))
        .route("/messages/inbox", get(handlers::inbox))
        .route("/messages/thread/:account_id", get(handlers::thread))
        .route("/messages/:id", patch(handlers::edit_message))
        .route("/messages/:id/read", post(handlers::mark_message_read))
}
