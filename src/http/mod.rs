use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthSession;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::accounts())
        .merge(routes::relationships())
        .merge(routes::follow_requests())
        .merge(routes::messages())
        .with_state(state)
}
