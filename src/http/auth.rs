use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::http::AppError;
use crate::AppState;

/// The verified account identity behind a request. Token issuance lives in
/// an external service; this extractor only resolves opaque session tokens
/// against the sessions table.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;
        let token =
            Uuid::parse_str(token).map_err(|_| AppError::unauthorized("invalid token"))?;

        let account_id: Option<Uuid> =
            sqlx::query_scalar("SELECT account_id FROM sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(state.db.pool())
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, "failed to resolve session");
                    AppError::internal("failed to resolve session")
                })?;

        let account_id = account_id.ok_or_else(|| AppError::unauthorized("invalid token"))?;
        Ok(AuthSession { account_id })
    }
}
