use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::DomainError;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

/// Stable mapping from domain error kinds to status categories: conflicts
/// with current state are 409, nonexistent relationships 404, privacy and
/// authorization failures 403, malformed input 400.
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::SelfReference | DomainError::Validation(_) => {
                AppError::bad_request(err.to_string())
            }
            DomainError::AlreadyFollowing
            | DomainError::AlreadyBlocked
            | DomainError::DuplicateRequest
            | DomainError::InvalidState
            | DomainError::HandleTaken => AppError::conflict(err.to_string()),
            DomainError::NotFollowing | DomainError::NotBlocked | DomainError::NotFound(_) => {
                AppError::not_found(err.to_string())
            }
            DomainError::Blocked
            | DomainError::Privacy(_)
            | DomainError::NotOwner
            | DomainError::NotRecipient => AppError::forbidden(err.to_string()),
            DomainError::Store(err) => {
                tracing::error!(error = ?err, "storage failure");
                AppError::internal("storage failure")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
