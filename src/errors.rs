//! Error type returned by every handler.

use axum::{
    extract::{State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lifecycle::LifecycleError;
use lifecycle::accounts::is_unique_violation;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{error, warn};

use crate::schemas::{AppState, ErrorResponse};
use crate::storage::StorageError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Cause of a 500 response, carried as a response extension so
/// [`expose_internal_details`] can decide per deployment whether to show it.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("Authentication required".to_string())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::InvalidTransition(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION")
            }
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (message, detail) = match self {
            Self::Internal(detail) => {
                error!("Internal error: {}", detail);
                (INTERNAL_MESSAGE.to_string(), Some(InternalDetail(detail)))
            }
            other => {
                warn!(status = status.as_u16(), "Request rejected: {}", other);
                (other.to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

/// Response layer that strips [`InternalDetail`] and, in development, puts
/// it into the error body.
pub async fn expose_internal_details(
    State(state): State<AppState>,
    mut response: Response,
) -> Response {
    let Some(InternalDetail(detail)) = response.extensions_mut().remove::<InternalDetail>() else {
        return response;
    };
    if !state.config.is_development() {
        return response;
    }

    let body = ErrorResponse {
        error: format!("{INTERNAL_MESSAGE}: {detail}"),
        code: "INTERNAL_ERROR".to_string(),
        success: false,
    };
    (response.status(), Json(body)).into_response()
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Database(db) => Self::from(db),
            LifecycleError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            LifecycleError::Forbidden(msg) => Self::Forbidden(msg),
            LifecycleError::Validation(msg) => Self::Validation(msg),
            err @ (LifecycleError::InvalidTransition { .. }
            | LifecycleError::InvalidTicketTransition { .. }) => {
                Self::InvalidTransition(err.to_string())
            }
            LifecycleError::Duplicate(msg) => Self::Conflict(msg),
            err @ LifecycleError::Conflict { .. } => Self::Conflict(err.to_string()),
            err @ LifecycleError::Exhausted(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if is_unique_violation(&err) {
            warn!("Unique constraint violated: {}", err);
            return Self::Conflict("a record with the same unique value already exists".into());
        }
        Self::Internal(format!("database: {err}"))
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Internal(format!("storage: {err}"))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::Validation(format!("malformed multipart body: {}", err.body_text()))
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("invalid session token: {err}"))
    }
}

/// Result alias used by handlers.
pub type ApiResult<T> = Result<T, ApiError>;
