//! Service error type shared by the auth and deck services.
//!
//! Every variant maps to an HTTP status and renders as
//! `{"errorMessage": "..."}`. Internal failures are logged and replaced by a
//! fixed message before they reach the client.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Message returned in place of any internal error detail.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing or malformed input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Input that breaks a size or format rule. HTTP 403.
    #[error("{0}")]
    Constraint(String),

    /// Missing/invalid token, wrong credentials or not the owner. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Per-user deck cap reached. HTTP 403.
    #[error("{0}")]
    LimitExceeded(String),

    /// Identifier does not resolve. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Email already registered. HTTP 400.
    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
            ServiceError::Constraint(_) | ServiceError::LimitExceeded(_) => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Storage(_) | ServiceError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        ServiceError::Unauthorized("Unauthorized".to_string())
    }

    pub fn deck_not_found() -> Self {
        ServiceError::NotFound("No deck was found with this id.".to_string())
    }

    pub fn user_not_found() -> Self {
        ServiceError::NotFound("No user was found with this id".to_string())
    }
}

/// JSON error body.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error_message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("record encoding: {err}"))
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::Internal(format!("password hashing: {err}"))
    }
}

impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServiceError::Internal(format!("token signing: {err}"))
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("blocking task: {err}"))
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}
