use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::repo::StoreError;

/// Errors surfaced by the auth layer to HTTP callers.
///
/// Every variant renders as `{"error": <message>, "code": <CODE>}`. Internal
/// causes are logged and never included in the body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    /// Shared by "no such user" and "wrong password".
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    EmailNotVerified,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid verification token")]
    InvalidToken,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    /// No bearer token on a protected request.
    #[error("No token provided")]
    MissingToken,

    /// Bearer token present but its signature, claims or expiry did not check out.
    #[error("Invalid or expired token")]
    InvalidSession,

    #[error("{0}")]
    Forbidden(String),

    /// Valid session without the role the operation requires.
    #[error("Access denied")]
    AccessDenied,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("An error occurred while registering the user")]
    RegistrationFailed(#[source] anyhow::Error),

    #[error("An internal error occurred")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateEmail
            | AppError::AlreadyVerified
            | AppError::InvalidToken
            | AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified
            | AppError::InvalidSession
            | AppError::Forbidden(_)
            | AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RegistrationFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DuplicateEmail => "DUPLICATE_EMAIL",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AppError::AlreadyVerified => "ALREADY_VERIFIED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AppError::MissingToken => "UNAUTHORIZED",
            AppError::InvalidSession => "INVALID_OR_EXPIRED_TOKEN",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::AccessDenied => "ACCESS_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RegistrationFailed(_) => "REGISTRATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::RegistrationFailed(cause) | AppError::Internal(cause) => {
                tracing::error!(error = ?cause, code = self.code(), "request failed");
            }
            _ => {}
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (self.status(), Json(body)).into_response()
    }
}
