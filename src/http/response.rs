//! Error responses.
//!
//! # Responsibilities
//! - Map every failure to a status code and a JSON envelope
//!   `{"error": <message>, "code": <category>}`
//! - Log server-side faults; never echo their detail
//! - Turn a caught panic into a 500 that closes the connection
//!
//! # Design Decisions
//! - `code` is stable and machine-checkable; `error` is for humans
//! - Store, auth and authz errors convert via `From`, so handlers use `?`

use std::any::Any;
use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::security::auth::{AuthError, AuthzError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    FailedValidation(BTreeMap<String, String>),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(String),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error(transparent)]
    Unauthorized(AuthzError),

    #[error("body must not be larger than {0} bytes")]
    PayloadTooLarge(usize),

    #[error("the server encountered a problem and could not process your request")]
    Timeout(String),

    #[error("the server encountered a problem and could not process your request")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::EditConflict => StatusCode::CONFLICT,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidCredentials | Self::InvalidAuthenticationToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Unauthorized(AuthzError::AuthenticationRequired) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable category for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::FailedValidation(_) => "failed_validation",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::EditConflict => "edit_conflict",
            Self::RateLimitExceeded => "rate_limited",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidAuthenticationToken => "invalid_authentication_token",
            Self::Unauthorized(AuthzError::AuthenticationRequired) => "authentication_required",
            Self::Unauthorized(AuthzError::InactiveAccount) => "inactive_account",
            Self::Unauthorized(AuthzError::NotPermitted { .. }) => "not_permitted",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    pub fn failed_validation(errors: BTreeMap<String, String>) -> Self {
        Self::FailedValidation(errors)
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Internal(detail) => tracing::error!(detail = %detail, "Internal error"),
            Self::Timeout(detail) => tracing::error!(detail = %detail, "Store deadline exceeded"),
            _ => {}
        }

        let body = match &self {
            Self::FailedValidation(errors) => json!({ "error": errors, "code": self.code() }),
            other => json!({ "error": other.to_string(), "code": other.code() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::EditConflict => Self::EditConflict,
            StoreError::DuplicateEmail => {
                let mut errors = BTreeMap::new();
                errors.insert(
                    "email".to_string(),
                    "a user with this email address already exists".to_string(),
                );
                Self::FailedValidation(errors)
            }
            StoreError::Timeout(deadline) => Self::Timeout(deadline.to_string()),
            StoreError::Backend(detail) => Self::Internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => Self::InvalidAuthenticationToken,
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(e: AuthzError) -> Self {
        Self::Unauthorized(e)
    }
}

/// Panic handler for `CatchPanicLayer`.
pub fn recover_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = ApiError::internal(format!("handler panicked: {detail}")).into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
