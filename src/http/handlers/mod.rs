//! Route handlers.

pub mod debug;
pub mod health;
pub mod resources;
pub mod tokens;
pub mod users;

use axum::extract::Request;

use crate::data::Validator;
use crate::http::response::ApiError;

/// Parse a positive record id from a path segment.
pub fn read_id_param(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Turn collected field errors into a 422.
pub fn ensure_valid(v: Validator) -> Result<(), ApiError> {
    if v.is_valid() {
        Ok(())
    } else {
        Err(ApiError::failed_validation(v.into_errors()))
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed(request: Request) -> ApiError {
    ApiError::MethodNotAllowed(request.method().to_string())
}
