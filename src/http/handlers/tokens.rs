//! Authentication token issuance.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::data::user::{validate_email, validate_password_plaintext};
use crate::data::{Scope, Validator};
use crate::http::handlers::ensure_valid;
use crate::http::json::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    ensure_valid(v)?;

    let user = match state.store.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    let matched = user
        .password
        .matches_blocking(input.password)
        .await
        .map_err(ApiError::internal)?;
    if !matched {
        tracing::debug!(user_id = user.id, "Password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .store
        .tokens
        .issue(
            user.id,
            state.config.tokens.authentication_ttl(),
            Scope::Authentication,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    )
        .into_response())
}
