//! Registration and activation.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::data::permissions::RESOURCES_READ;
use crate::data::token::validate_token_plaintext;
use crate::data::user::validate_user;
use crate::data::{NewUser, PasswordHash, Scope, Validator};
use crate::http::handlers::ensure_valid;
use crate::http::json::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateInput {
    #[serde(default)]
    pub token: String,
}

/// Create an inactive account, grant read access and mail an activation token.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_user(&mut v, &input.name, &input.email, &input.password);
    ensure_valid(v)?;

    let password = PasswordHash::new_blocking(input.password, state.config.security.password_cost)
        .await
        .map_err(ApiError::internal)?;

    let user = state
        .store
        .users
        .insert(NewUser {
            name: input.name,
            email: input.email,
            password,
            activated: false,
        })
        .await?;

    state.store.permissions.grant(user.id, &[RESOURCES_READ]).await?;

    let token = state
        .store
        .tokens
        .issue(user.id, state.config.tokens.activation_ttl(), Scope::Activation)
        .await?;

    let mailer = state.mailer.clone();
    let (recipient, activation) = (user.clone(), token);
    state.background.spawn(async move {
        if let Err(e) = mailer.send_activation(&recipient, &activation).await {
            tracing::error!(user_id = recipient.id, error = %e, "Activation mail not sent");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))).into_response())
}

/// Activate the account owning a live activation token.
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActivateInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    ensure_valid(v)?;

    let mut user = match state
        .store
        .users
        .get_for_token(Scope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            let mut errors = BTreeMap::new();
            errors.insert(
                "token".to_string(),
                "invalid or expired activation token".to_string(),
            );
            return Err(ApiError::failed_validation(errors));
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.store.users.update(&mut user).await?;
    state
        .store
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "User activated");
    Ok(Json(json!({ "user": user })).into_response())
}
