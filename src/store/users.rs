//! User store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::data::{NewUser, Scope, TokenHash, User};
use crate::resilience::with_deadline;
use crate::store::backend::UserBackend;
use crate::store::StoreError;

#[derive(Clone)]
pub struct UserStore {
    backend: Arc<dyn UserBackend>,
    timeout: Duration,
}

impl UserStore {
    pub fn new(backend: Arc<dyn UserBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = with_deadline("users.insert", self.timeout, self.backend.insert_user(user)).await??;
        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        with_deadline("users.get_by_email", self.timeout, self.backend.get_user_by_email(email))
            .await?
    }

    /// Compare-and-swap on `user.version`; advances it on success.
    pub async fn update(&self, user: &mut User) -> Result<i32, StoreError> {
        let version =
            with_deadline("users.update", self.timeout, self.backend.update_user(user)).await??;
        user.version = version;
        Ok(version)
    }

    /// Resolve the owner of an unexpired token of `scope`.
    ///
    /// `NotFound` covers unknown, expired and wrong-scope tokens alike.
    pub async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        let hash = TokenHash::of(plaintext);
        with_deadline(
            "users.get_for_token",
            self.timeout,
            self.backend.get_user_for_token(scope, &hash, Utc::now()),
        )
        .await?
    }
}
