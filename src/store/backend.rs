//! Backend traits the stores delegate to.
//!
//! A backend performs each operation as one atomic step; deadlines, logging
//! and version bookkeeping for callers live in the store wrappers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::{
    NewUser, Permissions, Resource, ResourceDraft, ResourceQuery, Scope, Token, TokenHash, User,
};
use crate::store::StoreError;

#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Insert a new row at version 1.
    async fn insert_resource(&self, draft: ResourceDraft) -> Result<Resource, StoreError>;

    async fn get_resource(&self, id: i64) -> Result<Resource, StoreError>;

    /// One page of matches plus the total match count.
    async fn list_resources(&self, query: &ResourceQuery)
        -> Result<(Vec<Resource>, u64), StoreError>;

    /// Conditional write: apply the payload and bump the version only when the
    /// stored row has the same id and version as `resource`. Returns the new
    /// version, or `EditConflict` when nothing matched.
    async fn update_resource(&self, resource: &Resource) -> Result<i32, StoreError>;

    /// Unconditional delete. `NotFound` when no row has this id.
    async fn delete_resource(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserBackend: Send + Sync {
    /// `DuplicateEmail` when the address is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Same compare-and-swap contract as [`ResourceBackend::update_resource`].
    async fn update_user(&self, user: &User) -> Result<i32, StoreError>;

    /// The user owning an unexpired token with this hash and scope.
    async fn get_user_for_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;
}

#[async_trait]
pub trait TokenBackend: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError>;

    /// Remove every token of `scope` owned by `user_id`; returns how many.
    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait PermissionBackend: Send + Sync {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError>;

    async fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError>;
}

/// A backend able to serve every store.
pub trait Backend: ResourceBackend + UserBackend + TokenBackend + PermissionBackend {}

impl<T> Backend for T where T: ResourceBackend + UserBackend + TokenBackend + PermissionBackend {}
