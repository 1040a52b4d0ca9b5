//! Permission store.

use std::sync::Arc;
use std::time::Duration;

use crate::data::Permissions;
use crate::resilience::with_deadline;
use crate::store::backend::PermissionBackend;
use crate::store::StoreError;

#[derive(Clone)]
pub struct PermissionStore {
    backend: Arc<dyn PermissionBackend>,
    timeout: Duration,
}

impl PermissionStore {
    pub fn new(backend: Arc<dyn PermissionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Every code granted to `user_id`. Empty for unknown users.
    pub async fn for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        with_deadline("permissions.for_user", self.timeout, self.backend.permissions_for_user(user_id))
            .await?
    }

    pub async fn grant(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        with_deadline("permissions.grant", self.timeout, self.backend.grant_permissions(user_id, codes))
            .await??;
        tracing::debug!(user_id, ?codes, "Permissions granted");
        Ok(())
    }
}
