//! Token store.

use std::sync::Arc;
use std::time::Duration;

use crate::data::{Scope, Token};
use crate::resilience::with_deadline;
use crate::store::backend::TokenBackend;
use crate::store::StoreError;

#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
    timeout: Duration,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn TokenBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Generate a token for `user_id` and persist its hash.
    pub async fn issue(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, StoreError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        tracing::debug!(user_id, scope = scope.as_str(), "Token issued");
        Ok(token)
    }

    pub async fn insert(&self, token: &Token) -> Result<(), StoreError> {
        with_deadline("tokens.insert", self.timeout, self.backend.insert_token(token)).await?
    }

    pub async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError> {
        with_deadline(
            "tokens.delete_all_for_user",
            self.timeout,
            self.backend.delete_tokens_for_user(scope, user_id),
        )
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;

    #[tokio::test]
    async fn test_delete_only_touches_scope() {
        let tokens = TokenStore::new(Arc::new(MemoryBackend::new()), Duration::from_secs(3));
        let ttl = Duration::from_secs(60);

        tokens.issue(7, ttl, Scope::Activation).await.unwrap();
        tokens.issue(7, ttl, Scope::Activation).await.unwrap();
        tokens.issue(7, ttl, Scope::Authentication).await.unwrap();
        tokens.issue(8, ttl, Scope::Activation).await.unwrap();

        assert_eq!(tokens.delete_all_for_user(Scope::Activation, 7).await.unwrap(), 2);
        assert_eq!(tokens.delete_all_for_user(Scope::Activation, 7).await.unwrap(), 0);
        assert_eq!(tokens.delete_all_for_user(Scope::Authentication, 7).await.unwrap(), 1);
    }
}
