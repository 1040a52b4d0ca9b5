//! Versioned resource store.
//!
//! # Responsibilities
//! - Bound every backend interaction by the configured deadline
//! - Expose the compare-and-swap update contract to handlers
//! - Keep the caller's copy in step with the committed version
//!
//! # Design Decisions
//! - Conflicts are returned, never retried; the caller re-fetches
//! - Deleted and concurrently-modified rows both surface as `EditConflict`
//! - `delete` ignores versions and reports `NotFound` distinctly

use std::sync::Arc;
use std::time::Duration;

use crate::data::{Resource, ResourceDraft, ResourceQuery};
use crate::resilience::with_deadline;
use crate::store::backend::ResourceBackend;
use crate::store::StoreError;

#[derive(Clone)]
pub struct ResourceStore {
    backend: Arc<dyn ResourceBackend>,
    timeout: Duration,
}

impl ResourceStore {
    pub fn new(backend: Arc<dyn ResourceBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn insert(&self, draft: ResourceDraft) -> Result<Resource, StoreError> {
        let resource =
            with_deadline("resources.insert", self.timeout, self.backend.insert_resource(draft))
                .await??;
        tracing::debug!(id = resource.id, "Resource inserted");
        Ok(resource)
    }

    pub async fn get(&self, id: i64) -> Result<Resource, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        with_deadline("resources.get", self.timeout, self.backend.get_resource(id)).await?
    }

    pub async fn list(&self, query: &ResourceQuery) -> Result<(Vec<Resource>, u64), StoreError> {
        with_deadline("resources.list", self.timeout, self.backend.list_resources(query)).await?
    }

    /// Commit `resource` if its `version` is still current.
    ///
    /// On success `resource.version` is advanced to the committed version,
    /// which is also returned.
    pub async fn update(&self, resource: &mut Resource) -> Result<i32, StoreError> {
        let result =
            with_deadline("resources.update", self.timeout, self.backend.update_resource(resource))
                .await?;

        match result {
            Ok(version) => {
                resource.version = version;
                tracing::debug!(id = resource.id, version, "Resource updated");
                Ok(version)
            }
            Err(StoreError::EditConflict) => {
                tracing::debug!(
                    id = resource.id,
                    observed_version = resource.version,
                    "Resource update conflicted"
                );
                Err(StoreError::EditConflict)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        with_deadline("resources.delete", self.timeout, self.backend.delete_resource(id)).await??;
        tracing::debug!(id, "Resource deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Runtime;
    use crate::store::MemoryBackend;
    use async_trait::async_trait;

    fn store() -> ResourceStore {
        ResourceStore::new(Arc::new(MemoryBackend::new()), Duration::from_secs(3))
    }

    fn draft() -> ResourceDraft {
        ResourceDraft {
            title: "Moana".into(),
            year: 2016,
            runtime: Runtime(107),
            genres: vec!["animation".into(), "adventure".into()],
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_from_same_version() {
        let store = store();
        let original = store.insert(draft()).await.unwrap();

        let mut a = original.clone();
        a.title = "Moana (A)".into();
        let mut b = original.clone();
        b.title = "Moana (B)".into();

        let (ra, rb) = tokio::join!(
            {
                let store = store.clone();
                async move { store.update(&mut a).await.map(|v| (v, a)) }
            },
            {
                let store = store.clone();
                async move { store.update(&mut b).await.map(|v| (v, b)) }
            }
        );

        let (winner, loser) = match (ra, rb) {
            (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert_eq!(winner.0, original.version + 1);
        assert_eq!(winner.1.version, original.version + 1);
        assert!(matches!(loser, StoreError::EditConflict));

        // A follow-up from the committed version succeeds.
        let mut next = winner.1;
        next.year = 2017;
        assert_eq!(store.update(&mut next).await.unwrap(), original.version + 2);
    }

    #[tokio::test]
    async fn test_many_writers_one_lineage() {
        let store = store();
        let original = store.insert(draft()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let mut copy = original.clone();
            handles.push(tokio::spawn(async move {
                copy.title = format!("Moana {i}");
                store.update(&mut copy).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(version) => {
                    assert_eq!(version, 2);
                    successes += 1;
                }
                Err(StoreError::EditConflict) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.get(original.id).await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_update_after_delete_conflicts() {
        let store = store();
        let mut resource = store.insert(draft()).await.unwrap();
        store.delete(resource.id).await.unwrap();

        assert!(matches!(
            store.update(&mut resource).await,
            Err(StoreError::EditConflict)
        ));
        assert_eq!(resource.version, 1);
        assert!(matches!(store.delete(resource.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_non_positive_ids_are_not_found() {
        let store = store();
        assert!(matches!(store.get(0).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(-3).await, Err(StoreError::NotFound)));
    }

    struct StalledBackend;

    #[async_trait]
    impl ResourceBackend for StalledBackend {
        async fn insert_resource(&self, _: ResourceDraft) -> Result<Resource, StoreError> {
            std::future::pending().await
        }
        async fn get_resource(&self, _: i64) -> Result<Resource, StoreError> {
            std::future::pending().await
        }
        async fn list_resources(
            &self,
            _: &ResourceQuery,
        ) -> Result<(Vec<Resource>, u64), StoreError> {
            std::future::pending().await
        }
        async fn update_resource(&self, _: &Resource) -> Result<i32, StoreError> {
            std::future::pending().await
        }
        async fn delete_resource(&self, _: i64) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let store = ResourceStore::new(Arc::new(StalledBackend), Duration::from_millis(30));

        let err = store.get(1).await.unwrap_err();
        match err {
            StoreError::Timeout(deadline) => {
                assert_eq!(deadline.operation, "resources.get");
                assert_eq!(deadline.deadline, Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let mut resource = Resource::from_draft(1, chrono::Utc::now(), draft());
        assert!(matches!(
            store.update(&mut resource).await,
            Err(StoreError::Timeout(_))
        ));
        assert!(matches!(store.delete(1).await, Err(StoreError::Timeout(_))));
    }
}
