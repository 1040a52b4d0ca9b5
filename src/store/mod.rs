//! Record store subsystem.
//!
//! # Data Flow
//! ```text
//! Handler
//!     → resources.rs / users.rs / tokens.rs (deadline-bounded calls)
//!     → backend.rs traits
//!     → memory.rs (bundled concurrent-map backend)
//! ```
//!
//! # Design Decisions
//! - Optimistic concurrency: updates are compare-and-swap on `version`
//! - A zero-row conditional write is a conflict, never a silent success
//! - Every backend call is bounded by `store.timeout_secs`

pub mod backend;
pub mod memory;
pub mod permissions;
pub mod resources;
pub mod tokens;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::DeadlineExceeded;

pub use backend::{Backend, PermissionBackend, ResourceBackend, TokenBackend, UserBackend};
pub use memory::MemoryBackend;
pub use permissions::PermissionStore;
pub use resources::ResourceStore;
pub use tokens::TokenStore;
pub use users::UserStore;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The conditional write matched no row: the record was modified or
    /// deleted since the caller read it.
    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// All stores sharing one backend.
#[derive(Clone)]
pub struct Store {
    pub resources: ResourceStore,
    pub users: UserStore,
    pub tokens: TokenStore,
    pub permissions: PermissionStore,
}

impl Store {
    /// Build every store over `backend`, each call bounded by `timeout`.
    pub fn new<B: Backend + 'static>(backend: Arc<B>, timeout: Duration) -> Self {
        Self {
            resources: ResourceStore::new(backend.clone(), timeout),
            users: UserStore::new(backend.clone(), timeout),
            tokens: TokenStore::new(backend.clone(), timeout),
            permissions: PermissionStore::new(backend, timeout),
        }
    }

    pub fn in_memory(timeout: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), timeout)
    }
}
