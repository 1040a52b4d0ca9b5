//! Domain records and their field rules.
//!
//! # Data Flow
//! ```text
//! JSON body → handler input struct
//!     → validator.rs (field checks, 422 on failure)
//!     → resource.rs / user.rs / token.rs (domain types)
//!     → store (versioned persistence)
//! ```

pub mod filters;
pub mod permissions;
pub mod resource;
pub mod token;
pub mod user;
pub mod validator;

pub use filters::{Filters, Metadata};
pub use permissions::Permissions;
pub use resource::{Resource, ResourceDraft, Runtime};
pub use token::{Scope, Token, TokenHash};
pub use user::{NewUser, PasswordError, PasswordHash, User, MAX_PASSWORD_COST, MIN_PASSWORD_COST};
pub use validator::Validator;

/// Query for the resource listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Case-insensitive exact title match; empty matches everything.
    pub title: String,
    /// Every listed genre must be present on a match.
    pub genres: Vec<String>,
    pub filters: Filters,
}
