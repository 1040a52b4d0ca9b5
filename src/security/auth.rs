//! Authentication and authorization chain.
//!
//! # Responsibilities
//! - Resolve a [`Principal`] from the `Authorization` header
//! - Gate routes behind an ordered list of guards
//!
//! # Design Decisions
//! - No header means anonymous, which is not an error
//! - Malformed, unknown and expired tokens are indistinguishable to the caller
//! - Guards run authenticated → activated → permission and stop at the
//!   first failure, so the reported tier is the lowest one that failed
//!
//! # Data Flow
//! ```text
//! Request
//!     → authenticate (resolve, insert Principal, Vary: Authorization)
//!     → require(Requirement) on gated routes
//!     → handler
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::data::token::is_well_formed;
use crate::data::{Permissions, Scope};
use crate::http::response::ApiError;
use crate::store::{PermissionStore, StoreError, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrincipalKind {
    Anonymous,
    Authenticated,
}

/// The identity attached to one request. Rebuilt for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub user_id: Option<i64>,
    pub activated: bool,
    pub permissions: Permissions,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            kind: PrincipalKind::Anonymous,
            user_id: None,
            activated: false,
            permissions: Permissions::new(),
        }
    }

    pub fn authenticated(user_id: i64, activated: bool, permissions: Permissions) -> Self {
        Self {
            kind: PrincipalKind::Authenticated,
            user_id: Some(user_id),
            activated,
            permissions,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == PrincipalKind::Anonymous
    }
}

/// Credential resolution failures.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong scheme, malformed token, or no live matching token.
    #[error("invalid or missing authentication token")]
    InvalidToken,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AuthError::InvalidToken,
            other => AuthError::Store(other),
        }
    }
}

/// The first guard that rejected a principal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted { code: &'static str },
}

/// One predicate in the authorization chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Authenticated,
    Activated,
    Permission(&'static str),
}

impl Guard {
    fn check(self, principal: &Principal) -> Result<(), AuthzError> {
        match self {
            Guard::Authenticated if principal.is_anonymous() => {
                Err(AuthzError::AuthenticationRequired)
            }
            Guard::Activated if !principal.activated => Err(AuthzError::InactiveAccount),
            Guard::Permission(code) if !principal.permissions.include(code) => {
                Err(AuthzError::NotPermitted { code })
            }
            _ => Ok(()),
        }
    }
}

/// What a route demands of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Activated,
    Permission(&'static str),
}

impl Requirement {
    /// The guards implied by this requirement, lowest tier first.
    pub fn guards(&self) -> Vec<Guard> {
        match *self {
            Requirement::Authenticated => vec![Guard::Authenticated],
            Requirement::Activated => vec![Guard::Authenticated, Guard::Activated],
            Requirement::Permission(code) => {
                vec![Guard::Authenticated, Guard::Activated, Guard::Permission(code)]
            }
        }
    }
}

/// Run the guards for `requirement` in order, stopping at the first failure.
pub fn authorize(principal: &Principal, requirement: Requirement) -> Result<(), AuthzError> {
    requirement
        .guards()
        .into_iter()
        .try_for_each(|guard| guard.check(principal))
}

/// Extract the token from a `Bearer <token>` header value.
///
/// Anything but exactly two space-separated parts with the literal scheme
/// `Bearer` is rejected.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Resolves principals from request headers.
#[derive(Clone)]
pub struct AuthChain {
    users: UserStore,
    permissions: PermissionStore,
}

impl AuthChain {
    pub fn new(users: UserStore, permissions: PermissionStore) -> Self {
        Self { users, permissions }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let value = match headers.get(header::AUTHORIZATION) {
            None => return Ok(Principal::anonymous()),
            Some(v) if v.is_empty() => return Ok(Principal::anonymous()),
            Some(v) => v.to_str().map_err(|_| AuthError::InvalidToken)?,
        };

        let token = parse_bearer(value).ok_or(AuthError::InvalidToken)?;
        if !is_well_formed(token) {
            return Err(AuthError::InvalidToken);
        }

        let user = self.users.get_for_token(Scope::Authentication, token).await?;
        let permissions = self.permissions.for_user(user.id).await?;

        Ok(Principal::authenticated(user.id, user.activated, permissions))
    }
}

/// Middleware resolving the principal for every request.
///
/// Adds `Vary: Authorization` to every response it produces.
pub async fn authenticate(
    State(chain): State<AuthChain>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let resolved = chain.resolve(request.headers()).await;
    let mut response = match resolved {
        Ok(principal) => {
            if let Some(user_id) = principal.user_id {
                tracing::Span::current().record("user_id", user_id);
            }
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Authentication failed");
            ApiError::from(e).into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Route-layer middleware enforcing `requirement` against the resolved principal.
pub async fn require(
    State(requirement): State<Requirement>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let anonymous = Principal::anonymous();
    let principal = request.extensions().get::<Principal>().unwrap_or(&anonymous);

    match authorize(principal, requirement) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(user_id = ?principal.user_id, error = %e, "Authorization denied");
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::permissions::RESOURCES_WRITE;
    use crate::data::{NewUser, PasswordHash, MIN_PASSWORD_COST};
    use crate::store::Store;
    use std::time::Duration;

    fn activated_writer() -> Principal {
        Principal::authenticated(1, true, [RESOURCES_WRITE.to_string()].into_iter().collect())
    }

    #[test]
    fn test_guard_order_reports_lowest_failing_tier() {
        let write = Requirement::Permission(RESOURCES_WRITE);

        assert_eq!(
            authorize(&Principal::anonymous(), write),
            Err(AuthzError::AuthenticationRequired)
        );

        let inactive = Principal::authenticated(1, false, Permissions::new());
        assert_eq!(authorize(&inactive, write), Err(AuthzError::InactiveAccount));
        assert_eq!(authorize(&inactive, Requirement::Authenticated), Ok(()));

        let reader = Principal::authenticated(1, true, Permissions::new());
        assert_eq!(
            authorize(&reader, write),
            Err(AuthzError::NotPermitted { code: RESOURCES_WRITE })
        );

        assert_eq!(authorize(&activated_writer(), write), Ok(()));
    }

    #[test]
    fn test_inactive_with_permission_still_rejected() {
        let principal = Principal::authenticated(
            1,
            false,
            [RESOURCES_WRITE.to_string()].into_iter().collect(),
        );
        assert_eq!(
            authorize(&principal, Requirement::Permission(RESOURCES_WRITE)),
            Err(AuthzError::InactiveAccount)
        );
    }

    #[test]
    fn test_parse_bearer_shapes() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("Bearer "), Some(""));
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer abc def"), None);
        assert_eq!(parse_bearer("Token Bearer"), None);
    }

    async fn chain_with_user(activated: bool) -> (AuthChain, String) {
        let store = Store::in_memory(Duration::from_secs(3));
        let user = store
            .users
            .insert(NewUser {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                password: PasswordHash::new("pa55word!", MIN_PASSWORD_COST).unwrap(),
                activated,
            })
            .await
            .unwrap();
        store.permissions.grant(user.id, &[RESOURCES_WRITE]).await.unwrap();
        let token = store
            .tokens
            .issue(user.id, Duration::from_secs(60), Scope::Authentication)
            .await
            .unwrap();
        (AuthChain::new(store.users, store.permissions), token.plaintext)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_resolve_missing_header_is_anonymous() {
        let (chain, _) = chain_with_user(true).await;
        let principal = chain.resolve(&HeaderMap::new()).await.unwrap();
        assert!(principal.is_anonymous());
        assert!(principal.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_valid_token() {
        let (chain, token) = chain_with_user(false).await;
        let principal = chain.resolve(&headers(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(principal.kind, PrincipalKind::Authenticated);
        assert!(!principal.activated);
        assert!(principal.permissions.include(RESOURCES_WRITE));
    }

    #[tokio::test]
    async fn test_resolve_failures_are_uniform() {
        let (chain, token) = chain_with_user(true).await;
        let unknown = "A".repeat(26);

        for value in [
            "Bearer ".to_string(),
            "Bearer short".to_string(),
            format!("Bearer {unknown}"),
            format!("Basic {token}"),
            format!("Bearer {token} extra"),
            format!("Bearer {}", token.to_lowercase()),
        ] {
            let err = chain.resolve(&headers(&value)).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken), "{value:?} gave {err:?}");
        }
    }

    #[tokio::test]
    async fn test_activation_token_does_not_authenticate() {
        let store = Store::in_memory(Duration::from_secs(3));
        let token = store
            .tokens
            .issue(1, Duration::from_secs(60), Scope::Activation)
            .await
            .unwrap();
        let chain = AuthChain::new(store.users, store.permissions);

        let err = chain
            .resolve(&headers(&format!("Bearer {}", token.plaintext)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
