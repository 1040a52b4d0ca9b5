//! User accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::data::validator::{self, Validator, EMAIL_RX};

/// Work factor bounds accepted by bcrypt.
pub const MIN_PASSWORD_COST: u32 = 4;
pub const MAX_PASSWORD_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// bcrypt hash of a password, salt and cost included. The plaintext is never kept.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `plaintext` at the given bcrypt `cost`. Blocks the calling thread.
    pub fn new(plaintext: &str, cost: u32) -> Result<Self, PasswordError> {
        Ok(Self(bcrypt::hash(plaintext, cost)?))
    }

    /// [`PasswordHash::new`] on the blocking pool.
    pub async fn new_blocking(plaintext: String, cost: u32) -> Result<Self, PasswordError> {
        tokio::task::spawn_blocking(move || Self::new(&plaintext, cost)).await?
    }

    /// bcrypt's own verification; the comparison is constant time.
    pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        Ok(bcrypt::verify(plaintext, &self.0)?)
    }

    /// [`PasswordHash::matches`] on the blocking pool.
    pub async fn matches_blocking(&self, plaintext: String) -> Result<bool, PasswordError> {
        let hash = self.clone();
        tokio::task::spawn_blocking(move || hash.matches(&plaintext)).await?
    }

    /// Work factor the hash was created with.
    pub fn cost(&self) -> Option<u32> {
        self.0.get(4..6).and_then(|c| c.parse().ok())
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cost() {
            Some(cost) => write!(f, "PasswordHash(bcrypt, cost={cost})"),
            None => f.write_str("PasswordHash(..)"),
        }
    }
}

/// A registered user. `version` guards concurrent updates like resources do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: PasswordHash,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

/// Input to a user insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: PasswordHash,
    pub activated: bool,
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(validator::matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_user(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(validator::not_blank(name), "name", "must be provided");
    v.check(validator::max_bytes(name, 500), "name", "must not be more than 500 bytes long");
    validate_email(v, email);
    validate_password_plaintext(v, password);
}
