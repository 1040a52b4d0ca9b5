//! Opaque access tokens.
//!
//! The plaintext is 26 characters drawn from the RFC 4648 base32 alphabet and
//! is handed to the client exactly once. Only its SHA-256 digest is stored, so
//! every lookup goes through [`TokenHash::of`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data::validator::Validator;

/// Length of a token plaintext in bytes.
pub const TOKEN_LENGTH: usize = 26;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

/// SHA-256 digest of a token plaintext.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn of(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }
}

impl std::fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenHash({})", hex::encode(self.0))
    }
}

/// A freshly issued token. Serializes as `{"token", "expiry"}`.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// Issue a new random token for `user_id`, valid for `ttl`.
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Self {
        let mut rng = rand::thread_rng();
        let plaintext: String = (0..TOKEN_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        let expiry = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            hash: TokenHash::of(&plaintext),
            plaintext,
            user_id,
            expiry,
            scope,
        }
    }
}

/// Shape check performed before any lookup.
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH && plaintext.bytes().all(|b| ALPHABET.contains(&b))
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(plaintext.len() == TOKEN_LENGTH, "token", "must be 26 bytes long");
    v.check(is_well_formed(plaintext), "token", "must only contain base32 characters");
}
