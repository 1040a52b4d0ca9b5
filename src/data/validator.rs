//! Field-level input validation.
//!
//! A [`Validator`] collects one message per field; the first failure recorded
//! for a field wins. Handlers turn a non-empty validator into a 422 response.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern for plausible email addresses (W3C HTML5 form definition).
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// Accumulates validation failures keyed by field name.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no failure has been recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless the field already has one.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` for `key` when `ok` is false.
    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn max_bytes(value: &str, n: usize) -> bool {
    value.len() <= n
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

/// True when every element of `values` is distinct.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}
