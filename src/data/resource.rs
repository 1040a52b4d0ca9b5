//! Catalog resources: the versioned records served under `/v1/resources`.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::data::validator::{self, Validator};

/// Running time in minutes. Serialized as `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Runtime(pub i32);

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_suffix(" mins")
            .and_then(|n| n.parse::<i32>().ok())
            .map(Runtime)
            .ok_or_else(|| de::Error::custom("invalid runtime format"))
    }
}

/// The mutable payload of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDraft {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

/// A stored resource. `version` starts at 1 and grows by one per update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "runtime_is_zero")]
    pub runtime: Runtime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub version: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

fn runtime_is_zero(r: &Runtime) -> bool {
    r.0 == 0
}

impl Resource {
    /// Materialize a freshly inserted row.
    pub fn from_draft(id: i64, created_at: DateTime<Utc>, draft: ResourceDraft) -> Self {
        Self {
            id,
            created_at,
            title: draft.title,
            year: draft.year,
            runtime: draft.runtime,
            genres: draft.genres,
            version: 1,
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        check_fields(v, &self.title, self.year, self.runtime, &self.genres);
    }
}

impl ResourceDraft {
    pub fn validate(&self, v: &mut Validator) {
        check_fields(v, &self.title, self.year, self.runtime, &self.genres);
    }
}

fn check_fields(v: &mut Validator, title: &str, year: i32, runtime: Runtime, genres: &[String]) {
    v.check(validator::not_blank(title), "title", "must be provided");
    v.check(validator::max_bytes(title, 500), "title", "must not be more than 500 bytes long");

    v.check(year != 0, "year", "must be provided");
    v.check(year >= 1888, "year", "must be greater than 1888");
    v.check(year <= Utc::now().year(), "year", "must not be in the future");

    v.check(runtime.0 != 0, "runtime", "must be provided");
    v.check(runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(genres.len() <= 5, "genres", "must not contain more than 5 genres");
    v.check(validator::unique(genres), "genres", "must not contain duplicate values");
}
