//! In-process backend built on concurrent maps.
//!
//! Every conditional write happens while holding the DashMap shard guard for
//! that row, so the version check and the payload write are one atomic step.
//! No method holds guards on two maps at once.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::data::{
    NewUser, Permissions, Resource, ResourceDraft, ResourceQuery, Scope, Token, TokenHash, User,
};
use crate::store::backend::{PermissionBackend, ResourceBackend, TokenBackend, UserBackend};
use crate::store::StoreError;

/// Stored form of a token; the plaintext never reaches this map.
#[derive(Debug, Clone)]
struct TokenRow {
    user_id: i64,
    scope: Scope,
    expiry: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    resources: DashMap<i64, Resource>,
    next_resource_id: AtomicI64,
    users: DashMap<i64, User>,
    /// Lower-cased email → user id; the uniqueness index.
    emails: DashMap<String, i64>,
    next_user_id: AtomicI64,
    tokens: DashMap<TokenHash, TokenRow>,
    permissions: DashMap<i64, BTreeSet<String>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            next_resource_id: AtomicI64::new(1),
            users: DashMap::new(),
            emails: DashMap::new(),
            next_user_id: AtomicI64::new(1),
            tokens: DashMap::new(),
            permissions: DashMap::new(),
        }
    }
}

fn email_key(email: &str) -> String {
    email.to_lowercase()
}

fn matches_query(resource: &Resource, query: &ResourceQuery) -> bool {
    let title_ok = query.title.is_empty() || resource.title.to_lowercase() == query.title.to_lowercase();
    let genres_ok = query
        .genres
        .iter()
        .all(|wanted| resource.genres.iter().any(|g| g == wanted));
    title_ok && genres_ok
}

fn compare(a: &Resource, b: &Resource, column: &str) -> std::cmp::Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "runtime" => a.runtime.cmp(&b.runtime),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl ResourceBackend for MemoryBackend {
    async fn insert_resource(&self, draft: ResourceDraft) -> Result<Resource, StoreError> {
        let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
        let resource = Resource::from_draft(id, Utc::now(), draft);
        self.resources.insert(id, resource.clone());
        Ok(resource)
    }

    async fn get_resource(&self, id: i64) -> Result<Resource, StoreError> {
        self.resources
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_resources(
        &self,
        query: &ResourceQuery,
    ) -> Result<(Vec<Resource>, u64), StoreError> {
        let mut matched: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| matches_query(r.value(), query))
            .map(|r| r.value().clone())
            .collect();

        let column = query.filters.sort_column();
        let descending = query.filters.sort_descending();
        matched.sort_by(|a, b| {
            let primary = compare(a, b, column);
            let primary = if descending { primary.reverse() } else { primary };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(query.filters.offset())
            .take(query.filters.limit())
            .collect();
        Ok((page, total))
    }

    async fn update_resource(&self, resource: &Resource) -> Result<i32, StoreError> {
        let Some(mut stored) = self.resources.get_mut(&resource.id) else {
            return Err(StoreError::EditConflict);
        };
        if stored.version != resource.version {
            return Err(StoreError::EditConflict);
        }

        let version = resource.version + 1;
        *stored = Resource {
            id: stored.id,
            created_at: stored.created_at,
            title: resource.title.clone(),
            year: resource.year,
            runtime: resource.runtime,
            genres: resource.genres.clone(),
            version,
        };
        Ok(version)
    }

    async fn delete_resource(&self, id: i64) -> Result<(), StoreError> {
        self.resources
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserBackend for MemoryBackend {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = match self.emails.entry(email_key(&user.email)) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let user = User {
            id,
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password: user.password,
            activated: user.activated,
            version: 1,
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let id = self
            .emails
            .get(&email_key(email))
            .map(|r| *r.value())
            .ok_or(StoreError::NotFound)?;
        self.users
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> Result<i32, StoreError> {
        let current_email = match self.users.get(&user.id) {
            Some(stored) => stored.email.clone(),
            None => return Err(StoreError::EditConflict),
        };

        let new_key = email_key(&user.email);
        let old_key = email_key(&current_email);
        let email_changed = new_key != old_key;
        if email_changed {
            match self.emails.entry(new_key.clone()) {
                Entry::Occupied(_) => return Err(StoreError::DuplicateEmail),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                }
            }
        }

        let outcome = match self.users.get_mut(&user.id) {
            Some(mut stored) if stored.version == user.version => {
                let version = user.version + 1;
                *stored = User {
                    version,
                    created_at: stored.created_at,
                    ..user.clone()
                };
                Ok(version)
            }
            _ => Err(StoreError::EditConflict),
        };

        if email_changed {
            let release = if outcome.is_ok() { old_key } else { new_key };
            self.emails.remove(&release);
        }
        outcome
    }

    async fn get_user_for_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let user_id = match self.tokens.get(hash) {
            Some(row) if row.scope == scope && row.expiry > now => row.user_id,
            _ => return Err(StoreError::NotFound),
        };
        self.users
            .get(&user_id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl TokenBackend for MemoryBackend {
    async fn insert_token(&self, token: &Token) -> Result<(), StoreError> {
        self.tokens.insert(
            token.hash,
            TokenRow {
                user_id: token.user_id,
                scope: token.scope,
                expiry: token.expiry,
            },
        );
        Ok(())
    }

    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError> {
        let before = self.tokens.len();
        self.tokens
            .retain(|_, row| !(row.scope == scope && row.user_id == user_id));
        Ok(before.saturating_sub(self.tokens.len()) as u64)
    }
}

#[async_trait]
impl PermissionBackend for MemoryBackend {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, StoreError> {
        Ok(self
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn grant_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StoreError> {
        let mut entry = self.permissions.entry(user_id).or_default();
        entry.extend(codes.iter().map(|c| c.to_string()));
        Ok(())
    }
}
