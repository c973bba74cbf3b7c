//! # Selection Store Module
//!
//! Short-lived, owner-scoped storage for options presented to a user in one
//! chat event and picked in a later one.
//!
//! Every entry is keyed by a store-generated [`SelectionKey`], belongs to one
//! owner and to one presentation group. Resolving a key is single-use: a
//! successful resolve removes the entry together with the rest of its group,
//! so a second press of any button from the same presentation finds nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Identifier of the user who owns a selection (Telegram user id)
pub type OwnerId = u64;

/// Opaque token correlating a presented option with its stored payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionKey(String);

impl SelectionKey {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap a token received back from the transport
    pub fn from_token(token: &str) -> Self {
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier shared by all entries created by one presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored option
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry<T> {
    pub key: SelectionKey,
    pub payload: T,
    pub owner: OwnerId,
    pub group: GroupId,
    pub created_at: Instant,
}

/// Reasons a resolve can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Key never issued, already consumed, superseded or expired
    #[error("selection not found or expired")]
    NotFound,
    /// Key exists but belongs to another user
    #[error("selection belongs to another user")]
    Forbidden,
}

/// Thread-safe selection store with single-use resolution and TTL expiry
///
/// All operations take one internal lock, so a key is never visible before
/// `put` returns and can never be resolved twice.
#[derive(Debug)]
pub struct SelectionStore<T> {
    entries: Mutex<HashMap<SelectionKey, SelectionEntry<T>>>,
    ttl: Duration,
}

impl<T> SelectionStore<T> {
    /// Create an empty store whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SelectionKey, SelectionEntry<T>>> {
        // Every mutation is a single insert/remove/retain, so a poisoned map is still valid.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `payload` for `owner` in its own single-entry group
    pub fn put(&self, payload: T, owner: OwnerId) -> SelectionKey {
        self.put_in_group(payload, owner, GroupId::new())
    }

    /// Store `payload` for `owner` as part of presentation `group`
    ///
    /// Expired entries are pruned opportunistically before inserting.
    pub fn put_in_group(&self, payload: T, owner: OwnerId, group: GroupId) -> SelectionKey {
        let mut entries = self.lock();
        let now = Instant::now();
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.created_at) < ttl);

        let mut key = SelectionKey::generate();
        while entries.contains_key(&key) {
            key = SelectionKey::generate();
        }

        entries.insert(
            key.clone(),
            SelectionEntry {
                key: key.clone(),
                payload,
                owner,
                group,
                created_at: now,
            },
        );
        key
    }

    /// Consume the entry behind `key` on behalf of `requester`
    ///
    /// On success the entry and every sibling from the same group are
    /// removed. A `Forbidden` attempt leaves the store untouched.
    pub fn resolve(
        &self,
        key: &SelectionKey,
        requester: OwnerId,
    ) -> Result<SelectionEntry<T>, SelectionError> {
        let mut entries = self.lock();

        let (owner, group, expired) = match entries.get(key) {
            Some(entry) => (
                entry.owner,
                entry.group,
                entry.created_at.elapsed() >= self.ttl,
            ),
            None => return Err(SelectionError::NotFound),
        };

        if expired {
            entries.remove(key);
            debug!(key = %key, "Selection expired before resolution");
            return Err(SelectionError::NotFound);
        }

        if owner != requester {
            return Err(SelectionError::Forbidden);
        }

        let entry = entries.remove(key).ok_or(SelectionError::NotFound)?;
        entries.retain(|_, sibling| sibling.group != group);
        Ok(entry)
    }

    /// Drop every entry older than `max_age`, returning how many were removed
    pub fn prune(&self, max_age: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() < max_age);
        before - entries.len()
    }

    /// Drop every entry older than the store's TTL
    pub fn prune_expired(&self) -> usize {
        self.prune(self.ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
