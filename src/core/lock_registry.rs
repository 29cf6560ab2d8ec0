//! Process-wide registry of per-account locks
//!
//! The registry lazily creates one reentrant lock per account id and hands
//! out shared handles to it. Entries are never removed, so the registry grows
//! with the number of distinct accounts ever locked.
//!
//! # Thread Safety
//!
//! Creation goes through `DashMap`'s entry API: when several threads miss on
//! the same id at once, exactly one creates the lock and every caller gets a
//! clone of that same `Arc`. Lookups for ids in different shards never
//! contend.

use crate::types::AccountId;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::sync::Arc;

/// Shared handle to one account's lock
pub type AccountLock = Arc<ReentrantMutex<()>>;

/// Lazily populated map from account id to lock handle
#[derive(Debug, Default)]
pub struct AccountLockRegistry {
    locks: DashMap<AccountId, AccountLock>,
}

impl AccountLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Lock handle for `id`, created on first use
    pub fn get_lock(&self, id: &AccountId) -> AccountLock {
        if let Some(lock) = self.locks.get(id) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(id.clone())
                .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
                .value(),
        )
    }

    /// Lock handles for two accounts, lowest id first
    ///
    /// Acquiring the returned handles left to right gives every caller the
    /// same acquisition order for a given pair, whichever way money moves.
    pub fn lock_pair(&self, a: &AccountId, b: &AccountId) -> (AccountLock, AccountLock) {
        if a <= b {
            (self.get_lock(a), self.get_lock(b))
        } else {
            (self.get_lock(b), self.get_lock(a))
        }
    }

    /// Number of distinct accounts with a lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
