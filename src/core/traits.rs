//! Core traits for ledger storage
//!
//! [`LedgerStore`] is the single boundary the transfer core depends on. Any
//! engine offering point reads, plain writes, version-checked writes and
//! exclusive row holds can sit behind it.

use crate::types::{Account, AccountId, LedgerError};

/// One conditional write inside [`LedgerStore::compare_and_save_all`]
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedWrite {
    /// Row to store (its `version` field is ignored)
    pub account: Account,
    /// Version the stored row must still carry for the write to apply
    pub expected_version: u64,
}

impl VersionedWrite {
    /// Write `account` back with a new balance, conditioned on the version it was read at
    pub fn from_read(account: &Account, balance: rust_decimal::Decimal) -> Self {
        VersionedWrite {
            account: account.with_balance(balance),
            expected_version: account.version,
        }
    }
}

/// Key to balance storage consumed by the transfer strategies
///
/// All methods block the calling thread. Implementations must be safe to call
/// from many worker threads at once.
pub trait LedgerStore: Send + Sync {
    /// Point read
    ///
    /// Returns `Ok(None)` if no row exists for `id`.
    fn get(&self, id: &AccountId) -> Result<Option<Account>, LedgerError>;

    /// Unconditional write
    ///
    /// Bumps the stored version and returns it.
    fn save(&self, account: &Account) -> Result<u64, LedgerError>;

    /// Write `account` only if the stored version still equals `expected_version`
    ///
    /// Returns the new version on success and `Ok(None)` on a version
    /// mismatch, in which case nothing is written.
    fn compare_and_save(
        &self,
        account: &Account,
        expected_version: u64,
    ) -> Result<Option<u64>, LedgerError>;

    /// All-or-nothing conditional write across several rows
    ///
    /// Either every write's expected version matches and all rows are written,
    /// or nothing is written and `Ok(None)` is returned.
    fn compare_and_save_all(
        &self,
        writes: &[VersionedWrite],
    ) -> Result<Option<Vec<u64>>, LedgerError>;

    /// Take an exclusive hold on a row and read it
    ///
    /// Blocks until no other caller holds the row. Every successful call must
    /// be paired with exactly one [`LedgerStore::release_exclusive`].
    fn acquire_exclusive(&self, id: &AccountId) -> Result<Account, LedgerError>;

    /// Release a hold taken by [`LedgerStore::acquire_exclusive`]
    fn release_exclusive(&self, id: &AccountId) -> Result<(), LedgerError>;
}

/// Exclusive row hold released on drop
///
/// Pairs [`LedgerStore::acquire_exclusive`] with exactly one release, on every
/// exit path including early returns and unwinding.
pub struct ExclusiveHold<'a> {
    store: &'a dyn LedgerStore,
    account: Account,
}

impl<'a> ExclusiveHold<'a> {
    /// Block until the row is free, then hold it
    pub fn acquire(store: &'a dyn LedgerStore, id: &AccountId) -> Result<Self, LedgerError> {
        let account = store.acquire_exclusive(id)?;
        Ok(ExclusiveHold { store, account })
    }

    /// Row as read when the hold was taken
    pub fn account(&self) -> &Account {
        &self.account
    }
}

impl Drop for ExclusiveHold<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_exclusive(&self.account.id) {
            tracing::error!(account = %self.account.id, error = %e, "failed to release exclusive hold");
        }
    }
}
