//! In-process ledger store
//!
//! This module provides [`MemoryLedger`], a thread-safe implementation of
//! [`LedgerStore`] used to drive and test the transfer strategies.
//!
//! # Design
//!
//! Rows live in a `DashMap` keyed by account id. Each row carries its own
//! `parking_lot::Mutex` guarding the account data and the exclusive-hold flag,
//! plus a `Condvar` on which would-be holders park until the current holder
//! releases. Row handles are `Arc`s cloned out of the map, so no map shard lock
//! is ever held while a row mutex is waited on.
//!
//! # Hold Semantics
//!
//! An exclusive hold excludes other holders only. Plain and versioned writes
//! are not blocked by a hold; each strategy uses a single discipline, so a
//! strategy relying on holds never races a versioned writer.

use crate::core::traits::{LedgerStore, VersionedWrite};
use crate::types::{Account, AccountId, LedgerError};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug)]
struct RowState {
    account: Account,
    held: bool,
}

#[derive(Debug)]
struct Row {
    state: Mutex<RowState>,
    released: Condvar,
}

impl Row {
    fn new(account: Account) -> Self {
        Row {
            state: Mutex::new(RowState {
                account,
                held: false,
            }),
            released: Condvar::new(),
        }
    }
}

/// Write `account`'s balance into a locked row and bump its version
fn commit(state: &mut RowState, account: &Account) -> u64 {
    state.account.balance = account.balance;
    state.account.version += 1;
    state.account.version
}

/// Thread-safe in-memory ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    rows: DashMap<AccountId, Arc<Row>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Create an account if it does not exist yet
    ///
    /// Existing rows are left untouched. Returns `true` if a row was created.
    ///
    /// # Errors
    ///
    /// `NegativeBalance` if `balance` is below zero; no row is created.
    pub fn open_account(&self, id: impl Into<AccountId>, balance: Decimal) -> Result<bool, LedgerError> {
        let id = id.into();
        if balance < Decimal::ZERO {
            return Err(LedgerError::negative_balance(&id, balance));
        }
        let mut created = false;
        self.rows.entry(id.clone()).or_insert_with(|| {
            created = true;
            Arc::new(Row::new(Account::new(id, balance)))
        });
        Ok(created)
    }

    /// Overwrite an account's balance
    ///
    /// Counts as a committed write: the version is bumped. A negative
    /// balance is rejected before the row is touched.
    pub fn set_balance(&self, id: &AccountId, balance: Decimal) -> Result<u64, LedgerError> {
        if balance < Decimal::ZERO {
            return Err(LedgerError::negative_balance(id, balance));
        }
        let row = self.row(id)?;
        let mut state = row.state.lock();
        let account = state.account.with_balance(balance);
        Ok(commit(&mut state, &account))
    }

    /// Snapshot of every account, sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        let rows: Vec<Arc<Row>> = self.rows.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut accounts: Vec<Account> = rows.iter().map(|row| row.state.lock().account.clone()).collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Decimal {
        self.accounts().iter().map(|account| account.balance).sum()
    }

    /// Whether a row is currently exclusively held
    pub fn is_held(&self, id: &AccountId) -> bool {
        self.rows
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .is_some_and(|row| row.state.lock().held)
    }

    fn row(&self, id: &AccountId) -> Result<Arc<Row>, LedgerError> {
        self.rows
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::account_not_found(id))
    }
}

impl LedgerStore for MemoryLedger {
    fn get(&self, id: &AccountId) -> Result<Option<Account>, LedgerError> {
        let Some(row) = self.rows.get(id).map(|entry| Arc::clone(entry.value())) else {
            return Ok(None);
        };
        let account = row.state.lock().account.clone();
        Ok(Some(account))
    }

    fn save(&self, account: &Account) -> Result<u64, LedgerError> {
        let row = self.row(&account.id)?;
        let mut state = row.state.lock();
        Ok(commit(&mut state, account))
    }

    fn compare_and_save(
        &self,
        account: &Account,
        expected_version: u64,
    ) -> Result<Option<u64>, LedgerError> {
        let row = self.row(&account.id)?;
        let mut state = row.state.lock();
        if state.account.version != expected_version {
            return Ok(None);
        }
        Ok(Some(commit(&mut state, account)))
    }

    fn compare_and_save_all(
        &self,
        writes: &[VersionedWrite],
    ) -> Result<Option<Vec<u64>>, LedgerError> {
        // Latch rows in id order so concurrent multi-row commits cannot deadlock
        let mut order: Vec<usize> = (0..writes.len()).collect();
        order.sort_by(|&a, &b| writes[a].account.id.cmp(&writes[b].account.id));
        for pair in order.windows(2) {
            if writes[pair[0]].account.id == writes[pair[1]].account.id {
                return Err(LedgerError::duplicate_write(&writes[pair[0]].account.id));
            }
        }

        let rows = order
            .iter()
            .map(|&i| self.row(&writes[i].account.id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guards: Vec<MutexGuard<'_, RowState>> = rows.iter().map(|row| row.state.lock()).collect();

        let all_match = order
            .iter()
            .zip(guards.iter())
            .all(|(&i, state)| state.account.version == writes[i].expected_version);
        if !all_match {
            return Ok(None);
        }

        let mut versions = vec![0; writes.len()];
        for (&i, state) in order.iter().zip(guards.iter_mut()) {
            versions[i] = commit(state, &writes[i].account);
        }
        Ok(Some(versions))
    }

    fn acquire_exclusive(&self, id: &AccountId) -> Result<Account, LedgerError> {
        let row = self.row(id)?;
        let mut state = row.state.lock();
        while state.held {
            row.released.wait(&mut state);
        }
        state.held = true;
        Ok(state.account.clone())
    }

    fn release_exclusive(&self, id: &AccountId) -> Result<(), LedgerError> {
        let row = self.row(id)?;
        let mut state = row.state.lock();
        if !state.held {
            return Err(LedgerError::not_held(id));
        }
        state.held = false;
        drop(state);
        row.released.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ExclusiveHold;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn ledger_with(accounts: &[(&str, Decimal)]) -> MemoryLedger {
        let ledger = MemoryLedger::new();
        for (id, balance) in accounts {
            ledger.open_account(*id, *balance).unwrap();
        }
        ledger
    }

    #[test]
    fn test_get_returns_none_for_unknown_account() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.get(&"abc".into()).unwrap(), None);
    }

    #[test]
    fn test_open_account_does_not_overwrite_existing_row() {
        let ledger = MemoryLedger::new();
        assert!(ledger.open_account("abc", dec!(10.00)).unwrap());
        assert!(!ledger.open_account("abc", dec!(99.00)).unwrap());

        let account = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(account.balance, dec!(10.00));
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_open_account_rejects_negative_balance() {
        let ledger = MemoryLedger::new();
        assert_eq!(
            ledger.open_account("abc", dec!(-5.00)),
            Err(LedgerError::negative_balance(&"abc".into(), dec!(-5.00)))
        );
        assert_eq!(ledger.get(&"abc".into()).unwrap(), None);
        assert!(ledger.open_account("abc", dec!(0.00)).unwrap());
    }

    #[test]
    fn test_set_balance_rejects_negative_balance() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        assert_eq!(
            ledger.set_balance(&"abc".into(), dec!(-0.01)),
            Err(LedgerError::negative_balance(&"abc".into(), dec!(-0.01)))
        );

        let account = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(account.balance, dec!(10.00));
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_save_bumps_version() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        let account = ledger.get(&"abc".into()).unwrap().unwrap();

        let version = ledger.save(&account.with_balance(dec!(7.00))).unwrap();
        assert_eq!(version, 1);

        let stored = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(stored.balance, dec!(7.00));
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_save_unknown_account_fails() {
        let ledger = MemoryLedger::new();
        let result = ledger.save(&Account::new("ghost".into(), dec!(1.00)));
        assert_eq!(result, Err(LedgerError::account_not_found(&"ghost".into())));
    }

    #[test]
    fn test_compare_and_save_rejects_stale_version() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        let read = ledger.get(&"abc".into()).unwrap().unwrap();

        assert_eq!(ledger.compare_and_save(&read.with_balance(dec!(9.00)), 0).unwrap(), Some(1));
        // Second writer still holds version 0
        assert_eq!(ledger.compare_and_save(&read.with_balance(dec!(8.00)), 0).unwrap(), None);

        let stored = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(stored.balance, dec!(9.00));
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn test_compare_and_save_all_is_all_or_nothing() {
        let ledger = ledger_with(&[("abc", dec!(10.00)), ("cbd", dec!(10.00))]);
        let a = ledger.get(&"abc".into()).unwrap().unwrap();
        let b = ledger.get(&"cbd".into()).unwrap().unwrap();

        // Make cbd stale
        ledger.set_balance(&"cbd".into(), dec!(11.00)).unwrap();

        let writes = [
            VersionedWrite::from_read(&a, dec!(9.00)),
            VersionedWrite::from_read(&b, dec!(11.00)),
        ];
        assert_eq!(ledger.compare_and_save_all(&writes).unwrap(), None);

        // abc must be untouched
        let stored = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(stored.balance, dec!(10.00));
        assert_eq!(stored.version, 0);
    }

    #[test]
    fn test_compare_and_save_all_commits_every_row() {
        let ledger = ledger_with(&[("abc", dec!(10.00)), ("cbd", dec!(10.00))]);
        let a = ledger.get(&"abc".into()).unwrap().unwrap();
        let b = ledger.get(&"cbd".into()).unwrap().unwrap();

        // Given in reverse id order, versions come back in input order
        let writes = [
            VersionedWrite::from_read(&b, dec!(11.00)),
            VersionedWrite::from_read(&a, dec!(9.00)),
        ];
        assert_eq!(ledger.compare_and_save_all(&writes).unwrap(), Some(vec![1, 1]));
        assert_eq!(ledger.total_balance(), dec!(20.00));
    }

    #[test]
    fn test_compare_and_save_all_rejects_duplicate_rows() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        let a = ledger.get(&"abc".into()).unwrap().unwrap();
        let writes = [
            VersionedWrite::from_read(&a, dec!(9.00)),
            VersionedWrite::from_read(&a, dec!(8.00)),
        ];
        assert_eq!(
            ledger.compare_and_save_all(&writes),
            Err(LedgerError::duplicate_write(&"abc".into()))
        );
    }

    #[test]
    fn test_release_without_hold_fails() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        assert_eq!(
            ledger.release_exclusive(&"abc".into()),
            Err(LedgerError::not_held(&"abc".into()))
        );
    }

    #[test]
    fn test_exclusive_hold_released_on_drop() {
        let ledger = ledger_with(&[("abc", dec!(10.00))]);
        {
            let hold = ExclusiveHold::acquire(&ledger, &"abc".into()).unwrap();
            assert_eq!(hold.account().balance, dec!(10.00));
            assert!(ledger.is_held(&"abc".into()));
        }
        assert!(!ledger.is_held(&"abc".into()));
    }

    #[test]
    fn test_exclusive_hold_blocks_second_holder() {
        let ledger = Arc::new(ledger_with(&[("abc", dec!(10.00))]));
        let acquired = Arc::new(AtomicBool::new(false));

        ledger.acquire_exclusive(&"abc".into()).unwrap();

        let handle = {
            let ledger = Arc::clone(&ledger);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                ledger.acquire_exclusive(&"abc".into()).unwrap();
                acquired.store(true, Ordering::SeqCst);
                ledger.release_exclusive(&"abc".into()).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        ledger.release_exclusive(&"abc".into()).unwrap();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(!ledger.is_held(&"abc".into()));
    }

    #[test]
    fn test_concurrent_compare_and_save_never_loses_updates() {
        let ledger = Arc::new(ledger_with(&[("abc", dec!(0.00))]));
        let mut handles = vec![];

        // Each thread increments by 1.00 using a CAS retry loop
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    loop {
                        let read = ledger.get(&"abc".into()).unwrap().unwrap();
                        let next = read.with_balance(read.balance + dec!(1.00));
                        if ledger.compare_and_save(&next, read.version).unwrap().is_some() {
                            break;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let stored = ledger.get(&"abc".into()).unwrap().unwrap();
        assert_eq!(stored.balance, dec!(800.00));
        assert_eq!(stored.version, 800);
    }

    #[test]
    fn test_accounts_sorted_by_id() {
        let ledger = ledger_with(&[("cbd", dec!(1.00)), ("abc", dec!(2.00))]);
        let ids: Vec<String> = ledger.accounts().iter().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, vec!["abc", "cbd"]);
        assert_eq!(ledger.total_balance(), dec!(3.00));
    }
}
