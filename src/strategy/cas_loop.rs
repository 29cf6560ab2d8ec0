//! Compare-and-swap loop transfer strategy
//!
//! Balances are mirrored into shared in-memory cells (one `AtomicI64` of
//! minor units per account, seeded from the store the first time an account
//! is touched). A transfer snapshots both cells, swaps the origin, then swaps
//! the target. If the target swap loses, the origin debit is handed back and
//! the pair is re-read and retried, so no pass leaves a debit without its
//! credit once it returns. After both swaps land, the new balances are
//! written through to the store with plain saves.
//!
//! # Known Gaps
//!
//! This strategy is kept for comparison and is not a correct way to move
//! money:
//!
//! - Between the origin swap and the compensation of a lost target swap,
//!   other workers can observe the debited origin (a torn pair) and may fail
//!   with `InsufficientFunds` on it.
//! - The write-through saves are unordered. A worker can save a balance that
//!   another worker has already superseded, so the store may end up behind
//!   the cells. Two independent atomics are no substitute for a transactional
//!   commit in durable storage.

use super::{log_attempt, log_success, receipt, StrategyKind, TransferStrategy};
use crate::core::LedgerStore;
use crate::types::account::{from_minor_units, to_minor_units};
use crate::types::{Account, AccountId, TransferError, TransferRequest, TransferResult};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::hint;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Transfer strategy spinning on compare-and-swap over balance cells
pub struct CasLoopTransfer {
    ledger: Arc<dyn LedgerStore>,
    cells: DashMap<AccountId, Arc<AtomicI64>>,
}

impl CasLoopTransfer {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            cells: DashMap::new(),
        }
    }

    /// Current in-memory balance of an account, if its cell exists
    pub fn cell_balance(&self, id: &AccountId) -> Option<Decimal> {
        self.cells
            .get(id)
            .map(|cell| from_minor_units(cell.load(Ordering::SeqCst)))
    }

    /// Sum of all in-memory cells
    pub fn cell_total(&self) -> Decimal {
        self.cells
            .iter()
            .map(|cell| from_minor_units(cell.load(Ordering::SeqCst)))
            .sum()
    }

    /// Cell for `id`, seeded from the store on first use
    fn cell(&self, id: &AccountId) -> Result<Arc<AtomicI64>, TransferError> {
        if let Some(cell) = self.cells.get(id) {
            return Ok(Arc::clone(cell.value()));
        }

        let account = self
            .ledger
            .get(id)?
            .ok_or_else(|| TransferError::account_not_found(id))?;
        let units = to_minor_units(account.balance).ok_or_else(|| {
            TransferError::aborted(format!("balance of {id} does not fit a balance cell"))
        })?;

        // First seeder wins; later seeders see its cell
        let cell = self
            .cells
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AtomicI64::new(units)));
        Ok(Arc::clone(cell.value()))
    }
}

impl TransferStrategy for CasLoopTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CasLoop
    }

    fn transfer(&self, request: &TransferRequest) -> TransferResult {
        log_attempt(self.kind(), request);

        let origin_cell = self.cell(request.origin())?;
        let target_cell = self.cell(request.target())?;
        let amount = to_minor_units(request.amount())
            .ok_or_else(|| TransferError::aborted("amount does not fit a balance cell"))?;

        let mut passes = 1;
        let (origin_units, target_units) = loop {
            let origin_now = origin_cell.load(Ordering::SeqCst);
            let target_now = target_cell.load(Ordering::SeqCst);

            if origin_now < amount {
                let available = from_minor_units(origin_now);
                tracing::warn!(
                    strategy = %self.kind(),
                    account = %request.origin(),
                    required = %request.amount(),
                    available = %available,
                    "insufficient balance"
                );
                return Err(TransferError::insufficient_funds(
                    request.origin(),
                    available,
                    request.amount(),
                ));
            }

            let origin_next = origin_now - amount;
            let target_next = target_now
                .checked_add(amount)
                .ok_or_else(|| TransferError::aborted(format!("balance overflow on {}", request.target())))?;

            if origin_cell
                .compare_exchange(origin_now, origin_next, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                passes += 1;
                hint::spin_loop();
                continue;
            }

            if target_cell
                .compare_exchange(target_now, target_next, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                // Hand the debit back before retrying from a fresh pair
                origin_cell.fetch_add(amount, Ordering::SeqCst);
                passes += 1;
                hint::spin_loop();
                continue;
            }

            break (origin_next, target_next);
        };

        let origin_balance = from_minor_units(origin_units);
        let target_balance = from_minor_units(target_units);

        self.ledger
            .save(&Account::new(request.origin().clone(), origin_balance))?;
        self.ledger
            .save(&Account::new(request.target().clone(), target_balance))?;

        let receipt = receipt(request, origin_balance, target_balance, passes);
        log_success(self.kind(), &receipt);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::two_accounts;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicU32;
    use std::thread;

    #[test]
    fn test_cells_seeded_from_store_once() {
        let ledger = two_accounts(dec!(10.00), dec!(10.00));
        let strategy = CasLoopTransfer::new(ledger.clone());
        let request = TransferRequest::new("abc", "cbd", dec!(1.00)).unwrap();

        strategy.transfer(&request).unwrap();
        // A store reset is not seen by already-seeded cells
        ledger.set_balance(&"abc".into(), dec!(100.00)).unwrap();
        strategy.transfer(&request).unwrap();

        assert_eq!(strategy.cell_balance(&"abc".into()), Some(dec!(8.00)));
        assert_eq!(strategy.cell_balance(&"cbd".into()), Some(dec!(12.00)));
        assert_eq!(strategy.cell_balance(&"zzz".into()), None);
    }

    #[test]
    fn test_cells_conserve_total_under_contention() {
        let ledger = two_accounts(dec!(1000.00), dec!(1000.00));
        let strategy = CasLoopTransfer::new(ledger);
        let forward = TransferRequest::new("abc", "cbd", dec!(1.00)).unwrap();
        let backward = TransferRequest::new("cbd", "abc", dec!(1.00)).unwrap();
        let successes = AtomicU32::new(0);

        thread::scope(|scope| {
            for i in 0..8 {
                let request = if i % 2 == 0 { &forward } else { &backward };
                let strategy = &strategy;
                let successes = &successes;
                scope.spawn(move || {
                    for _ in 0..200 {
                        if strategy.transfer(request).is_ok() {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(strategy.cell_total(), dec!(2000.00));
        assert!(successes.load(Ordering::SeqCst) <= 1600);
    }

    #[test]
    fn test_cells_never_go_negative() {
        let ledger = two_accounts(dec!(50.00), dec!(0.00));
        let strategy = CasLoopTransfer::new(ledger);
        let request = TransferRequest::new("abc", "cbd", dec!(5.00)).unwrap();
        let successes = AtomicU32::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        if strategy.transfer(&request).is_ok() {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        let moved = Decimal::from(successes.load(Ordering::SeqCst)) * dec!(5.00);
        assert!(moved <= dec!(50.00));
        assert_eq!(strategy.cell_balance(&"abc".into()), Some(dec!(50.00) - moved));
        assert_eq!(strategy.cell_balance(&"cbd".into()), Some(moved));
    }
}
