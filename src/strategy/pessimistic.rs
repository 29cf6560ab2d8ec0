//! Pessimistic row-lock transfer strategy
//!
//! Both rows are taken under an exclusive hold in the store before they are
//! read, so competing transfers on either account block until this one has
//! written and released. Holds are taken lowest id first, which keeps two
//! transfers running in opposite directions over the same pair from waiting
//! on each other forever.
//!
//! Holds are [`ExclusiveHold`] guards: they are released in reverse
//! acquisition order on every exit path, the insufficient-funds path
//! included.

use super::{apply_amount, log_attempt, log_success, receipt, StrategyKind, TransferStrategy};
use crate::core::{ExclusiveHold, LedgerStore};
use crate::types::{TransferRequest, TransferResult};
use std::sync::Arc;

/// Transfer strategy using store-level exclusive row holds
pub struct PessimisticTransfer {
    ledger: Arc<dyn LedgerStore>,
}

impl PessimisticTransfer {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

impl TransferStrategy for PessimisticTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pessimistic
    }

    fn transfer(&self, request: &TransferRequest) -> TransferResult {
        log_attempt(self.kind(), request);

        let (first_id, second_id) = request.ordered_ids();
        let first = ExclusiveHold::acquire(self.ledger.as_ref(), first_id)?;
        let second = ExclusiveHold::acquire(self.ledger.as_ref(), second_id)?;

        let (origin, target) = if first.account().id == *request.origin() {
            (first.account(), second.account())
        } else {
            (second.account(), first.account())
        };

        let (origin_balance, target_balance) =
            apply_amount(self.kind(), origin, target, request.amount())?;

        self.ledger.save(&origin.with_balance(origin_balance))?;
        self.ledger.save(&target.with_balance(target_balance))?;

        let receipt = receipt(request, origin_balance, target_balance, 1);
        log_success(self.kind(), &receipt);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::two_accounts;
    use rust_decimal_macros::dec;
    use std::thread;

    #[test]
    fn test_opposite_directions_do_not_deadlock() {
        let ledger = two_accounts(dec!(500.00), dec!(500.00));
        let strategy = PessimisticTransfer::new(ledger.clone());
        let forward = TransferRequest::new("abc", "cbd", dec!(1.00)).unwrap();
        let backward = TransferRequest::new("cbd", "abc", dec!(1.00)).unwrap();

        thread::scope(|scope| {
            for i in 0..8 {
                let request = if i % 2 == 0 { &forward } else { &backward };
                let strategy = &strategy;
                scope.spawn(move || {
                    for _ in 0..100 {
                        strategy.transfer(request).unwrap();
                    }
                });
            }
        });

        let balances: Vec<_> = ledger.accounts().into_iter().map(|a| a.balance).collect();
        assert_eq!(balances, vec![dec!(500.00), dec!(500.00)]);
        assert!(!ledger.is_held(&"abc".into()));
        assert!(!ledger.is_held(&"cbd".into()));
    }

    #[test]
    fn test_holds_released_after_insufficient_funds() {
        let ledger = two_accounts(dec!(0.00), dec!(0.00));
        let strategy = PessimisticTransfer::new(ledger.clone());
        let request = TransferRequest::new("abc", "cbd", dec!(1.00)).unwrap();

        // Would block forever on the second call if a hold leaked
        for _ in 0..3 {
            assert!(strategy.transfer(&request).is_err());
        }
        assert!(!ledger.is_held(&"abc".into()));
        assert!(!ledger.is_held(&"cbd".into()));
    }
}
