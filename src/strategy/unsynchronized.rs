//! Unsynchronized transfer strategy
//!
//! Reads both rows, checks funds and writes both rows back with no
//! coordination at all. Under contention two workers can read the same
//! snapshot and overwrite each other's writes, so updates are lost and the
//! total balance drifts. It exists as the baseline the other strategies are
//! measured against.

use super::{apply_amount, log_attempt, log_success, read_existing, receipt, StrategyKind, TransferStrategy};
use crate::core::LedgerStore;
use crate::types::{TransferRequest, TransferResult};
use std::sync::Arc;

/// Plain read-modify-write transfer with no concurrency control
pub struct UnsynchronizedTransfer {
    ledger: Arc<dyn LedgerStore>,
}

impl UnsynchronizedTransfer {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }
}

impl TransferStrategy for UnsynchronizedTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unsynchronized
    }

    fn transfer(&self, request: &TransferRequest) -> TransferResult {
        log_attempt(self.kind(), request);

        let origin = read_existing(self.ledger.as_ref(), request.origin())?;
        let target = read_existing(self.ledger.as_ref(), request.target())?;

        let (origin_balance, target_balance) =
            apply_amount(self.kind(), &origin, &target, request.amount())?;

        self.ledger.save(&origin.with_balance(origin_balance))?;
        self.ledger.save(&target.with_balance(target_balance))?;

        let receipt = receipt(request, origin_balance, target_balance, 1);
        log_success(self.kind(), &receipt);
        Ok(receipt)
    }
}
