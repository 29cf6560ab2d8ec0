//! Mutex-serialized transfer strategy
//!
//! Every transfer, whatever accounts it touches, runs inside one
//! strategy-wide critical section. Correct, but parallelism collapses to a
//! single worker.

use super::{apply_amount, log_attempt, log_success, read_existing, receipt, StrategyKind, TransferStrategy};
use crate::core::LedgerStore;
use crate::types::{TransferRequest, TransferResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Transfer strategy that serializes all transfers behind one mutex
pub struct SerializedTransfer {
    ledger: Arc<dyn LedgerStore>,
    section: Mutex<()>,
}

impl SerializedTransfer {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            section: Mutex::new(()),
        }
    }
}

impl TransferStrategy for SerializedTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Serialized
    }

    fn transfer(&self, request: &TransferRequest) -> TransferResult {
        log_attempt(self.kind(), request);

        let _section = self.section.lock();

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
