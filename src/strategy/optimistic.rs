//! Optimistic versioned-retry transfer strategy
//!
//! Reads both rows with their versions, computes the new balances and commits
//! both rows in one version-checked write. If another writer committed either
//! row in between, the commit is refused and the whole operation (reads
//! included) is retried after a backoff delay.
//!
//! # Retry Budget
//!
//! Attempts and delays follow [`RetryPolicy`]: by default 15 attempts with
//! delays of 100 ms doubling up to a 2000 ms cap. When the budget is spent the
//! transfer fails with `Conflict`. Insufficient funds and missing accounts are
//! never retried.

use super::{apply_amount, log_attempt, log_success, read_existing, receipt, StrategyKind, TransferStrategy};
use crate::core::{LedgerStore, RetryPolicy, VersionedWrite};
use crate::types::{TransferError, TransferRequest, TransferResult};
use std::sync::Arc;
use std::thread;

/// Transfer strategy using version-checked commits with bounded retry
pub struct OptimisticTransfer {
    ledger: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
}

impl OptimisticTransfer {
    pub fn new(ledger: Arc<dyn LedgerStore>, policy: RetryPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl TransferStrategy for OptimisticTransfer {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    fn transfer(&self, request: &TransferRequest) -> TransferResult {
        log_attempt(self.kind(), request);

        let mut attempt = 1;
        loop {
            let origin = read_existing(self.ledger.as_ref(), request.origin())?;
            let target = read_existing(self.ledger.as_ref(), request.target())?;

            let (origin_balance, target_balance) =
                apply_amount(self.kind(), &origin, &target, request.amount())?;

            let writes = [
                VersionedWrite::from_read(&origin, origin_balance),
                VersionedWrite::from_read(&target, target_balance),
            ];
            if self.ledger.compare_and_save_all(&writes)?.is_some() {
                let receipt = receipt(request, origin_balance, target_balance, attempt);
                log_success(self.kind(), &receipt);
                return Ok(receipt);
            }

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    tracing::debug!(
                        strategy = %self.kind(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "version conflict, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                None => {
                    tracing::warn!(
                        strategy = %self.kind(),
                        from = %request.origin(),
                        to = %request.target(),
                        attempts = attempt,
                        "retry budget exhausted"
                    );
                    return Err(TransferError::conflict(attempt));
                }
            }
        }
    }
}
