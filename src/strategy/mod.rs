//! Transfer strategy module
//!
//! This module defines the Strategy pattern for the transfer operation. Every
//! strategy moves an amount between two accounts through the same
//! [`TransferStrategy::transfer`] contract, each with its own concurrency
//! control discipline:
//!
//! - **Unsynchronized**: plain reads and writes, no coordination (baseline)
//! - **Serialized**: one strategy-wide critical section
//! - **Pessimistic**: exclusive row holds taken in the store
//! - **Optimistic**: version-checked commit with bounded retry
//! - **Ordered lock**: per-account locks acquired in id order
//! - **CAS loop**: compare-and-swap over in-memory balance cells
//!
//! Strategies are selected at runtime through [`create_strategy`].

use crate::core::{AccountLockRegistry, LedgerStore, RetryPolicy};
use crate::types::{Account, AccountId, TransferError, TransferReceipt, TransferRequest, TransferResult};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub mod cas_loop;
pub mod optimistic;
pub mod ordered_lock;
pub mod pessimistic;
pub mod serialized;
pub mod unsynchronized;

pub use cas_loop::CasLoopTransfer;
pub use optimistic::OptimisticTransfer;
pub use ordered_lock::OrderedLockTransfer;
pub use pessimistic::PessimisticTransfer;
pub use serialized::SerializedTransfer;
pub use unsynchronized::UnsynchronizedTransfer;

/// Transfer strategy trait
///
/// Implementations must be callable from many worker threads at once.
/// Individual failures are returned, never panicked on.
pub trait TransferStrategy: Send + Sync {
    /// Which discipline this strategy implements
    fn kind(&self) -> StrategyKind;

    /// Move `request.amount()` from origin to target
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if either account is missing
    /// - `InsufficientFunds` if the origin balance is below the amount at the
    ///   strategy's authoritative read
    /// - `Conflict` if an optimistic strategy spent its retry budget
    /// - `Aborted` if the store failed underneath
    fn transfer(&self, request: &TransferRequest) -> TransferResult;
}

/// Available concurrency control strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Unsynchronized,
    Serialized,
    Pessimistic,
    Optimistic,
    OrderedLock,
    CasLoop,
}

impl StrategyKind {
    /// Every strategy, in comparison order
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Unsynchronized,
        StrategyKind::Serialized,
        StrategyKind::Pessimistic,
        StrategyKind::Optimistic,
        StrategyKind::OrderedLock,
        StrategyKind::CasLoop,
    ];

    /// Short machine name, as accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Unsynchronized => "unsynchronized",
            StrategyKind::Serialized => "serialized",
            StrategyKind::Pessimistic => "pessimistic",
            StrategyKind::Optimistic => "optimistic",
            StrategyKind::OrderedLock => "ordered-lock",
            StrategyKind::CasLoop => "cas-loop",
        }
    }

    /// Human-readable test name used in reports
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Unsynchronized => "Default Transaction Test",
            StrategyKind::Serialized => "Synchronized Transaction Test",
            StrategyKind::Pessimistic => "Pessimistic Lock Transaction Test",
            StrategyKind::Optimistic => "Optimistic Lock Transaction Test",
            StrategyKind::OrderedLock => "Reentrant Lock Transaction Test",
            StrategyKind::CasLoop => "Atomic Transaction Test",
        }
    }

    /// Whether the strategy keeps the store's total balance conserved
    pub fn conserves_store(self) -> bool {
        !matches!(self, StrategyKind::Unsynchronized | StrategyKind::CasLoop)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collaborators a strategy may need
#[derive(Clone)]
pub struct StrategyContext {
    /// Store every strategy reads and writes through
    pub ledger: Arc<dyn LedgerStore>,
    /// Registry used by the ordered-lock strategy
    pub locks: Arc<AccountLockRegistry>,
    /// Retry budget used by the optimistic strategy
    pub retry: RetryPolicy,
}

impl StrategyContext {
    /// Context with a fresh lock registry and the default retry policy
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            locks: Arc::new(AccountLockRegistry::new()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_locks(mut self, locks: Arc<AccountLockRegistry>) -> Self {
        self.locks = locks;
        self
    }
}

/// Create a transfer strategy of the requested kind
///
/// # Arguments
///
/// * `kind` - The concurrency control discipline to use
/// * `context` - Store, lock registry and retry policy to build it from
///
/// # Returns
///
/// A boxed trait object implementing [`TransferStrategy`]
pub fn create_strategy(kind: StrategyKind, context: &StrategyContext) -> Box<dyn TransferStrategy> {
    let ledger = Arc::clone(&context.ledger);
    match kind {
        StrategyKind::Unsynchronized => Box::new(UnsynchronizedTransfer::new(ledger)),
        StrategyKind::Serialized => Box::new(SerializedTransfer::new(ledger)),
        StrategyKind::Pessimistic => Box::new(PessimisticTransfer::new(ledger)),
        StrategyKind::Optimistic => {
            Box::new(OptimisticTransfer::new(ledger, context.retry.clone()))
        }
        StrategyKind::OrderedLock => {
            Box::new(OrderedLockTransfer::new(ledger, Arc::clone(&context.locks)))
        }
        StrategyKind::CasLoop => Box::new(CasLoopTransfer::new(ledger)),
    }
}

/// Read an account that must exist
pub(crate) fn read_existing(
    ledger: &dyn LedgerStore,
    id: &AccountId,
) -> Result<Account, TransferError> {
    ledger
        .get(id)?
        .ok_or_else(|| TransferError::account_not_found(id))
}

/// Check funds and compute the post-transfer balances
///
/// Returns `(new_origin_balance, new_target_balance)`.
pub(crate) fn apply_amount(
    kind: StrategyKind,
    origin: &Account,
    target: &Account,
    amount: Decimal,
) -> Result<(Decimal, Decimal), TransferError> {
    if origin.balance < amount {
        tracing::warn!(
            strategy = %kind,
            account = %origin.id,
            required = %amount,
            available = %origin.balance,
            "insufficient balance"
        );
        return Err(TransferError::insufficient_funds(
            &origin.id,
            origin.balance,
            amount,
        ));
    }

    let new_origin = origin
        .balance
        .checked_sub(amount)
        .ok_or_else(|| TransferError::aborted(format!("balance underflow on {}", origin.id)))?;
    let new_target = target
        .balance
        .checked_add(amount)
        .ok_or_else(|| TransferError::aborted(format!("balance overflow on {}", target.id)))?;
    Ok((new_origin, new_target))
}

pub(crate) fn log_attempt(kind: StrategyKind, request: &TransferRequest) {
    tracing::debug!(
        strategy = %kind,
        from = %request.origin(),
        to = %request.target(),
        amount = %request.amount(),
        "attempting transfer"
    );
}

pub(crate) fn log_success(kind: StrategyKind, receipt: &TransferReceipt) {
    tracing::debug!(
        strategy = %kind,
        from = %receipt.origin,
        to = %receipt.target,
        origin_balance = %receipt.origin_balance,
        target_balance = %receipt.target_balance,
        attempts = receipt.attempts,
        "transfer successful"
    );
}

/// Build a receipt for a committed transfer
pub(crate) fn receipt(
    request: &TransferRequest,
    origin_balance: Decimal,
    target_balance: Decimal,
    attempts: u32,
) -> TransferReceipt {
    TransferReceipt {
        origin: request.origin().clone(),
        target: request.target().clone(),
        amount: request.amount(),
        origin_balance,
        target_balance,
        attempts,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::MemoryLedger;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    /// Ledger with `abc` and `cbd` opened at the given balances
    pub fn two_accounts(abc: Decimal, cbd: Decimal) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.open_account("abc", abc).unwrap();
        ledger.open_account("cbd", cbd).unwrap();
        ledger
    }
}
