//! Core concurrency components
//!
//! This module contains the pieces every transfer strategy is built from:
//! - `traits` - The `LedgerStore` abstraction and the exclusive hold guard
//! - `ledger` - In-memory ledger with row-level holds and versioned writes
//! - `lock_registry` - Lazily created per-account locks
//! - `retry` - Bounded exponential backoff for optimistic commits
//! - `driver` - Runs one strategy from many worker threads and reports

pub mod driver;
pub mod ledger;
pub mod lock_registry;
pub mod retry;
pub mod traits;

pub use driver::{ConcurrentDriver, FailureTally, RunConfig, RunGuard, RunReport, RunState};
pub use ledger::MemoryLedger;
pub use lock_registry::{AccountLock, AccountLockRegistry};
pub use retry::RetryPolicy;
pub use traits::{ExclusiveHold, LedgerStore, VersionedWrite};
