//! Transfer Lab Library
//! # Overview
//!
//! This library moves money between two ledger accounts from many threads at
//! once, through interchangeable concurrency control strategies, and reports
//! whether each strategy kept the books balanced.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (AccountId, Account, TransferRequest, errors)
//! - [`core`] - Shared machinery:
//!   - [`core::traits`] - The `LedgerStore` abstraction
//!   - [`core::ledger`] - In-memory ledger with row holds and versioned writes
//!   - [`core::lock_registry`] - Lazily created per-account locks
//!   - [`core::retry`] - Bounded exponential backoff
//!   - [`core::driver`] - Concurrent run driver and run reports
//! - [`strategy`] - The transfer strategies
//! - [`io`] - Report rendering (text and CSV)
//! - [`cli`] - CLI arguments parsing and command execution
//! - [`logging`] - Subscriber setup for the binary
//!
//! # Strategies
//!
//! - **Unsynchronized**: no coordination; loses updates under contention
//! - **Serialized**: one critical section around every transfer
//! - **Pessimistic**: exclusive row holds, taken in account id order
//! - **Optimistic**: version-checked two-row commit with bounded retry
//! - **Ordered lock**: per-account reentrant locks, taken in account id order
//! - **CAS loop**: compare-and-swap over in-memory balance cells
//!
//! # Invariants
//!
//! For the conserving strategies, at quiescence:
//! - the sum of both balances equals what it was before the run
//! - no balance is negative
//! - `successful <= attempted`

pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use crate::core::{ConcurrentDriver, MemoryLedger, RunConfig, RunReport};
pub use io::{write_reports_csv, write_reports_text};
pub use strategy::{create_strategy, StrategyContext, StrategyKind, TransferStrategy};
pub use types::{
    Account, AccountId, LedgerError, RunError, TransferError, TransferOutcome, TransferRequest,
};
