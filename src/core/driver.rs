//! Concurrent run driver
//!
//! This module provides the [`ConcurrentDriver`], which hammers one transfer
//! strategy from a fixed pool of OS threads and reports what happened.
//!
//! # Run Lifecycle
//!
//! 1. Claim the driver: Idle → Running, or fail fast with `AlreadyRunning`
//! 2. Spawn `threads` named workers inside a thread scope
//! 3. Each worker issues `transfers_per_thread` transfers back to back,
//!    tallying every outcome and never stopping on a failed transfer
//! 4. Join every worker (no timeout)
//! 5. Read final balances from the ledger and build a [`RunReport`]
//! 6. Release the driver: Running → Idle, on every exit path
//!
//! Only structural failures (a worker that panicked or could not be spawned)
//! abort the run.

use crate::core::traits::LedgerStore;
use crate::strategy::{StrategyKind, TransferStrategy};
use crate::types::{outcome_of, AccountId, RunError, TransferOutcome, TransferRequest};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Parameters of one concurrent run
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// Account every transfer debits
    pub origin: AccountId,
    /// Account every transfer credits
    pub target: AccountId,
    /// Amount moved by each transfer
    pub amount: Decimal,
    /// Number of worker threads
    pub threads: usize,
    /// Transfers issued by each worker
    pub transfers_per_thread: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            origin: AccountId::from("abc"),
            target: AccountId::from("cbd"),
            amount: Decimal::new(100, 2),
            threads: 40,
            transfers_per_thread: 250,
        }
    }
}

impl RunConfig {
    /// Create a RunConfig with custom values
    ///
    /// Zero `threads` or `transfers_per_thread` fall back to the defaults
    /// with a warning.
    pub fn new(
        origin: impl Into<AccountId>,
        target: impl Into<AccountId>,
        amount: Decimal,
        threads: usize,
        transfers_per_thread: usize,
    ) -> Self {
        let default = Self::default();

        let threads = if threads == 0 {
            tracing::warn!(
                "Invalid threads ({}), using default ({})",
                threads,
                default.threads
            );
            default.threads
        } else {
            threads
        };

        let transfers_per_thread = if transfers_per_thread == 0 {
            tracing::warn!(
                "Invalid transfers_per_thread ({}), using default ({})",
                transfers_per_thread,
                default.transfers_per_thread
            );
            default.transfers_per_thread
        } else {
            transfers_per_thread
        };

        Self {
            origin: origin.into(),
            target: target.into(),
            amount,
            threads,
            transfers_per_thread,
        }
    }

    /// Total transfers a run with this config attempts
    pub fn attempted(&self) -> u64 {
        (self.threads as u64) * (self.transfers_per_thread as u64)
    }

    /// Successes a conserving strategy must reach when the origin starts at
    /// `initial_origin` and nothing else touches the pair
    pub fn expected_successes(&self, initial_origin: Decimal) -> u64 {
        if self.amount <= Decimal::ZERO || initial_origin <= Decimal::ZERO {
            return 0;
        }
        let affordable = (initial_origin / self.amount).floor();
        affordable
            .to_u64()
            .unwrap_or(u64::MAX)
            .min(self.attempted())
    }
}

/// Failed attempts, by outcome
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureTally {
    pub insufficient_funds: u64,
    pub account_not_found: u64,
    pub conflict: u64,
    pub aborted: u64,
    pub invalid_request: u64,
}

impl FailureTally {
    fn record(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Success => {}
            TransferOutcome::InsufficientFunds => self.insufficient_funds += 1,
            TransferOutcome::AccountNotFound => self.account_not_found += 1,
            TransferOutcome::Conflict => self.conflict += 1,
            TransferOutcome::Aborted => self.aborted += 1,
            TransferOutcome::InvalidRequest => self.invalid_request += 1,
        }
    }

    fn merge(&mut self, other: &FailureTally) {
        self.insufficient_funds += other.insufficient_funds;
        self.account_not_found += other.account_not_found;
        self.conflict += other.conflict;
        self.aborted += other.aborted;
        self.invalid_request += other.invalid_request;
    }

    /// Total failed attempts
    pub fn total(&self) -> u64 {
        self.insufficient_funds
            + self.account_not_found
            + self.conflict
            + self.aborted
            + self.invalid_request
    }
}

/// Aggregate outcome of one run
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Identity of the run, unique per driver
    pub run_id: u64,
    pub strategy: StrategyKind,
    pub origin: AccountId,
    pub target: AccountId,
    /// Transfers issued across all workers
    pub attempted: u64,
    /// Transfers that returned success
    pub successful: u64,
    pub failures: FailureTally,
    /// Origin balance read from the ledger after all workers finished
    pub origin_balance: Option<Decimal>,
    /// Target balance read from the ledger after all workers finished
    pub target_balance: Option<Decimal>,
    /// Wall time from first spawn to last join
    pub elapsed: Duration,
}

impl RunReport {
    /// Sum of both final balances, if both accounts were found
    pub fn final_total(&self) -> Option<Decimal> {
        Some(self.origin_balance? + self.target_balance?)
    }

    /// Whether the two accounts still hold `initial_total` between them
    pub fn conserved(&self, initial_total: Decimal) -> Option<bool> {
        self.final_total().map(|total| total == initial_total)
    }

    /// Successful transfers per second
    pub fn throughput(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.successful as f64 / seconds
    }
}

/// Lifecycle state of a driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        if value == RunState::Running as u8 {
            RunState::Running
        } else {
            RunState::Idle
        }
    }
}

/// Token proving the holder owns the driver for one run
///
/// Dropping it returns the driver to Idle.
#[derive(Debug)]
pub struct RunGuard<'a> {
    driver: &'a ConcurrentDriver,
    run_id: u64,
}

impl RunGuard<'_> {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.driver
            .state
            .store(RunState::Idle as u8, Ordering::Release);
        tracing::debug!(run_id = self.run_id, "driver idle");
    }
}

/// Drives concurrent transfer runs against a ledger
pub struct ConcurrentDriver {
    ledger: Arc<dyn LedgerStore>,
    state: AtomicU8,
    active_run: AtomicU64,
    last_run: AtomicU64,
}

impl std::fmt::Debug for ConcurrentDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentDriver")
            .field("state", &self.state())
            .field("last_run", &self.last_run.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl ConcurrentDriver {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger,
            state: AtomicU8::new(RunState::Idle as u8),
            active_run: AtomicU64::new(0),
            last_run: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Claim the driver for a run
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` without waiting if another run holds it.
    pub fn begin(&self) -> Result<RunGuard<'_>, RunError> {
        if self
            .state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(RunError::AlreadyRunning {
                active_run: self.active_run.load(Ordering::Acquire),
            });
        }

        let run_id = self.last_run.fetch_add(1, Ordering::AcqRel) + 1;
        self.active_run.store(run_id, Ordering::Release);
        Ok(RunGuard {
            driver: self,
            run_id,
        })
    }

    /// Run `strategy` from `config.threads` workers and report the outcome
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if another run is in progress
    /// - `InvalidConfig` if the configured transfer can never be valid
    /// - `WorkerPanicked` / `Spawn` if the pool could not run to completion
    pub fn run(
        &self,
        strategy: &dyn TransferStrategy,
        config: &RunConfig,
    ) -> Result<RunReport, RunError> {
        let guard = self.begin()?;
        let request =
            TransferRequest::new(config.origin.clone(), config.target.clone(), config.amount)
                .map_err(RunError::InvalidConfig)?;

        tracing::info!(
            run_id = guard.run_id(),
            strategy = %strategy.kind(),
            threads = config.threads,
            transfers_per_thread = config.transfers_per_thread,
            amount = %config.amount,
            "starting run"
        );

        let started = Instant::now();
        let tallies = self.run_workers(strategy, &request, config)?;
        let elapsed = started.elapsed();

        let mut successful = 0;
        let mut failures = FailureTally::default();
        for tally in &tallies {
            successful += tally.successful;
            failures.merge(&tally.failures);
        }

        let origin_balance = self.ledger.get(&config.origin)?.map(|a| a.balance);
        let target_balance = self.ledger.get(&config.target)?.map(|a| a.balance);

        let report = RunReport {
            run_id: guard.run_id(),
            strategy: strategy.kind(),
            origin: config.origin.clone(),
            target: config.target.clone(),
            attempted: config.attempted(),
            successful,
            failures,
            origin_balance,
            target_balance,
            elapsed,
        };

        tracing::info!(
            run_id = report.run_id,
            strategy = %report.strategy,
            attempted = report.attempted,
            successful = report.successful,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run completed"
        );
        Ok(report)
    }

    fn run_workers(
        &self,
        strategy: &dyn TransferStrategy,
        request: &TransferRequest,
        config: &RunConfig,
    ) -> Result<Vec<WorkerTally>, RunError> {
        let transfers = config.transfers_per_thread;

        let results: Vec<Result<WorkerTally, RunError>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(config.threads);
            let mut spawn_error = None;

            for worker in 0..config.threads {
                let spawned = thread::Builder::new()
                    .name(format!("transfer-worker-{worker}"))
                    .spawn_scoped(scope, move || run_worker(worker, strategy, request, transfers));
                match spawned {
                    Ok(handle) => handles.push((worker, handle)),
                    Err(source) => {
                        spawn_error = Some(RunError::Spawn { worker, source });
                        break;
                    }
                }
            }

            let mut results: Vec<Result<WorkerTally, RunError>> = handles
                .into_iter()
                .map(|(worker, handle)| {
                    handle.join().map_err(|payload| RunError::WorkerPanicked {
                        worker,
                        message: panic_message(payload.as_ref()),
                    })
                })
                .collect();
            if let Some(error) = spawn_error {
                results.push(Err(error));
            }
            results
        });

        results.into_iter().collect()
    }
}

/// Per-worker counts, merged after join
#[derive(Debug, Default)]
struct WorkerTally {
    successful: u64,
    failures: FailureTally,
}

fn run_worker(
    worker: usize,
    strategy: &dyn TransferStrategy,
    request: &TransferRequest,
    transfers: usize,
) -> WorkerTally {
    let mut tally = WorkerTally::default();
    for _ in 0..transfers {
        let result = strategy.transfer(request);
        match outcome_of(&result) {
            TransferOutcome::Success => tally.successful += 1,
            outcome => {
                if let Err(e) = &result {
                    tracing::debug!(worker, strategy = %strategy.kind(), error = %e, "transfer failed");
                }
                tally.failures.record(outcome);
            }
        }
    }
    tally
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
