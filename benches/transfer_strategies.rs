//! Benchmark suite for comparing transfer strategies
//!
//! This benchmark compares the concurrency control strategies using the divan
//! benchmarking framework. Each iteration runs a full concurrent driver run
//! against a freshly seeded ledger.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Workloads
//!
//! - `uncontended` - One worker, so strategies pay only their bookkeeping
//! - `contended` - Eight workers on one account pair
//! - `load_test` - The default run shape (40 workers x 250 transfers)

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use transfer_lab::core::RetryPolicy;
use transfer_lab::{create_strategy, ConcurrentDriver, MemoryLedger, RunConfig, StrategyContext, StrategyKind};

fn main() {
    divan::main();
}

fn run_once(kind: StrategyKind, config: &RunConfig) -> u64 {
    let ledger = Arc::new(MemoryLedger::new());
    ledger.open_account(config.origin.clone(), Decimal::new(1_000_000, 2)).expect("Seeding failed");
    ledger.open_account(config.target.clone(), Decimal::new(1_000_000, 2)).expect("Seeding failed");

    let driver = ConcurrentDriver::new(ledger.clone());
    let retry = RetryPolicy::new(15, Duration::from_micros(50), 2, Duration::from_millis(2));
    let context = StrategyContext::new(ledger).with_retry(retry);
    let strategy = create_strategy(kind, &context);

    driver
        .run(strategy.as_ref(), config)
        .expect("Run failed")
        .successful
}

/// Single worker, 1,000 transfers
#[divan::bench(args = StrategyKind::ALL)]
fn uncontended(kind: StrategyKind) -> u64 {
    let config = RunConfig::new("abc", "cbd", Decimal::ONE, 1, 1_000);
    run_once(kind, &config)
}

/// Eight workers, 1,000 transfers in total
#[divan::bench(args = StrategyKind::ALL)]
fn contended(kind: StrategyKind) -> u64 {
    let config = RunConfig::new("abc", "cbd", Decimal::ONE, 8, 125);
    run_once(kind, &config)
}

/// Default run shape, 10,000 transfers
#[divan::bench(args = StrategyKind::ALL, sample_count = 10)]
fn load_test(kind: StrategyKind) -> u64 {
    run_once(kind, &RunConfig::default())
}
