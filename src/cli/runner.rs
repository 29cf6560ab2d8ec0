//! Command execution
//!
//! Runs every selected strategy against one shared in-memory ledger and
//! writes the reports. Before each strategy the two accounts are reset to
//! the initial balance, so runs never see each other's leftovers.

use super::args::{CliArgs, OutputFormat};
use crate::core::{ConcurrentDriver, LedgerStore, MemoryLedger, RunConfig, RunReport};
use crate::io::{write_reports_csv, write_reports_text};
use crate::strategy::{create_strategy, StrategyContext, StrategyKind};
use crate::types::account::fits_money_scale;
use crate::types::{AccountId, RunError, TransferError};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

/// Run the strategies named on the command line and write their reports
///
/// # Errors
///
/// Returns the first run-level error; reports of strategies that already
/// finished are not written in that case. An initial balance that is
/// negative or has more than two fractional digits is rejected before any
/// strategy runs.
pub fn run(args: &CliArgs) -> Result<(), RunError> {
    validate_initial_balance(args.initial_balance)?;
    let config = args.to_run_config();
    let kinds = args.strategy_kinds();

    let ledger = Arc::new(MemoryLedger::new());
    let store: Arc<dyn LedgerStore> = ledger.clone();
    let driver = ConcurrentDriver::new(Arc::clone(&store));
    let context = StrategyContext::new(store).with_retry(args.to_retry_policy());

    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let report = run_one(&driver, &ledger, &context, kind, &config, args.initial_balance)?;
        reports.push(report);
    }

    let initial_total = args.initial_balance * Decimal::TWO;
    match &args.output {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            write_reports(&reports, initial_total, args.format, &mut file)?;
            file.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_reports(&reports, initial_total, args.format, &mut handle)?;
        }
    }
    Ok(())
}

fn validate_initial_balance(balance: Decimal) -> Result<(), RunError> {
    if balance < Decimal::ZERO {
        return Err(RunError::InvalidConfig(TransferError::invalid_request(format!(
            "initial balance must not be negative, got {balance}"
        ))));
    }
    if !fits_money_scale(balance) {
        return Err(RunError::InvalidConfig(TransferError::invalid_request(format!(
            "initial balance {balance} has more than two fractional digits"
        ))));
    }
    Ok(())
}

fn run_one(
    driver: &ConcurrentDriver,
    ledger: &MemoryLedger,
    context: &StrategyContext,
    kind: StrategyKind,
    config: &RunConfig,
    initial_balance: Decimal,
) -> Result<RunReport, RunError> {
    reset_account(ledger, &config.origin, initial_balance)?;
    reset_account(ledger, &config.target, initial_balance)?;

    // Fresh strategy per run so CAS cells and lock maps start empty
    let strategy = create_strategy(kind, context);
    let report = driver.run(strategy.as_ref(), config)?;

    if !kind.conserves_store() && report.conserved(initial_balance * Decimal::TWO) == Some(false) {
        tracing::info!(strategy = %kind, "store total drifted, as expected for this strategy");
    }
    Ok(report)
}

fn reset_account(ledger: &MemoryLedger, id: &AccountId, balance: Decimal) -> Result<(), RunError> {
    if !ledger.open_account(id.clone(), balance)? {
        ledger.set_balance(id, balance)?;
    }
    Ok(())
}

fn write_reports(
    reports: &[RunReport],
    initial_total: Decimal,
    format: OutputFormat,
    output: &mut dyn Write,
) -> Result<(), RunError> {
    match format {
        OutputFormat::Text => write_reports_text(reports, initial_total, output)?,
        OutputFormat::Csv => write_reports_csv(reports, initial_total, output)?,
    }
    Ok(())
}
