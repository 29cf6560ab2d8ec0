//! Run report output
//!
//! This module renders [`RunReport`]s for humans and for spreadsheets:
//! - Text blocks, one per run, in the load-test summary layout
//! - CSV rows with one fixed header, one row per run
//!
//! Both writers take the initial total so they can state whether the two
//! accounts still hold what they started with.

use crate::core::RunReport;
use crate::strategy::StrategyKind;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{self, Write};

/// Flat CSV row for one run report
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ReportRow {
    pub strategy: StrategyKind,
    pub attempted: u64,
    pub successful: u64,
    pub insufficient_funds: u64,
    pub account_not_found: u64,
    pub conflict: u64,
    pub aborted: u64,
    pub invalid_request: u64,
    pub origin_balance: Option<String>,
    pub target_balance: Option<String>,
    pub conserved: Option<bool>,
    pub elapsed_ms: u64,
}

impl ReportRow {
    pub fn from_report(report: &RunReport, initial_total: Decimal) -> Self {
        Self {
            strategy: report.strategy,
            attempted: report.attempted,
            successful: report.successful,
            insufficient_funds: report.failures.insufficient_funds,
            account_not_found: report.failures.account_not_found,
            conflict: report.failures.conflict,
            aborted: report.failures.aborted,
            invalid_request: report.failures.invalid_request,
            origin_balance: report.origin_balance.map(format_money),
            target_balance: report.target_balance.map(format_money),
            conserved: report.conserved(initial_total),
            elapsed_ms: report.elapsed.as_millis() as u64,
        }
    }
}

fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn format_balance(balance: Option<Decimal>) -> String {
    balance.map_or_else(|| "not found".to_string(), format_money)
}

/// Write one report as a text block
///
/// # Arguments
///
/// * `report` - The finished run
/// * `initial_total` - Combined balance of both accounts before the run
/// * `output` - Where to write the block
pub fn write_report_text(
    report: &RunReport,
    initial_total: Decimal,
    output: &mut dyn Write,
) -> io::Result<()> {
    writeln!(output, "{} Completed.", report.strategy.label())?;
    writeln!(output, "Total Transfers Attempted: {}", report.attempted)?;
    writeln!(
        output,
        "Total Transfers (Successfully Recorded): {}",
        report.successful
    )?;
    writeln!(
        output,
        "Final Balance of Account {}: {}",
        report.origin,
        format_balance(report.origin_balance)
    )?;
    writeln!(
        output,
        "Final Balance of Account {}: {}",
        report.target,
        format_balance(report.target_balance)
    )?;

    let failures = &report.failures;
    writeln!(
        output,
        "Failed Transfers: {} (insufficient funds: {}, account not found: {}, conflict: {}, aborted: {}, invalid request: {})",
        failures.total(),
        failures.insufficient_funds,
        failures.account_not_found,
        failures.conflict,
        failures.aborted,
        failures.invalid_request
    )?;
    writeln!(output, "Elapsed: {} ms", report.elapsed.as_millis())?;

    let verdict = match report.conserved(initial_total) {
        Some(true) => "yes".to_string(),
        Some(false) => match report.final_total() {
            Some(total) => format!("NO (expected {}, found {})", format_money(initial_total), format_money(total)),
            None => "NO".to_string(),
        },
        None => "unknown (account missing)".to_string(),
    };
    writeln!(output, "Balance Conserved: {}", verdict)?;
    Ok(())
}

/// Write several reports as text blocks separated by blank lines
pub fn write_reports_text(
    reports: &[RunReport],
    initial_total: Decimal,
    output: &mut dyn Write,
) -> io::Result<()> {
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            writeln!(output)?;
        }
        write_report_text(report, initial_total, output)?;
    }
    output.flush()
}

/// Write reports in CSV format
///
/// The header is always written, even with no reports.
pub fn write_reports_csv(
    reports: &[RunReport],
    initial_total: Decimal,
    output: &mut dyn Write,
) -> Result<(), csv::Error> {
    use csv::WriterBuilder;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);

    writer.write_record([
        "strategy",
        "attempted",
        "successful",
        "insufficient_funds",
        "account_not_found",
        "conflict",
        "aborted",
        "invalid_request",
        "origin_balance",
        "target_balance",
        "conserved",
        "elapsed_ms",
    ])?;

    for report in reports {
        writer.serialize(ReportRow::from_report(report, initial_total))?;
    }

    writer.flush()?;
    Ok(())
}
