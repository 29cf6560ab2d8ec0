//! I/O module
//!
//! Handles rendering of run reports.
//!
//! # Components
//!
//! - `report_format` - Text blocks and CSV rows for finished runs

pub mod report_format;

pub use report_format::{write_report_text, write_reports_csv, write_reports_text, ReportRow};
