//! Transfer Lab CLI
//!
//! Command-line interface for comparing concurrency control strategies on
//! concurrent fund transfers.
//!
//! # Usage
//!
//! ```bash
//! cargo run
//! cargo run -- --strategy all
//! cargo run -- --strategy optimistic,cas-loop --threads 30 --amount 5.00
//! cargo run -- --strategy all --format csv --output report.csv
//! RUST_LOG=debug cargo run -- --strategy unsynchronized --threads 4 --transfers 10
//! ```
//!
//! Each selected strategy runs against accounts reset to the initial
//! balance; one report per strategy goes to stdout (or `--output`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid run configuration, worker panic, output not writable, etc.)

use std::process;
use transfer_lab::{cli, logging};

fn main() {
    // Parse command-line arguments using clap
    let args = cli::parse_args();

    logging::init(args.verbose);

    if let Err(e) = cli::run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
