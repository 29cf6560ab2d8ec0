// CLI module
// Command-line interface, argument parsing and command execution

mod args;
mod runner;

pub use args::{CliArgs, OutputFormat, StrategyType};
pub use runner::run;

use clap::Parser;

/// Parse command-line arguments using clap
///
/// If parsing fails (e.g., invalid arguments or --help flag), clap will
/// display an error message or help text and exit the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
