use crate::core::{RetryPolicy, RunConfig};
use crate::strategy::StrategyKind;
use clap::{ArgAction, Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Compare concurrency control strategies on concurrent fund transfers
#[derive(Parser, Debug)]
#[command(name = "transfer-lab")]
#[command(
    about = "Compare concurrency control strategies on concurrent fund transfers",
    long_about = None
)]
pub struct CliArgs {
    /// Strategies to run, in order
    #[arg(
        long = "strategy",
        short = 's',
        value_name = "KIND",
        value_delimiter = ',',
        default_value = "pessimistic",
        help = "Strategies to run, comma separated, or 'all'"
    )]
    pub strategies: Vec<StrategyType>,

    /// Number of worker threads per run
    #[arg(
        long = "threads",
        value_name = "N",
        default_value_t = 40,
        help = "Worker threads per run"
    )]
    pub threads: usize,

    /// Transfers issued by each worker
    #[arg(
        long = "transfers",
        value_name = "N",
        default_value_t = 250,
        help = "Transfers issued by each worker"
    )]
    pub transfers: usize,

    /// Amount moved by every transfer
    #[arg(long = "amount", value_name = "DEC", default_value = "1.00")]
    pub amount: Decimal,

    /// Balance both accounts are reset to before each strategy runs
    #[arg(long = "initial-balance", value_name = "DEC", default_value = "10000.00")]
    pub initial_balance: Decimal,

    /// Account every transfer debits
    #[arg(long = "from", value_name = "ID", default_value = "abc")]
    pub from: String,

    /// Account every transfer credits
    #[arg(long = "to", value_name = "ID", default_value = "cbd")]
    pub to: String,

    /// Report format
    #[arg(long = "format", value_name = "FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Optimistic strategy: total commit attempts per transfer
    #[arg(long = "max-attempts", value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Optimistic strategy: delay after the first conflict
    #[arg(long = "initial-delay-ms", value_name = "MS")]
    pub initial_delay_ms: Option<u64>,

    /// Optimistic strategy: backoff growth factor
    #[arg(long = "multiplier", value_name = "N")]
    pub multiplier: Option<u32>,

    /// Optimistic strategy: cap on any single delay
    #[arg(long = "max-delay-ms", value_name = "MS")]
    pub max_delay_ms: Option<u64>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

/// Strategy names accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Unsynchronized,
    Serialized,
    Pessimistic,
    Optimistic,
    OrderedLock,
    CasLoop,
    All,
}

impl StrategyType {
    /// Strategy kinds this name stands for
    pub fn kinds(self) -> Vec<StrategyKind> {
        match self {
            StrategyType::Unsynchronized => vec![StrategyKind::Unsynchronized],
            StrategyType::Serialized => vec![StrategyKind::Serialized],
            StrategyType::Pessimistic => vec![StrategyKind::Pessimistic],
            StrategyType::Optimistic => vec![StrategyKind::Optimistic],
            StrategyType::OrderedLock => vec![StrategyKind::OrderedLock],
            StrategyType::CasLoop => vec![StrategyKind::CasLoop],
            StrategyType::All => StrategyKind::ALL.to_vec(),
        }
    }
}

/// Report formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
}

impl CliArgs {
    /// Strategy kinds to run, in command-line order, without repeats
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        let mut kinds = Vec::new();
        for kind in self.strategies.iter().flat_map(|s| s.kinds()) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Create a RunConfig from CLI arguments
    ///
    /// Zero counts fall back to the defaults with a warning.
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig::new(
            self.from.as_str(),
            self.to.as_str(),
            self.amount,
            self.threads,
            self.transfers,
        )
    }

    /// Create a RetryPolicy from CLI arguments
    ///
    /// Options left unset keep their default values.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        if self.max_attempts.is_none()
            && self.initial_delay_ms.is_none()
            && self.multiplier.is_none()
            && self.max_delay_ms.is_none()
        {
            return RetryPolicy::default();
        }

        let default = RetryPolicy::default();
        RetryPolicy::new(
            self.max_attempts.unwrap_or(default.max_attempts),
            self.initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.initial_delay),
            self.multiplier.unwrap_or(default.multiplier),
            self.max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.max_delay),
        )
    }
}
