//! Error types for the transfer lab
//!
//! Errors come in three layers:
//!
//! - **Ledger Errors**: a store operation could not be carried out
//! - **Transfer Errors**: one transfer attempt failed; the worker loop tallies
//!   these and keeps going
//! - **Run Errors**: a whole concurrent run could not start or complete

use super::account::AccountId;
use super::transfer::TransferOutcome;
use rust_decimal::Decimal;
use thiserror::Error;

/// Error raised by a ledger store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No row exists for the account
    #[error("Account not found: {account}")]
    AccountNotFound {
        /// The missing account id
        account: AccountId,
    },

    /// Release of an exclusive hold that nobody holds
    #[error("Account {account} is not exclusively held")]
    NotHeld {
        /// The account whose hold was released twice or never taken
        account: AccountId,
    },

    /// A multi-row write named the same row twice
    #[error("Account {account} appears more than once in a single commit")]
    DuplicateWrite {
        /// The repeated account id
        account: AccountId,
    },

    /// A row was seeded or overwritten with a balance below zero
    #[error("Negative balance {balance} for account {account}")]
    NegativeBalance {
        /// The account being written
        account: AccountId,
        /// The rejected balance
        balance: Decimal,
    },
}

impl LedgerError {
    pub fn account_not_found(account: &AccountId) -> Self {
        LedgerError::AccountNotFound {
            account: account.clone(),
        }
    }

    pub fn not_held(account: &AccountId) -> Self {
        LedgerError::NotHeld {
            account: account.clone(),
        }
    }

    pub fn duplicate_write(account: &AccountId) -> Self {
        LedgerError::DuplicateWrite {
            account: account.clone(),
        }
    }

    pub fn negative_balance(account: &AccountId, balance: Decimal) -> Self {
        LedgerError::NegativeBalance {
            account: account.clone(),
            balance,
        }
    }
}

/// Error for a single transfer attempt
///
/// None of these are fatal to the worker issuing the transfer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    /// The request was malformed and never reached the store
    #[error("Invalid transfer request: {reason}")]
    InvalidRequest {
        /// What was wrong with it
        reason: String,
    },

    /// Origin or target account does not exist
    #[error("Account not found: {account}")]
    AccountNotFound {
        /// The missing account id
        account: AccountId,
    },

    /// Origin balance is below the requested amount
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Origin account id
        account: AccountId,
        /// Balance seen at the authoritative read
        available: Decimal,
        /// Requested transfer amount
        requested: Decimal,
    },

    /// Optimistic commit kept losing to concurrent writers
    #[error("Transfer conflicted on every one of {attempts} attempts")]
    Conflict {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The transfer was interrupted before it could commit
    #[error("Transfer aborted: {reason}")]
    Aborted {
        /// Why it was abandoned
        reason: String,
    },

    /// The ledger store failed underneath the strategy
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for TransferError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::AccountNotFound { account } => TransferError::AccountNotFound { account },
            other => TransferError::Ledger(other),
        }
    }
}

impl TransferError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        TransferError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn account_not_found(account: &AccountId) -> Self {
        TransferError::AccountNotFound {
            account: account.clone(),
        }
    }

    pub fn insufficient_funds(account: &AccountId, available: Decimal, requested: Decimal) -> Self {
        TransferError::InsufficientFunds {
            account: account.clone(),
            available,
            requested,
        }
    }

    pub fn conflict(attempts: u32) -> Self {
        TransferError::Conflict { attempts }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        TransferError::Aborted {
            reason: reason.into(),
        }
    }

    /// Outcome tag reported for this error
    ///
    /// Store failures other than a missing account count as aborted attempts.
    pub fn outcome(&self) -> TransferOutcome {
        match self {
            TransferError::InvalidRequest { .. } => TransferOutcome::InvalidRequest,
            TransferError::AccountNotFound { .. } => TransferOutcome::AccountNotFound,
            TransferError::InsufficientFunds { .. } => TransferOutcome::InsufficientFunds,
            TransferError::Conflict { .. } => TransferOutcome::Conflict,
            TransferError::Aborted { .. } | TransferError::Ledger(_) => TransferOutcome::Aborted,
        }
    }
}

/// Error for a whole concurrent run
#[derive(Debug, Error)]
pub enum RunError {
    /// Another run holds the driver
    #[error("A test run is already in progress (run {active_run})")]
    AlreadyRunning {
        /// Id of the run currently holding the driver
        active_run: u64,
    },

    /// The run's transfer request can never succeed
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(#[source] TransferError),

    /// A worker thread panicked; the run's counts are incomplete
    #[error("Worker {worker} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker in the pool
        worker: usize,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A worker thread could not be started
    #[error("Failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing run output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a CSV report failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Seeding or reading the ledger around a run failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl RunError {
    /// Outcome tag for run-level errors, mirroring the transfer tags
    pub fn outcome(&self) -> TransferOutcome {
        match self {
            RunError::AlreadyRunning { .. } => TransferOutcome::Conflict,
            _ => TransferOutcome::Aborted,
        }
    }
}
