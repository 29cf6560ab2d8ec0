//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account identifiers, rows and money helpers
//! - `transfer`: Transfer requests, receipts and outcome tags
//! - `error`: Error types for ledger, transfer and run failures

pub mod account;
pub mod error;
pub mod transfer;

pub use account::{Account, AccountId, MONEY_SCALE};
pub use error::{LedgerError, RunError, TransferError};
pub use transfer::{outcome_of, TransferOutcome, TransferReceipt, TransferRequest, TransferResult};
