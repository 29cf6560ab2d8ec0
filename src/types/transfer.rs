//! Transfer request, receipt and outcome types
//!
//! A [`TransferRequest`] is built once per call and validated up front, so
//! strategies only ever see a positive, correctly scaled amount moving between
//! two distinct accounts.

use super::account::{fits_money_scale, normalize, AccountId};
use super::error::TransferError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Immutable description of one transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    origin: AccountId,
    target: AccountId,
    amount: Decimal,
}

impl TransferRequest {
    /// Validate and build a transfer request
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidRequest`] if:
    /// - `amount` is zero or negative
    /// - `amount` has more than two fractional digits
    /// - `origin` and `target` name the same account
    pub fn new(
        origin: impl Into<AccountId>,
        target: impl Into<AccountId>,
        amount: Decimal,
    ) -> Result<Self, TransferError> {
        let origin = origin.into();
        let target = target.into();

        if amount <= Decimal::ZERO {
            return Err(TransferError::invalid_request(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if !fits_money_scale(amount) {
            return Err(TransferError::invalid_request(format!(
                "amount {amount} has more than two fractional digits"
            )));
        }
        if origin == target {
            return Err(TransferError::invalid_request(format!(
                "origin and target are the same account '{origin}'"
            )));
        }

        Ok(TransferRequest {
            origin,
            target,
            amount: normalize(amount),
        })
    }

    pub fn origin(&self) -> &AccountId {
        &self.origin
    }

    pub fn target(&self) -> &AccountId {
        &self.target
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Both account ids, lowest first
    ///
    /// Lock acquisition always follows this order regardless of direction.
    pub fn ordered_ids(&self) -> (&AccountId, &AccountId) {
        if self.origin <= self.target {
            (&self.origin, &self.target)
        } else {
            (&self.target, &self.origin)
        }
    }
}

/// Successful transfer, with the balances written by it
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub origin: AccountId,
    pub target: AccountId,
    pub amount: Decimal,
    /// Origin balance after the transfer
    pub origin_balance: Decimal,
    /// Target balance after the transfer
    pub target_balance: Decimal,
    /// Number of attempts it took to commit (1 unless the strategy retries)
    pub attempts: u32,
}

/// Outcome tag of a single transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Success,
    InsufficientFunds,
    AccountNotFound,
    Conflict,
    Aborted,
    InvalidRequest,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferOutcome::Success => "success",
            TransferOutcome::InsufficientFunds => "insufficient funds",
            TransferOutcome::AccountNotFound => "account not found",
            TransferOutcome::Conflict => "conflict",
            TransferOutcome::Aborted => "aborted",
            TransferOutcome::InvalidRequest => "invalid request",
        };
        f.write_str(name)
    }
}

/// Result of one transfer call
pub type TransferResult = Result<TransferReceipt, TransferError>;

/// Map a transfer result to its outcome tag
pub fn outcome_of(result: &TransferResult) -> TransferOutcome {
    match result {
        Ok(_) => TransferOutcome::Success,
        Err(e) => e.outcome(),
    }
}
