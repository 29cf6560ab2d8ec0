//! Account-related types for the transfer lab
//!
//! This module defines the account identifier, the stored account row and the
//! fixed-point helpers shared by every strategy.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Number of fractional digits carried by every balance and amount
pub const MONEY_SCALE: u32 = 2;

/// Account identifier
///
/// A string key. Ordering is lexicographic on the underlying string, which is
/// the total order used whenever two accounts must be locked together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        AccountId(id)
    }
}

/// Account row as held by a ledger store
///
/// Strategies receive copies of this row; the store owns the authoritative
/// value. `version` is bumped by the store on every committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The account identifier
    pub id: AccountId,

    /// Current balance, never negative
    pub balance: Decimal,

    /// Monotonic write counter used for optimistic checks
    pub version: u64,
}

impl Account {
    /// Create a fresh, never-written account row
    pub fn new(id: AccountId, balance: Decimal) -> Self {
        Account {
            id,
            balance: normalize(balance),
            version: 0,
        }
    }

    /// Copy of this row with a different balance, version untouched
    pub fn with_balance(&self, balance: Decimal) -> Self {
        Account {
            id: self.id.clone(),
            balance: normalize(balance),
            version: self.version,
        }
    }
}

/// Rescale a decimal to [`MONEY_SCALE`] fractional digits
pub fn normalize(value: Decimal) -> Decimal {
    let mut value = value.round_dp(MONEY_SCALE);
    value.rescale(MONEY_SCALE);
    value
}

/// Whether `value` carries no more than [`MONEY_SCALE`] fractional digits
pub fn fits_money_scale(value: Decimal) -> bool {
    value.round_dp(MONEY_SCALE) == value
}

/// Convert a balance to an integer count of minor units (cents)
///
/// Returns `None` if the value does not fit an `i64`.
pub fn to_minor_units(value: Decimal) -> Option<i64> {
    let scaled = normalize(value);
    i64::try_from(scaled.mantissa()).ok()
}

/// Convert a count of minor units back to a balance
pub fn from_minor_units(units: i64) -> Decimal {
    Decimal::new(units, MONEY_SCALE)
}
