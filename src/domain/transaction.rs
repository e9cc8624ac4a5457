//! Core chain-connector domain types.
//!
//! Defines the canonical, provider-agnostic transaction representation and
//! the amount conversions between chain base units and decimal main units.
//!
//! Exposes two API surfaces:
//! - Rich types (Decimal, DateTime) for connector-internal logic
//! - Lightweight String aliases for the ports/adapters boundary

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// Lightweight wallet identifier used at the ports boundary.
pub type WalletId = String;

/// Lightweight on-chain address used at the ports boundary.
pub type Address = String;

/// Lightweight on-chain transaction hash used at the ports boundary.
pub type TxHash = String;

/// Sentinel for fields the provider omitted or sent in an unparseable form.
pub const UNKNOWN: &str = "unknown";

// ────────────────────────────────────────────
// Enums shared across domain and ports
// ────────────────────────────────────────────

/// Lifecycle status of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

// ────────────────────────────────────────────
// Canonical transaction shape
// ────────────────────────────────────────────

/// Canonical, provider-agnostic view of one on-chain transaction.
///
/// Produced fresh on every poll by the normalizer; never mutated. Fields the
/// provider could not supply carry sentinel values ([`UNKNOWN`], zero, epoch)
/// so one malformed record never aborts a whole page.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    /// On-chain transaction hash.
    pub hash: TxHash,
    /// Origin address.
    pub from: Address,
    /// Destination address.
    pub to: Address,
    /// Amount in decimal main units.
    pub amount: Decimal,
    /// On-chain timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the provider reports the transaction as successful.
    pub succeeded: bool,
}

// ────────────────────────────────────────────
// Amount conversion
// ────────────────────────────────────────────

/// Convert a base-unit integer amount into decimal main units.
///
/// Degrades to zero when the raw value does not fit the decimal
/// representation; callers treat zero as "nothing observed".
pub fn from_base_units(raw: u128, decimals: u32) -> Decimal {
    match i128::try_from(raw) {
        Ok(v) => Decimal::try_from_i128_with_scale(v, decimals).unwrap_or(Decimal::ZERO),
        Err(_) => Decimal::ZERO,
    }
}

/// Convert a decimal main-unit amount into base units.
///
/// Returns `None` for negative amounts or amounts that cannot be represented
/// exactly at the chain's precision.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Option<u128> {
    if amount.is_sign_negative() {
        return None;
    }
    let mut scaled = amount;
    scaled.rescale(decimals);
    // rescale clamps the scale when the mantissa would overflow
    if scaled.scale() != decimals {
        return None;
    }
    u128::try_from(scaled.mantissa()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units(250_000_000, 8), dec!(2.5));
        assert_eq!(from_base_units(1, 6), dec!(0.000001));
        assert_eq!(from_base_units(0, 8), Decimal::ZERO);
    }

    #[test]
    fn test_from_base_units_overflow_degrades_to_zero() {
        assert_eq!(from_base_units(u128::MAX, 8), Decimal::ZERO);
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec!(2.5), 8), Some(250_000_000));
        assert_eq!(to_base_units(dec!(10), 6), Some(10_000_000));
        assert_eq!(to_base_units(dec!(-1), 8), None);
    }

    #[test]
    fn test_round_trip_at_chain_precision() {
        let amount = dec!(123.45678901);
        let raw = to_base_units(amount, 8).expect("representable");
        assert_eq!(from_base_units(raw, 8), amount);
    }
}
