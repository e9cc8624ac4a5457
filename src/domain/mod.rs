//! Domain layer - Core connector types and conversions.
//!
//! Pure inner ring of the hexagonal architecture: canonical transaction
//! shapes and amount math, no I/O and no provider-specific knowledge.

pub mod transaction;

// Re-export core types for convenience
pub use transaction::{
    Address, NormalizedTransaction, TransactionKind, TransactionStatus, TxHash,
    WalletId, UNKNOWN, from_base_units, to_base_units,
};
