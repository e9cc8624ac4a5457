//! Ledger Adapter
//!
//! File-backed implementation of the `LedgerStore` port for standalone and
//! test deployments.

pub mod store;

pub use store::JsonlLedger;
