//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O, metrics export). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `rpc`: custodial provider REST client
//! - `ledger`: JSONL-backed settlement ledger
//! - `metrics`: Prometheus metrics export

pub mod ledger;
pub mod metrics;
pub mod rpc;
