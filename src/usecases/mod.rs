//! Use Cases Layer - Connector Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! connector's core workflows. Each use case is a self-contained
//! operation on one chain.
//!
//! Use cases:
//! - `CallQueue`: rate-limited FIFO access to the RPC provider
//! - `normalizer`: provider record → canonical transaction
//! - `DepositMonitor`: custodial address surveillance + idempotent crediting
//! - `WithdrawalExecutor`: outbound transfer broadcast + confirmation
//! - `ChainConnector`: per-chain façade gated by the activation flag

pub mod call_queue;
pub mod connector;
pub mod deposit_monitor;
pub mod normalizer;
pub mod withdrawal_executor;

pub use call_queue::CallQueue;
pub use connector::{ChainConnector, ConnectorError, GeneratedWallet};
pub use deposit_monitor::DepositMonitor;
pub use withdrawal_executor::{WithdrawalExecutor, WithdrawalOutcome, WithdrawalRequest};
