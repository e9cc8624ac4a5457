//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires from
//! the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `RpcGateway`: blockchain provider access (history, balance, broadcast)
//! - `LedgerStore`: the platform's durable balance ledger
pub mod ledger;
pub mod rpc_gateway;
