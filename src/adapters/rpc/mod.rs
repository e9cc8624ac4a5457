//! Provider RPC Adapter
//!
//! HTTP implementation of the `RpcGateway` port for custodial providers.

pub mod client;

pub use client::{HttpRpcGateway, RpcClientConfig};
