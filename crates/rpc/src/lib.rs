//! Network access for chainrun
//!
//! JSON-RPC gas price queries for Ethereum and Starknet, and proxy health
//! checks over HTTP.

mod client;
mod gas;
mod proxy;

#[cfg(test)]
mod test_server;

pub use client::{parse_quantity, JsonRpcClient};
pub use gas::RpcGasOracle;
pub use proxy::{proxy_url, HttpProxyProbe};

/// Result type for the RPC module
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Error types for the RPC module
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("RPC call failed: {0}")]
    Call(String),

    #[error("Client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
