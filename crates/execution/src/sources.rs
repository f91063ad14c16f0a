//! Live data the engine reads: gas prices, balances, proxy health

use async_trait::async_trait;
use chainrun_tasks::{Account, NetworkName, Token};

/// Current gas price of a network
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Price in gwei
    async fn gas_price_gwei(&self, network: NetworkName) -> anyhow::Result<f64>;
}

/// Token balances and prices, used when fanning out over owned tokens
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Balance of `token` held by `account`, in whole tokens
    async fn balance(&self, account: &Account, network: NetworkName, token: Token) -> anyhow::Result<f64>;

    /// Price of one `token` in USD
    async fn price_usd(&self, token: Token) -> anyhow::Result<f64>;
}

/// Result of a proxy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyHealth {
    /// Traffic goes through; the outgoing IP when the probe reported it
    Healthy { ip: Option<String> },

    /// Nothing answered through the proxy
    Unreachable,
}

impl ProxyHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProxyHealth::Healthy { .. })
    }
}

/// Proxy checks and mobile proxy rotation
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    async fn probe(&self, proxy: &str) -> ProxyHealth;

    /// Ask a mobile proxy for a new outgoing IP
    async fn rotate(&self, link: &str) -> anyhow::Result<()>;
}
