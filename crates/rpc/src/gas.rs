//! Gas prices over JSON-RPC

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chainrun_config::RunnerConfig;
use chainrun_execution::GasOracle;
use chainrun_tasks::{NetworkFamily, NetworkName};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{parse_quantity, JsonRpcClient};
use crate::{RpcError, RpcResult};

const WEI_PER_GWEI: f64 = 1e9;

#[derive(Debug, Deserialize)]
struct StarknetBlock {
    l1_gas_price: ResourcePrice,
}

#[derive(Debug, Deserialize)]
struct ResourcePrice {
    price_in_wei: String,
}

/// Reads gas prices from each network's RPC endpoint
#[derive(Debug)]
pub struct RpcGasOracle {
    client: JsonRpcClient,
    endpoints: HashMap<NetworkName, String>,
}

impl RpcGasOracle {
    pub fn new(client: JsonRpcClient, endpoints: impl IntoIterator<Item = (NetworkName, String)>) -> Self {
        Self {
            client,
            endpoints: endpoints.into_iter().collect(),
        }
    }

    /// Oracle over the configured endpoints
    pub fn from_config(config: &RunnerConfig) -> RpcResult<Self> {
        if config.request_timeout_secs == 0 {
            return Err(RpcError::InvalidConfig("request timeout must be positive".to_string()));
        }
        let client = JsonRpcClient::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(
            client,
            config
                .rpc_endpoints
                .iter()
                .map(|endpoint| (endpoint.network, endpoint.url.clone())),
        ))
    }

    /// Current price in wei; zero for networks without a chain or endpoint
    pub async fn gas_price_wei(&self, network: NetworkName) -> RpcResult<u128> {
        if network == NetworkName::Exchange {
            return Ok(0);
        }
        let Some(url) = self.endpoints.get(&network) else {
            debug!(%network, "No RPC endpoint, reporting zero gas price");
            return Ok(0);
        };

        match network.family() {
            Some(NetworkFamily::Starknet) => {
                let block: StarknetBlock = self
                    .client
                    .call(url, "starknet_getBlockWithTxHashes", json!(["latest"]))
                    .await?;
                parse_quantity(&block.l1_gas_price.price_in_wei)
            }
            _ => {
                let price: String = self.client.call(url, "eth_gasPrice", json!([])).await?;
                parse_quantity(&price)
            }
        }
    }
}

#[async_trait]
impl GasOracle for RpcGasOracle {
    async fn gas_price_gwei(&self, network: NetworkName) -> anyhow::Result<f64> {
        let wei = self.gas_price_wei(network).await?;
        Ok(wei as f64 / WEI_PER_GWEI)
    }
}
