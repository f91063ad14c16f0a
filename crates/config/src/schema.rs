//! Runner configuration schema

use std::path::PathBuf;
use std::time::Duration;

use chainrun_logging::LoggingConfig;
use chainrun_tasks::{NetworkName, SleepRange};
use serde::{Deserialize, Serialize};

use crate::catalog::ModuleCatalog;

/// JSON-RPC endpoint of one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEndpoint {
    pub network: NetworkName,
    pub url: String,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Account roster file (JSON or YAML)
    pub roster_path: PathBuf,

    /// Resume state file
    pub state_file: PathBuf,

    /// Gas price poll interval in seconds
    pub gas_poll_interval_secs: u64,

    /// Wait between proxy checks in seconds
    pub proxy_retry_interval_secs: u64,

    /// Wait between tasks when the roster does not set one
    pub default_sleep: SleepRange,

    /// Retries after a failed attempt when the roster does not set them
    pub default_max_retries: u32,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// RPC endpoints used by the gas oracle
    pub rpc_endpoints: Vec<RpcEndpoint>,

    /// Probe URLs for proxy checks, tried in order
    pub proxy_probe_urls: Vec<String>,

    /// Request timeout for RPC and probe calls in seconds
    pub request_timeout_secs: u64,

    /// Module routing, swap pairs and pools
    pub catalog: ModuleCatalog,
}

impl RunnerConfig {
    pub fn gas_poll_interval(&self) -> Duration {
        Duration::from_secs(self.gas_poll_interval_secs)
    }

    pub fn proxy_retry_interval(&self) -> Duration {
        Duration::from_secs(self.proxy_retry_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rpc_url(&self, network: NetworkName) -> Option<&str> {
        self.rpc_endpoints
            .iter()
            .find(|endpoint| endpoint.network == network)
            .map(|endpoint| endpoint.url.as_str())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let endpoint = |network, url: &str| RpcEndpoint {
            network,
            url: url.to_string(),
        };

        Self {
            roster_path: PathBuf::from("accounts.yaml"),
            state_file: PathBuf::from("last_state.json"),
            gas_poll_interval_secs: 10,
            proxy_retry_interval_secs: 15,
            default_sleep: SleepRange::default(),
            default_max_retries: 2,
            logging: LoggingConfig::default(),
            rpc_endpoints: vec![
                endpoint(NetworkName::Starknet, "https://starknet-mainnet.public.blastapi.io"),
                endpoint(NetworkName::StarknetTestnet, "https://starknet-testnet.public.blastapi.io"),
                endpoint(NetworkName::Ethereum, "https://rpc.ankr.com/eth"),
                endpoint(NetworkName::Arbitrum, "https://arb-mainnet-public.unifra.io"),
                endpoint(NetworkName::Optimism, "https://optimism-mainnet.public.blastapi.io"),
                endpoint(NetworkName::Goerli, "https://eth-goerli.public.blastapi.io"),
            ],
            proxy_probe_urls: vec![
                "https://geo.geosurf.io/".to_string(),
                "https://google.com".to_string(),
            ],
            request_timeout_secs: 5,
            catalog: ModuleCatalog::mainnet(),
        }
    }
}
