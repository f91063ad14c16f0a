//! Dry-run stand-ins for the chain-facing traits
//!
//! Lets a roster be driven end to end without submitting anything: every
//! adapter call is logged and answered locally.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainrun_tasks::{Account, ModuleName, NetworkName, Token, TransactionStatus};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::adapter::{AdapterCall, AdapterRegistry, ProtocolAdapter};
use crate::sources::{BalanceSource, GasOracle};

/// Adapter that pretends to submit transactions
pub struct SimulatedAdapter {
    failure_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedAdapter {
    /// `failure_rate` in `[0, 1]` is the share of calls reported as Failed;
    /// a non-finite rate counts as zero
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            failure_rate,
            latency: Duration::from_millis(200),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Registry with one simulated adapter behind every module
    pub fn registry(failure_rate: f64) -> AdapterRegistry {
        let adapter: Arc<dyn ProtocolAdapter> = Arc::new(Self::new(failure_rate));
        let mut registry = AdapterRegistry::new();
        for module in ModuleName::ALL {
            registry.register_module(module, adapter.clone());
        }
        registry
    }
}

#[async_trait]
impl ProtocolAdapter for SimulatedAdapter {
    async fn execute(&self, call: &AdapterCall<'_>) -> anyhow::Result<TransactionStatus> {
        tokio::time::sleep(self.latency).await;

        let failed = self.rng.lock().gen_bool(self.failure_rate);
        let status = if failed {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Success
        };

        let action = match call.function {
            Some(function) => format!("{} {}", call.module, function),
            None => call.module.to_string(),
        };
        info!(
            "[simulation] {} for {} on {}: {}",
            action,
            call.account.short_identity(),
            call.network,
            status
        );
        Ok(status)
    }
}

/// Gas oracle reporting a fixed price
#[derive(Debug, Clone, Copy)]
pub struct FixedGasOracle {
    pub price_gwei: f64,
}

#[async_trait]
impl GasOracle for FixedGasOracle {
    async fn gas_price_gwei(&self, _network: NetworkName) -> anyhow::Result<f64> {
        Ok(self.price_gwei)
    }
}

/// Every token held in the same amount, stablecoins at one dollar
#[derive(Debug, Clone, Copy)]
pub struct SimulatedBalances {
    pub balance: f64,
    pub eth_price_usd: f64,
    pub wbtc_price_usd: f64,
}

impl Default for SimulatedBalances {
    fn default() -> Self {
        Self {
            balance: 1.0,
            eth_price_usd: 2_000.0,
            wbtc_price_usd: 30_000.0,
        }
    }
}

#[async_trait]
impl BalanceSource for SimulatedBalances {
    async fn balance(&self, _account: &Account, _network: NetworkName, _token: Token) -> anyhow::Result<f64> {
        Ok(self.balance)
    }

    async fn price_usd(&self, token: Token) -> anyhow::Result<f64> {
        Ok(match token {
            Token::Eth => self.eth_price_usd,
            Token::Wbtc => self.wbtc_price_usd,
            _ => 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainrun_tasks::{FunctionName, Params, Task};

    #[tokio::test(start_paused = true)]
    async fn test_simulated_adapter_rates() {
        let account = Account::new("0x01");
        let params = Params::new();
        let call = AdapterCall {
            account: &account,
            module: ModuleName::Dmail,
            function: None,
            network: NetworkName::Starknet,
            params: &params,
        };

        let ok = SimulatedAdapter::new(0.0);
        let broken = SimulatedAdapter::new(1.0);
        let undefined = SimulatedAdapter::new(f64::NAN);
        for _ in 0..10 {
            assert_eq!(ok.execute(&call).await.unwrap(), TransactionStatus::Success);
            assert_eq!(broken.execute(&call).await.unwrap(), TransactionStatus::Failed);
            assert_eq!(undefined.execute(&call).await.unwrap(), TransactionStatus::Success);
        }
    }

    #[test]
    fn test_simulated_registry_covers_every_module() {
        let registry = SimulatedAdapter::registry(0.0);
        let tasks = [
            Task::new(ModuleName::ZkLend),
            Task::new(ModuleName::JediSwap).with_function(FunctionName::Pool),
            Task::new(ModuleName::Okx).with_function(FunctionName::WithdrawFromOkx),
        ];
        assert!(registry.ensure_coverage(&tasks).is_ok());
    }
}
