//! Gas price admission control

use std::sync::Arc;
use std::time::Duration;

use chainrun_tasks::{GasCeilings, NetworkName};
use tracing::{debug, info, warn};

use crate::sources::GasOracle;
use crate::wait::Sleeper;

/// Holds transactions back while gas is above the account's ceiling
#[derive(Clone)]
pub struct GasGate {
    oracle: Arc<dyn GasOracle>,
    poll_interval: Duration,
}

impl GasGate {
    pub fn new(oracle: Arc<dyn GasOracle>, poll_interval: Duration) -> Self {
        Self {
            oracle,
            poll_interval,
        }
    }

    /// Return once `network` may be used. Networks without a gas family,
    /// and families without a ceiling, pass without a query.
    pub async fn admit(&self, network: NetworkName, ceilings: &GasCeilings, sleeper: &Sleeper) {
        let Some(family) = network.family() else {
            return;
        };
        let Some(ceiling) = ceilings.for_family(family) else {
            return;
        };

        loop {
            match self.oracle.gas_price_gwei(network).await {
                Ok(price) if price < ceiling => {
                    debug!(%network, price, ceiling, "Gas price admitted");
                    return;
                }
                Ok(price) => {
                    info!(
                        "Gas price on {} is {:.2} gwei, waiting for less than {} gwei",
                        network, price, ceiling
                    );
                }
                Err(e) => warn!("Failed to get gas price for {}: {:#}", network, e),
            }
            sleeper.wait(self.poll_interval).await;
        }
    }
}
