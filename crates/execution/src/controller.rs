//! Retry and admission controller
//!
//! Every module invocation, including each hop of a swap chain, goes
//! through [`Controller::execute`]: route to a network, wait for gas, call
//! the adapter, retry failures and hand balance problems to the operator.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chainrun_config::{ModuleCatalog, NetworkRoute};
use chainrun_tasks::{
    keys, Account, FunctionName, ModuleName, NetworkName, Params, Task, TransactionStatus,
};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterCall, AdapterRegistry, ProtocolAdapter};
use crate::context::ExecutionContext;
use crate::gas::GasGate;
use crate::operator::Operator;
use crate::wait::Sleeper;

/// Wraps adapter calls with routing, gas gating and retries
#[derive(Clone)]
pub struct Controller {
    registry: AdapterRegistry,
    catalog: Arc<ModuleCatalog>,
    gas: GasGate,
    operator: Arc<dyn Operator>,
    sleeper: Sleeper,
}

impl Controller {
    pub fn new(
        registry: AdapterRegistry,
        catalog: Arc<ModuleCatalog>,
        gas: GasGate,
        operator: Arc<dyn Operator>,
        sleeper: Sleeper,
    ) -> Self {
        Self {
            registry,
            catalog,
            gas,
            operator,
            sleeper,
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn sleeper(&self) -> &Sleeper {
        &self.sleeper
    }

    /// Network `module`/`function` runs on with these settings
    pub fn resolve_network(
        &self,
        module: ModuleName,
        function: Option<FunctionName>,
        params: &Params,
    ) -> Option<NetworkName> {
        match self.catalog.route(module, function)? {
            NetworkRoute::Fixed(network) => Some(network),
            NetworkRoute::DefinedInParams => Some(
                params
                    .network(keys::FROM_NETWORK)
                    .unwrap_or(NetworkName::Ethereum),
            ),
        }
    }

    /// Run `function` of the task's module with retries
    pub async fn execute(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &Task,
        function: Option<FunctionName>,
    ) -> TransactionStatus {
        if task.is_delay() {
            return self.delay(ctx, &task.params).await;
        }

        let Some(network) = self.resolve_network(task.module, function, &task.params) else {
            warn!("No network configured for {}, skipping", task);
            return TransactionStatus::Success;
        };

        let Some(adapter) = self.registry.get(task.module, function) else {
            error!("No adapter registered for {}", task);
            return TransactionStatus::Failed;
        };

        let attempts = account.max_retries.saturating_add(1);
        let mut attempt = 0;
        let mut status = TransactionStatus::Failed;

        while attempt < attempts {
            self.gas.admit(network, &account.gas_ceilings, &self.sleeper).await;

            let call = AdapterCall {
                account,
                module: task.module,
                function,
                network,
                params: &task.params,
            };
            status = invoke(adapter.as_ref(), &call).await;
            debug!(
                module = %task.module,
                attempt = attempt + 1,
                attempts,
                %status,
                "Adapter call finished"
            );

            match status {
                TransactionStatus::Success => return status,
                TransactionStatus::InsufficientBalance => {
                    warn!(
                        "Insufficient balance on {} for {}, waiting for a top-up",
                        account.short_identity(),
                        task
                    );
                    if let Err(e) = self
                        .operator
                        .acknowledge_top_up(&account.short_identity(), task)
                        .await
                    {
                        error!("Top-up acknowledgement failed: {:#}", e);
                        return status;
                    }
                }
                TransactionStatus::Failed => {
                    attempt += 1;
                    if attempt < attempts {
                        let delay = ctx.next_delay();
                        info!(
                            "{} failed (attempt {}/{}), retrying in {:.1}s",
                            task,
                            attempt,
                            attempts,
                            delay.as_secs_f64()
                        );
                        self.sleeper.wait(delay).await;
                    }
                }
                _ => return status,
            }
        }
        status
    }

    /// Delay task: `sleep_time`, or a draw from `[min_sleep_time, max_sleep_time]`
    async fn delay(&self, ctx: &mut ExecutionContext, params: &Params) -> TransactionStatus {
        let seconds = match params.f64(keys::SLEEP_TIME) {
            Some(seconds) => seconds,
            None => ctx.uniform(
                params.f64_or(keys::MIN_SLEEP_TIME, 1.0),
                params.f64_or(keys::MAX_SLEEP_TIME, 10.0),
            ),
        };
        info!("Sleeping for {:.1}s", seconds);
        self.sleeper.wait(Duration::from_secs_f64(seconds.max(0.0))).await;
        TransactionStatus::Success
    }
}

/// Adapter errors and panics both count as a failed attempt
async fn invoke(adapter: &dyn ProtocolAdapter, call: &AdapterCall<'_>) -> TransactionStatus {
    match AssertUnwindSafe(adapter.execute(call)).catch_unwind().await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            error!("{} on {} returned an error: {:#}", call.module, call.network, e);
            TransactionStatus::Failed
        }
        Err(_) => {
            error!("{} on {} panicked", call.module, call.network);
            TransactionStatus::Failed
        }
    }
}
