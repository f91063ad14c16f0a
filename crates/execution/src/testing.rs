//! Hand-written fakes for the execution traits
//!
//! Compiled for this crate's tests and, with the `testing` feature, for
//! downstream crates that drive the engine without a chain.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chainrun_config::ModuleCatalog;
use chainrun_tasks::{
    keys, Account, FunctionName, NetworkName, Params, Task, Token, TransactionStatus,
};
use parking_lot::Mutex;

use crate::adapter::{AdapterCall, AdapterRegistry, ProtocolAdapter};
use crate::controller::Controller;
use crate::flows::Executor;
use crate::gas::GasGate;
use crate::operator::{Operator, ProxyDisposition};
use crate::sources::{BalanceSource, GasOracle, ProxyHealth, ProxyProbe};
use crate::wait::Sleeper;

type StatusFn = dyn Fn(&AdapterCall<'_>) -> TransactionStatus + Send + Sync;

enum Step {
    Status(TransactionStatus),
    Error,
    Panic,
}

/// What an adapter was called with
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub function: Option<FunctionName>,
    pub network: NetworkName,
    pub params: Params,
}

impl RecordedCall {
    /// `(from_token, to_token)` written by the swap flow
    pub fn hop(&self) -> Option<(Token, Token)> {
        Some((
            self.params.token(keys::FROM_TOKEN)?,
            self.params.token(keys::TO_TOKEN)?,
        ))
    }
}

/// Adapter that plays back a script of outcomes, then a fallback
pub struct ScriptedAdapter {
    script: Mutex<VecDeque<Step>>,
    fallback: Box<StatusFn>,
    panic_when_done: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAdapter {
    fn build(script: Vec<Step>, fallback: Box<StatusFn>, panic_when_done: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            panic_when_done,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Return `statuses` in order, Success afterwards
    pub fn new(statuses: Vec<TransactionStatus>) -> Arc<Self> {
        let script = statuses.into_iter().map(Step::Status).collect();
        Self::build(script, Box::new(|_| TransactionStatus::Success), false)
    }

    pub fn always(status: TransactionStatus) -> Arc<Self> {
        Self::build(Vec::new(), Box::new(move |_| status), false)
    }

    /// Decide each outcome from the call
    pub fn from_fn<F>(decide: F) -> Arc<Self>
    where
        F: Fn(&AdapterCall<'_>) -> TransactionStatus + Send + Sync + 'static,
    {
        Self::build(Vec::new(), Box::new(decide), false)
    }

    /// One `Err`, then `statuses`
    pub fn erroring_then(statuses: Vec<TransactionStatus>) -> Arc<Self> {
        let mut script = vec![Step::Error];
        script.extend(statuses.into_iter().map(Step::Status));
        Self::build(script, Box::new(|_| TransactionStatus::Success), false)
    }

    pub fn panicking() -> Arc<Self> {
        Self::build(vec![Step::Panic], Box::new(|_| TransactionStatus::Success), true)
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn networks(&self) -> Vec<NetworkName> {
        self.calls.lock().iter().map(|call| call.network).collect()
    }

    pub fn functions(&self) -> Vec<Option<FunctionName>> {
        self.calls.lock().iter().map(|call| call.function).collect()
    }

    /// Swap hops in call order
    pub fn hops(&self) -> Vec<(Token, Token)> {
        self.calls.lock().iter().filter_map(RecordedCall::hop).collect()
    }
}

#[async_trait]
impl ProtocolAdapter for ScriptedAdapter {
    async fn execute(&self, call: &AdapterCall<'_>) -> anyhow::Result<TransactionStatus> {
        self.calls.lock().push(RecordedCall {
            function: call.function,
            network: call.network,
            params: call.params.clone(),
        });

        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Status(status)) => Ok(status),
            Some(Step::Error) => Err(anyhow::anyhow!("scripted adapter error")),
            Some(Step::Panic) => panic!("scripted adapter panic"),
            None if self.panic_when_done => panic!("scripted adapter panic"),
            None => Ok((self.fallback)(call)),
        }
    }
}

/// Gas oracle that plays back prices, then reports zero
pub struct ScriptedGasOracle {
    prices: Mutex<VecDeque<Result<f64, String>>>,
    networks: Mutex<Vec<NetworkName>>,
}

impl ScriptedGasOracle {
    pub fn new(prices: Vec<Result<f64, String>>) -> Arc<Self> {
        Arc::new(Self {
            prices: Mutex::new(prices.into()),
            networks: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> usize {
        self.networks.lock().len()
    }

    pub fn networks(&self) -> Vec<NetworkName> {
        self.networks.lock().clone()
    }
}

#[async_trait]
impl GasOracle for ScriptedGasOracle {
    async fn gas_price_gwei(&self, network: NetworkName) -> anyhow::Result<f64> {
        self.networks.lock().push(network);
        let next = self.prices.lock().pop_front();
        match next {
            Some(Ok(price)) => Ok(price),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(0.0),
        }
    }
}

/// Operator that answers from fixed settings and counts prompts
#[derive(Debug)]
pub struct RecordingOperator {
    pub resume: bool,
    pub task_offset: usize,
    pub proxy_disposition: ProxyDisposition,
    top_ups: AtomicUsize,
    criticals: Mutex<Vec<(String, TransactionStatus)>>,
    proxy_failures: AtomicUsize,
}

impl Default for RecordingOperator {
    fn default() -> Self {
        Self {
            resume: false,
            task_offset: 1,
            proxy_disposition: ProxyDisposition::Skip,
            top_ups: AtomicUsize::new(0),
            criticals: Mutex::new(Vec::new()),
            proxy_failures: AtomicUsize::new(0),
        }
    }
}

impl RecordingOperator {
    /// Accept resumes at `task_offset`
    pub fn resuming(task_offset: usize) -> Self {
        Self {
            resume: true,
            task_offset,
            ..Self::default()
        }
    }

    pub fn with_proxy_disposition(mut self, disposition: ProxyDisposition) -> Self {
        self.proxy_disposition = disposition;
        self
    }

    pub fn top_ups(&self) -> usize {
        self.top_ups.load(Ordering::SeqCst)
    }

    /// `(task, status)` of every acknowledged critical result
    pub fn criticals(&self) -> Vec<(String, TransactionStatus)> {
        self.criticals.lock().clone()
    }

    pub fn proxy_failures(&self) -> usize {
        self.proxy_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operator for RecordingOperator {
    async fn confirm_resume(&self, _account: &str, _tasks: &[Task]) -> anyhow::Result<bool> {
        Ok(self.resume)
    }

    async fn select_task_offset(&self, _account: &str, _tasks: &[Task]) -> anyhow::Result<usize> {
        Ok(self.task_offset)
    }

    async fn acknowledge_critical(
        &self,
        _account: &str,
        task: &Task,
        status: TransactionStatus,
    ) -> anyhow::Result<()> {
        self.criticals.lock().push((task.to_string(), status));
        Ok(())
    }

    async fn acknowledge_top_up(&self, _account: &str, _task: &Task) -> anyhow::Result<()> {
        self.top_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn proxy_failure(&self, _account: &str, _proxy: &str) -> anyhow::Result<ProxyDisposition> {
        self.proxy_failures.fetch_add(1, Ordering::SeqCst);
        Ok(self.proxy_disposition)
    }
}

/// Static balances and prices
#[derive(Debug, Default)]
pub struct FixedBalances {
    balances: BTreeMap<Token, f64>,
    prices: BTreeMap<Token, f64>,
}

impl FixedBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, token: Token, balance: f64) -> Self {
        self.balances.insert(token, balance);
        self
    }

    pub fn with_price(mut self, token: Token, price: f64) -> Self {
        self.prices.insert(token, price);
        self
    }
}

#[async_trait]
impl BalanceSource for FixedBalances {
    async fn balance(&self, _account: &Account, _network: NetworkName, token: Token) -> anyhow::Result<f64> {
        Ok(self.balances.get(&token).copied().unwrap_or(0.0))
    }

    async fn price_usd(&self, token: Token) -> anyhow::Result<f64> {
        self.prices
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no price for {}", token))
    }
}

/// Proxy probe answering from a fixed list of outcomes, Unreachable afterwards
pub struct ScriptedProxyProbe {
    outcomes: Mutex<VecDeque<ProxyHealth>>,
    probes: AtomicUsize,
    rotations: Mutex<Vec<String>>,
}

impl ScriptedProxyProbe {
    pub fn new(outcomes: Vec<ProxyHealth>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            probes: AtomicUsize::new(0),
            rotations: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::new(vec![ProxyHealth::Healthy { ip: None }; 64])
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn rotations(&self) -> Vec<String> {
        self.rotations.lock().clone()
    }
}

#[async_trait]
impl ProxyProbe for ScriptedProxyProbe {
    async fn probe(&self, _proxy: &str) -> ProxyHealth {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().pop_front().unwrap_or(ProxyHealth::Unreachable)
    }

    async fn rotate(&self, link: &str) -> anyhow::Result<()> {
        self.rotations.lock().push(link.to_string());
        Ok(())
    }
}

/// Controller and executor wired to fakes
pub struct Harness {
    pub controller: Controller,
    pub executor: Executor,
    pub gas: Arc<ScriptedGasOracle>,
    pub operator: Arc<RecordingOperator>,
    pub sleeper: Sleeper,
    registry: AdapterRegistry,
    balances: Arc<FixedBalances>,
}

/// Mainnet catalog, free gas, an operator that acknowledges everything
pub fn harness(register: impl FnOnce(&mut AdapterRegistry)) -> Harness {
    let mut registry = AdapterRegistry::new();
    register(&mut registry);
    Harness::assemble(
        registry,
        ModuleCatalog::mainnet(),
        Arc::new(FixedBalances::new()),
        Arc::new(RecordingOperator::default()),
    )
}

impl Harness {
    fn assemble(
        registry: AdapterRegistry,
        catalog: ModuleCatalog,
        balances: Arc<FixedBalances>,
        operator: Arc<RecordingOperator>,
    ) -> Self {
        let gas = ScriptedGasOracle::new(Vec::new());
        let sleeper = Sleeper::new();
        let controller = Controller::new(
            registry.clone(),
            Arc::new(catalog),
            GasGate::new(gas.clone(), Duration::from_secs(10)),
            operator.clone(),
            sleeper.clone(),
        );
        let executor = Executor::new(controller.clone(), balances.clone());
        Self {
            controller,
            executor,
            gas,
            operator,
            sleeper,
            registry,
            balances,
        }
    }

    pub fn with_catalog(self, catalog: ModuleCatalog) -> Self {
        Self::assemble(self.registry, catalog, self.balances, self.operator)
    }

    pub fn with_balances(self, balances: FixedBalances) -> Self {
        let catalog = self.controller.catalog().clone();
        Self::assemble(self.registry, catalog, Arc::new(balances), self.operator)
    }

    pub fn with_operator(self, operator: RecordingOperator) -> Self {
        let catalog = self.controller.catalog().clone();
        Self::assemble(self.registry, catalog, self.balances, Arc::new(operator))
    }
}
