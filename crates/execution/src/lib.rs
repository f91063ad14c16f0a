//! Task execution for chainrun
//!
//! This crate turns resolved tasks into protocol adapter calls:
//! - Retry and gas admission around every adapter call
//! - Multi-hop swap chains and single-hop fan-out
//! - Liquidity pool, lending and repeated-action flows
//! - Operator-skippable waits

pub mod adapter;
pub mod context;
pub mod controller;
pub mod flows;
pub mod gas;
pub mod operator;
pub mod simulation;
pub mod sources;
pub mod swap;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use chainrun_tasks::{FunctionName, ModuleName};

pub use adapter::{AdapterCall, AdapterRegistry, ProtocolAdapter};
pub use context::ExecutionContext;
pub use controller::Controller;
pub use flows::Executor;
pub use gas::GasGate;
pub use operator::{Operator, ProxyDisposition};
pub use simulation::{FixedGasOracle, SimulatedAdapter, SimulatedBalances};
pub use sources::{BalanceSource, GasOracle, ProxyHealth, ProxyProbe};
pub use swap::{HopPlanner, HopVerdict, TokenGraph};
pub use wait::{Sleeper, WaitOutcome};

/// Result type for the execution module
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Error types for the execution module
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("No adapter registered for {module}{}", function.map(|f| format!(" {}", f)).unwrap_or_default())]
    MissingAdapter {
        module: ModuleName,
        function: Option<FunctionName>,
    },
}
