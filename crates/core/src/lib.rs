//! Core module for chainrun
//!
//! Ties the other crates together into a run:
//! - Planning: roster sequencing and script resolution into accounts
//! - Session state machine: account loop, proxy checks, critical pauses
//! - Crash-resumable progress in the state file

mod plan;
mod session;
mod state;
mod status;

use chainrun_config::ConfigError;
use chainrun_execution::ExecutionError;
use chainrun_tasks::ResolveError;

pub use plan::{build_accounts, check_coverage};
pub use session::{RunOrder, Session};
pub use state::{SessionState, SessionStore};
pub use status::{ProxyCheck, SessionStatus, SessionSummary};

/// Error types for the core module
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Script error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Operator error: {0}")]
    Operator(#[from] anyhow::Error),

    #[error("Task {offset} does not exist, the account has {tasks} tasks")]
    InvalidTaskOffset { offset: usize, tasks: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for the core module
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Module version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
