use serde::{Deserialize, Serialize};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No account has started yet
    NotStarted,

    /// Working through the account at this run position
    RunningAccount(usize),

    /// Waiting for the operator after a critical result
    Paused(usize),

    /// Every account was processed or skipped
    Finished,

    /// The operator ended the run early
    Exited,
}

/// Outcome of the proxy check before an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyCheck {
    /// Proxy works, or the account has none
    Ready,

    /// Leave this account out of the run
    Skip,

    /// End the run
    Exit,
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// The previous session was resumed
    pub resumed: bool,

    /// Accounts that ran through their tasks
    pub finished: usize,

    /// Accounts skipped at the proxy check
    pub skipped: usize,

    /// The operator stopped the run
    pub exited: bool,
}
