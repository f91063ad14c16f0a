//! Human decisions the engine waits for

use async_trait::async_trait;
use chainrun_tasks::{Task, TransactionStatus};

/// What to do with an account whose proxy does not answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyDisposition {
    /// Skip the account for this run
    Skip,

    /// Stop the run
    Exit,

    /// Run the account without its proxy
    DeleteProxy,
}

/// Operator console
///
/// `account` arguments are shortened identities, safe to display.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Resume the interrupted account instead of starting over?
    async fn confirm_resume(&self, account: &str, tasks: &[Task]) -> anyhow::Result<bool>;

    /// 1-based task to resume from
    async fn select_task_offset(&self, account: &str, tasks: &[Task]) -> anyhow::Result<usize>;

    /// Critical outcome seen; returns once the operator has dealt with it
    async fn acknowledge_critical(
        &self,
        account: &str,
        task: &Task,
        status: TransactionStatus,
    ) -> anyhow::Result<()>;

    /// Balance too low; returns once the account has been topped up
    async fn acknowledge_top_up(&self, account: &str, task: &Task) -> anyhow::Result<()>;

    /// Proxy keeps failing; decide how to continue
    async fn proxy_failure(&self, account: &str, proxy: &str) -> anyhow::Result<ProxyDisposition>;
}
