//! Operator-skippable waits

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full duration passed
    Elapsed,

    /// The operator cut it short
    Skipped,
}

/// Shared handle for waits that an interrupt can end early
///
/// Clones share the same skip signal. A skip only affects waits in
/// progress at that moment.
#[derive(Debug, Clone, Default)]
pub struct Sleeper {
    skip: Arc<Notify>,
}

impl Sleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `duration` unless skipped first
    pub async fn wait(&self, duration: Duration) -> WaitOutcome {
        if duration.is_zero() {
            return WaitOutcome::Elapsed;
        }

        let skipped = self.skip.notified();
        tokio::select! {
            _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
            _ = skipped => {
                debug!("Wait of {:?} skipped", duration);
                WaitOutcome::Skipped
            }
        }
    }

    /// End every wait currently in progress
    pub fn skip(&self) {
        self.skip.notify_waiters();
    }
}
