//! Session state machine
//!
//! Runs accounts one after another, checkpointing progress to the state
//! file so that an interrupted run can pick up where it stopped:
//!
//! - the whole run order is written before the first account starts
//! - the current account's fingerprint is written before it starts
//! - on the next start, a state file covering the same accounts offers a
//!   resume at a task of the interrupted account
//!
//! Critical task results pause the run until the operator acknowledges them.

use std::sync::Arc;
use std::time::Duration;

use chainrun_execution::{
    ExecutionContext, Executor, Operator, ProxyDisposition, ProxyHealth, ProxyProbe, Sleeper,
    WaitOutcome,
};
use chainrun_logging::{
    log_account_finished, log_account_skipped, log_account_started, log_session_finished,
    log_session_started, log_task_result,
};
use chainrun_tasks::{Account, Fingerprint};
use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::state::{SessionState, SessionStore};
use crate::status::{ProxyCheck, SessionStatus, SessionSummary};
use crate::{CoreError, CoreResult};

/// Wait after a mobile proxy rotation before probing
const ROTATION_SETTLE: Duration = Duration::from_secs(5);

/// Accounts in the order they will run
#[derive(Debug)]
pub struct RunOrder {
    pub accounts: Vec<Account>,

    /// Order persisted for the whole session
    pub order: Vec<Fingerprint>,

    pub resumed: bool,
}

impl RunOrder {
    fn fresh(accounts: Vec<Account>) -> Self {
        let order = accounts.iter().map(|a| a.fingerprint.clone()).collect();
        Self {
            accounts,
            order,
            resumed: false,
        }
    }
}

/// Drives a whole run over a list of planned accounts
pub struct Session {
    executor: Executor,
    operator: Arc<dyn Operator>,
    proxy_probe: Arc<dyn ProxyProbe>,
    store: SessionStore,
    proxy_retry_interval: Duration,
    status: RwLock<SessionStatus>,
}

impl Session {
    pub fn new(
        executor: Executor,
        operator: Arc<dyn Operator>,
        proxy_probe: Arc<dyn ProxyProbe>,
        store: SessionStore,
        proxy_retry_interval: Duration,
    ) -> Self {
        Self {
            executor,
            operator,
            proxy_probe,
            store,
            proxy_retry_interval,
            status: RwLock::new(SessionStatus::NotStarted),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    fn set_status(&self, status: SessionStatus) {
        *self.status.write() = status;
    }

    fn sleeper(&self) -> &Sleeper {
        self.executor.controller().sleeper()
    }

    /// Run every account, resuming the previous session when the operator agrees
    pub async fn run(&self, accounts: Vec<Account>) -> CoreResult<SessionSummary> {
        if accounts.is_empty() {
            info!("No accounts to run");
            self.set_status(SessionStatus::Finished);
            return Ok(SessionSummary::default());
        }

        let RunOrder {
            accounts,
            order,
            resumed,
        } = self.restore(accounts).await?;

        let mut state = SessionState::new(order);
        state.account_hash = accounts.first().map(|a| a.fingerprint.clone());
        self.store.save(&state)?;

        info!(
            "Accounts order: {}",
            accounts.iter().map(Account::short_identity).join(" -> ")
        );
        log_session_started(accounts.len(), resumed);

        let mut summary = SessionSummary {
            resumed,
            ..SessionSummary::default()
        };
        let total = accounts.len();

        for (index, mut account) in accounts.into_iter().enumerate() {
            self.set_status(SessionStatus::RunningAccount(index));
            log_account_started(&account.identity, index, total);
            info!(
                "Starting account {} with {} tasks",
                account.short_identity(),
                account.tasks.len()
            );

            state.account_hash = Some(account.fingerprint.clone());
            self.store.save(&state)?;

            match self.check_proxy(&mut account).await? {
                ProxyCheck::Ready => {}
                ProxyCheck::Skip => {
                    warn!("Skipping account {}", account.short_identity());
                    log_account_skipped(&account.identity, "proxy not working");
                    summary.skipped += 1;
                    continue;
                }
                ProxyCheck::Exit => {
                    error!("Exiting session due to a proxy that does not work");
                    summary.exited = true;
                    break;
                }
            }

            self.run_account(index, &account).await?;
            info!("Finished account {}", account.short_identity());
            log_account_finished(&account.identity);
            summary.finished += 1;
        }

        log_session_finished();
        self.set_status(if summary.exited {
            SessionStatus::Exited
        } else {
            SessionStatus::Finished
        });
        Ok(summary)
    }

    /// Decide the run order, offering to resume a matching saved session
    pub async fn restore(&self, accounts: Vec<Account>) -> CoreResult<RunOrder> {
        let Some(state) = self.store.load()? else {
            return Ok(RunOrder::fresh(accounts));
        };

        let current: Vec<Fingerprint> = accounts.iter().map(|a| a.fingerprint.clone()).collect();
        if !state.matches(&current) {
            info!("Saved session covers other accounts, starting fresh");
            return Ok(RunOrder::fresh(accounts));
        }
        let Some(last) = state.account_hash.clone() else {
            return Ok(RunOrder::fresh(accounts));
        };
        let Some(index) = state.order.iter().position(|fp| *fp == last) else {
            warn!("Saved session names an account outside its own order, starting fresh");
            return Ok(RunOrder::fresh(accounts));
        };

        let mut ordered = arrange(accounts, &state.order);
        let short = ordered[index].short_identity();
        if !self
            .operator
            .confirm_resume(&short, &ordered[index].tasks)
            .await?
        {
            let accounts = arrange(ordered, &current);
            return Ok(RunOrder::fresh(accounts));
        }

        let mut previous = ordered.remove(index);
        if !previous.tasks.is_empty() {
            let offset = self
                .operator
                .select_task_offset(&short, &previous.tasks)
                .await?;
            if offset == 0 || offset > previous.tasks.len() {
                return Err(CoreError::InvalidTaskOffset {
                    offset,
                    tasks: previous.tasks.len(),
                });
            }
            previous.start_from_task(offset);
        }
        info!(
            "Continuing account {} with {} tasks",
            short,
            previous.tasks.len()
        );

        let mut accounts = Vec::with_capacity(ordered.len() + 1 - index);
        accounts.push(previous);
        accounts.extend(ordered.into_iter().skip(index));

        Ok(RunOrder {
            accounts,
            order: state.order,
            resumed: true,
        })
    }

    /// Rotate and probe the account's proxy
    async fn check_proxy(&self, account: &mut Account) -> CoreResult<ProxyCheck> {
        let short = account.short_identity();

        if let Some(link) = &account.proxy_rotation_link {
            match self.proxy_probe.rotate(link).await {
                Ok(()) => {
                    info!("Changed mobile proxy for account {}", short);
                    self.sleeper().wait(ROTATION_SETTLE).await;
                }
                Err(e) => warn!("Failed to change mobile proxy for account {}: {}", short, e),
            }
        }

        let Some(proxy) = account.proxy.clone() else {
            return Ok(ProxyCheck::Ready);
        };

        loop {
            match self.proxy_probe.probe(&proxy).await {
                ProxyHealth::Healthy { ip: Some(ip) } => {
                    info!("Outgoing IP for account {}: {}", short, ip);
                    return Ok(ProxyCheck::Ready);
                }
                ProxyHealth::Healthy { ip: None } => {
                    warn!("Failed to get outgoing IP for account {}", short);
                    return Ok(ProxyCheck::Ready);
                }
                ProxyHealth::Unreachable => {
                    error!("Proxy of account {} is not working, retrying", short);
                    info!("Press Ctrl+C to stop retrying");
                    if self.sleeper().wait(self.proxy_retry_interval).await == WaitOutcome::Skipped {
                        break;
                    }
                }
            }
        }

        match self.operator.proxy_failure(&short, &proxy).await? {
            ProxyDisposition::Skip => Ok(ProxyCheck::Skip),
            ProxyDisposition::Exit => Ok(ProxyCheck::Exit),
            ProxyDisposition::DeleteProxy => {
                info!("Deleting proxy of account {}", short);
                account.proxy = None;
                Ok(ProxyCheck::Ready)
            }
        }
    }

    /// Every task of one account, with the randomized wait after each
    async fn run_account(&self, index: usize, account: &Account) -> CoreResult<()> {
        let mut ctx = ExecutionContext::for_account(account);
        let mut tasks = account.tasks.clone();
        let total = tasks.len();

        for (position, task) in tasks.iter_mut().enumerate() {
            let status = self.executor.run_task(account, &mut ctx, task).await;
            let task = &*task;

            if status.is_critical() {
                self.set_status(SessionStatus::Paused(index));
                warn!("Critical result {} received, waiting for the operator", status);
                self.operator
                    .acknowledge_critical(&account.short_identity(), task, status)
                    .await?;
                self.set_status(SessionStatus::RunningAccount(index));
            }

            info!("{}/{} task ({}) completed", position + 1, total, task);
            log_task_result(&account.identity, task, status);

            let delay = ctx.next_delay();
            self.sleeper().wait(delay).await;
        }
        Ok(())
    }
}

/// Reorder `accounts` to follow `order`; accounts sharing a fingerprint keep
/// their relative order
fn arrange(mut accounts: Vec<Account>, order: &[Fingerprint]) -> Vec<Account> {
    let mut arranged = Vec::with_capacity(accounts.len());
    for fingerprint in order {
        if let Some(position) = accounts.iter().position(|a| a.fingerprint == *fingerprint) {
            arranged.push(accounts.remove(position));
        }
    }
    arranged.extend(accounts);
    arranged
}
