//! Task dispatch and composite flows
//!
//! Most tasks are a single controller call. Swaps, liquidity pools, the
//! lending cycle and repeatable actions expand into several calls here.

use std::sync::Arc;
use std::time::Duration;

use chainrun_tasks::{
    keys, Account, FunctionName, ModuleName, SettingValue, Task, TransactionStatus,
};
use rand::seq::SliceRandom;
use tracing::{error, info};

use crate::context::ExecutionContext;
use crate::controller::Controller;
use crate::sources::BalanceSource;

/// Runs resolved tasks for one account at a time
#[derive(Clone)]
pub struct Executor {
    controller: Controller,
    balances: Arc<dyn BalanceSource>,
}

impl Executor {
    pub fn new(controller: Controller, balances: Arc<dyn BalanceSource>) -> Self {
        Self {
            controller,
            balances,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub(crate) fn balances(&self) -> &dyn BalanceSource {
        self.balances.as_ref()
    }

    /// Run one task to its terminal status
    pub async fn run_task(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &mut Task,
    ) -> TransactionStatus {
        let catalog = self.controller.catalog();
        match (task.module, task.function) {
            (ModuleName::Sleep, _) => self.controller.execute(account, ctx, task, None).await,
            (ModuleName::ZkLend, _) => self.run_lend(account, ctx, task).await,
            (module, None | Some(FunctionName::Swap)) if catalog.is_swap_module(module) => {
                self.run_swap(account, ctx, task).await
            }
            (_, Some(FunctionName::Pool)) => self.run_pool(account, ctx, task).await,
            (module, None) if module.is_repeatable() => self.run_repeated(account, ctx, task).await,
            (_, function) => self.controller.execute(account, ctx, task, function).await,
        }
    }

    /// Randomized wait between the steps of a flow
    async fn pause(&self, ctx: &mut ExecutionContext) {
        let delay = ctx.next_delay();
        self.controller.sleeper().wait(delay).await;
    }

    /// Percentage drawn from `[min_withdraw_percentage, max_withdraw_percentage]`,
    /// rounded to two decimals
    fn withdraw_percentage(ctx: &mut ExecutionContext, task: &Task) -> f64 {
        let drawn = ctx.uniform(
            task.params.f64_or(keys::MIN_WITHDRAW_PERCENTAGE, 100.0),
            task.params.f64_or(keys::MAX_WITHDRAW_PERCENTAGE, 100.0),
        );
        (drawn * 100.0).round() / 100.0
    }

    /// Add liquidity to a random pool, then maybe take some of it out
    async fn run_pool(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &Task,
    ) -> TransactionStatus {
        let Some(network) =
            self.controller
                .resolve_network(task.module, Some(FunctionName::AddLiquidity), &task.params)
        else {
            error!("No network configured for {}", task);
            return TransactionStatus::Failed;
        };

        let include = task.params.tokens(keys::POOL_TOKENS);
        let exclude = task.params.tokens(keys::EXCLUDE_TOKENS);
        let pools: Vec<_> = self
            .controller
            .catalog()
            .pools(task.module, network)
            .iter()
            .copied()
            .filter(|(a, b)| include.map_or(true, |set| set.contains(a) && set.contains(b)))
            .filter(|(a, b)| exclude.map_or(true, |set| !set.contains(a) && !set.contains(b)))
            .collect();

        let Some(&(first, second)) = pools.choose(ctx.rng()) else {
            error!("No pools available for {}", task.module);
            return TransactionStatus::Failed;
        };

        let mut work = task.clone();
        work.params.set_token(keys::FIRST_TOKEN, first);
        work.params.set_token(keys::SECOND_TOKEN, second);

        let added = self
            .controller
            .execute(account, ctx, &work, Some(FunctionName::AddLiquidity))
            .await;
        if !added.is_success() {
            error!("Adding liquidity to {} failed, continue manually", task.module);
            return added;
        }

        let percentage = Self::withdraw_percentage(ctx, task);
        if percentage <= 0.0 {
            info!("Keeping the {}/{} position on {}", first, second, task.module);
            return added;
        }

        let wait = ctx.uniform(
            task.params.f64_or(keys::MIN_WITHDRAW_SLEEP_TIME, 1.0),
            task.params.f64_or(keys::MAX_WITHDRAW_SLEEP_TIME, 10.0),
        );
        if wait > 0.0 {
            self.controller
                .sleeper()
                .wait(Duration::from_secs_f64(wait))
                .await;
        }

        work.params
            .set(keys::WITHDRAW_PERCENTAGE, SettingValue::Number(percentage));
        let removed = self
            .controller
            .execute(account, ctx, &work, Some(FunctionName::RemoveLiquidity))
            .await;
        if !removed.is_success() {
            error!("Removing liquidity from {} failed, continue manually", task.module);
        }
        removed
    }

    /// Supply, optionally borrow and repay, then withdraw
    async fn run_lend(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &Task,
    ) -> TransactionStatus {
        let supplied = self
            .controller
            .execute(account, ctx, task, Some(FunctionName::Supply))
            .await;
        if !supplied.is_success() {
            error!("Supplying to {} failed, continue manually", task.module);
            return supplied;
        }

        let mut result = supplied;
        let borrows = task.params.f64_or(keys::MIN_BORROW_PERCENTAGE, 10.0) > 0.0
            && task.params.f64_or(keys::MAX_BORROW_PERCENTAGE, 100.0) > 0.0;
        if borrows {
            for function in [FunctionName::Borrow, FunctionName::Repay] {
                self.pause(ctx).await;
                result = self.controller.execute(account, ctx, task, Some(function)).await;
                if !result.is_success() {
                    error!("{} on {} failed, continue manually", function, task.module);
                    return result;
                }
            }
        }

        let percentage = Self::withdraw_percentage(ctx, task);
        if percentage > 0.0 {
            let mut work = task.clone();
            work.params
                .set(keys::WITHDRAW_PERCENTAGE, SettingValue::Number(percentage));
            self.pause(ctx).await;
            let withdrawn = self
                .controller
                .execute(account, ctx, &work, Some(FunctionName::Withdraw))
                .await;
            if !withdrawn.is_success() {
                error!("Withdrawing from {} failed, continue manually", task.module);
                return withdrawn;
            }
        }
        result
    }

    /// Run a single-action module `n` times, `n` in `[min_amount, max_amount]`
    async fn run_repeated(
        &self,
        account: &Account,
        ctx: &mut ExecutionContext,
        task: &Task,
    ) -> TransactionStatus {
        let times = ctx.count_between(
            task.params.usize_or(keys::MIN_AMOUNT, 1),
            task.params.usize_or(keys::MAX_AMOUNT, 1),
        );

        for round in 0..times {
            let status = self.controller.execute(account, ctx, task, None).await;
            if !status.is_success() {
                return status;
            }
            if round + 1 < times {
                self.pause(ctx).await;
            }
        }
        TransactionStatus::Success
    }
}
