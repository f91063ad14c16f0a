//! Terminal prompts for the decisions a run waits on
//!
//! dialoguer blocks the calling thread, so every prompt runs on tokio's
//! blocking pool.

use anyhow::Result;
use async_trait::async_trait;
use chainrun_execution::{Operator, ProxyDisposition};
use chainrun_tasks::{Task, TransactionStatus};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

/// Operator answering through terminal prompts
#[derive(Debug, Default)]
pub struct ConsoleOperator;

impl ConsoleOperator {
    pub fn new() -> Self {
        Self
    }
}

async fn prompt<T, F>(ask: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(ask).await?
}

fn wait_for_enter(message: String) -> Result<()> {
    Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

/// Check a 1-based task number against the task count
pub fn check_task_number(number: usize, tasks: usize) -> std::result::Result<(), String> {
    if number < 1 {
        Err("Task number must be at least 1".to_string())
    } else if number > tasks {
        Err(format!("Task number must be at most {}", tasks))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn confirm_resume(&self, account: &str, _tasks: &[Task]) -> Result<bool> {
        let message = format!("Continue account {}?", account);
        prompt(move || {
            Ok(Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .default(true)
                .interact()?)
        })
        .await
    }

    async fn select_task_offset(&self, _account: &str, tasks: &[Task]) -> Result<usize> {
        let listing: Vec<String> = tasks.iter().map(ToString::to_string).collect();
        prompt(move || {
            println!("{}", style("Select from which task to continue:").bold());
            for (number, task) in listing.iter().enumerate() {
                println!("{}. {}", number + 1, task);
            }
            let count = listing.len();
            Ok(Input::<usize>::with_theme(&ColorfulTheme::default())
                .with_prompt("Task number")
                .validate_with(move |number: &usize| check_task_number(*number, count))
                .interact_text()?)
        })
        .await
    }

    async fn acknowledge_critical(
        &self,
        account: &str,
        task: &Task,
        status: TransactionStatus,
    ) -> Result<()> {
        let message = format!(
            "{} {} for {} ({}). Press enter once the account is ready to continue",
            style("Critical result").red().bold(),
            status,
            account,
            task
        );
        prompt(move || wait_for_enter(message)).await
    }

    async fn acknowledge_top_up(&self, account: &str, task: &Task) -> Result<()> {
        let message = format!(
            "{} for {} ({}). Press enter after topping up the balance",
            style("Insufficient balance").yellow().bold(),
            account,
            task
        );
        prompt(move || wait_for_enter(message)).await
    }

    async fn proxy_failure(&self, account: &str, proxy: &str) -> Result<ProxyDisposition> {
        let message = format!("Proxy {} of account {} is not working. What to do?", proxy, account);
        prompt(move || {
            let choice = Select::with_theme(&ColorfulTheme::default())
                .with_prompt(message)
                .items(&["Skip the account", "Exit", "Delete the proxy and continue"])
                .default(0)
                .interact()?;
            Ok(match choice {
                0 => ProxyDisposition::Skip,
                1 => ProxyDisposition::Exit,
                _ => ProxyDisposition::DeleteProxy,
            })
        })
        .await
    }
}
