//! Display utilities for rendering output

use anyhow::Result;
use chainrun_core::SessionSummary;
use chainrun_tasks::Account;
use clap::ValueEnum;
use console::style;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayFormat {
    /// Text format (tables)
    Text,

    /// JSON format
    Json,

    /// YAML format
    Yaml,
}

/// One account of a plan, as exported
#[derive(Debug, Serialize)]
struct PlannedAccount {
    account: String,
    tasks: Vec<String>,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "#")]
    number: usize,
    #[tabled(rename = "Task")]
    task: String,
}

/// Renderer for formatting output
pub struct Renderer {
    format: DisplayFormat,
}

impl Renderer {
    pub fn new(format: DisplayFormat) -> Self {
        Self { format }
    }

    /// Resolved task lists, one block per account
    pub fn render_plan(&self, accounts: &[Account]) -> Result<String> {
        let planned: Vec<PlannedAccount> = accounts
            .iter()
            .map(|account| PlannedAccount {
                account: account.short_identity(),
                tasks: account.tasks.iter().map(ToString::to_string).collect(),
            })
            .collect();

        Ok(match self.format {
            DisplayFormat::Text => {
                let rows = planned.iter().flat_map(|planned| {
                    planned.tasks.iter().enumerate().map(|(index, task)| TaskRow {
                        account: planned.account.clone(),
                        number: index + 1,
                        task: task.clone(),
                    })
                });
                Table::new(rows).with(Style::modern()).to_string()
            }
            DisplayFormat::Json => serde_json::to_string_pretty(&planned)?,
            DisplayFormat::Yaml => serde_yaml::to_string(&planned)?,
        })
    }

    pub fn render_summary(summary: &SessionSummary) -> String {
        let mut lines = vec![format!(
            "{} {}",
            style("Accounts finished:").bold(),
            style(summary.finished).green()
        )];
        if summary.skipped > 0 {
            lines.push(format!(
                "{} {}",
                style("Accounts skipped:").bold(),
                style(summary.skipped).yellow()
            ));
        }
        if summary.resumed {
            lines.push(style("Resumed the previous session").cyan().to_string());
        }
        if summary.exited {
            lines.push(style("Stopped by the operator").red().to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainrun_tasks::{FunctionName, ModuleName, Task};

    fn accounts() -> Vec<Account> {
        vec![Account::new("0x0123456789abcdef0123456789abcdef").with_tasks(vec![
            Task::new(ModuleName::JediSwap).with_function(FunctionName::Swap),
            Task::new(ModuleName::Dmail),
        ])]
    }

    #[test]
    fn test_render_plan_json() {
        let rendered = Renderer::new(DisplayFormat::Json).render_plan(&accounts()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["account"], "0x012345...89abcdef");
        assert_eq!(value[0]["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(value[0]["tasks"][1], "Dmail");
    }

    #[test]
    fn test_render_plan_table_lists_every_task() {
        let rendered = Renderer::new(DisplayFormat::Text).render_plan(&accounts()).unwrap();
        assert!(rendered.contains("JediSwap"));
        assert!(rendered.contains("Dmail"));
        assert!(rendered.contains("0x012345...89abcdef"));
    }
}
