//! Utility functions for the CLI

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chainrun_config::RunnerConfig;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::Duration;

/// Save configuration to file, JSON or YAML by extension
pub fn save_config<P: AsRef<Path>>(config: &RunnerConfig, path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let config_str = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::to_string_pretty(config)
            .with_context(|| "Failed to serialize config to JSON")?,
        Some("yaml") | Some("yml") => serde_yaml::to_string(config)
            .with_context(|| "Failed to serialize config to YAML")?,
        _ => return Err(anyhow!("Unsupported config file format: {:?}", path)),
    };

    fs::write(path, config_str)
        .with_context(|| format!("Failed to write config to file: {:?}", path))?;

    Ok(())
}

/// Create a new configuration interactively
pub fn create_config_interactive() -> Result<RunnerConfig> {
    println!("{}", style("chainrun configuration").bold().cyan());
    println!("Let's set up your configuration...\n");

    let theme = ColorfulTheme::default();
    let mut config = RunnerConfig::default();

    config.roster_path = PathBuf::from(
        Input::<String>::with_theme(&theme)
            .with_prompt("Account roster file")
            .default(config.roster_path.display().to_string())
            .interact_text()?,
    );

    config.state_file = PathBuf::from(
        Input::<String>::with_theme(&theme)
            .with_prompt("Session state file")
            .default(config.state_file.display().to_string())
            .interact_text()?,
    );

    config.default_max_retries = Input::<u32>::with_theme(&theme)
        .with_prompt("Retries after a failed transaction")
        .default(config.default_max_retries)
        .interact_text()?;

    config.default_sleep.min = Input::<f64>::with_theme(&theme)
        .with_prompt("Minimum wait between tasks (seconds)")
        .default(config.default_sleep.min)
        .interact_text()?;

    let min_sleep = config.default_sleep.min;
    config.default_sleep.max = Input::<f64>::with_theme(&theme)
        .with_prompt("Maximum wait between tasks (seconds)")
        .default(config.default_sleep.max.max(min_sleep))
        .validate_with(move |input: &f64| {
            if *input >= min_sleep {
                Ok(())
            } else {
                Err("Maximum wait must not be below the minimum")
            }
        })
        .interact_text()?;

    config.gas_poll_interval_secs = Input::<u64>::with_theme(&theme)
        .with_prompt("Gas price poll interval (seconds)")
        .default(config.gas_poll_interval_secs)
        .interact_text()?;

    for endpoint in &mut config.rpc_endpoints {
        endpoint.url = Input::<String>::with_theme(&theme)
            .with_prompt(format!("{} RPC endpoint", endpoint.network))
            .default(endpoint.url.clone())
            .interact_text()?;
    }

    println!("\n{}", style("Configuration created successfully!").green());

    Ok(config)
}

/// Create a spinner with the specified message
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(spinner_style);
    }

    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", style("i").blue().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_json_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("chainrun.json");
        let mut config = RunnerConfig::default();
        config.default_max_retries = 7;

        save_config(&config, &path).unwrap();
        let saved: RunnerConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, config);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(save_config(&RunnerConfig::default(), dir.path().join("chainrun.ini")).is_err());
    }
}
