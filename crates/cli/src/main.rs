//! Command line interface for chainrun
//!
//! - Run the account roster, live or simulated
//! - Print the resolved plan without executing it
//! - Reset saved session progress
//! - Generate a configuration file

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chainrun_config::{ConfigLoader, Roster, RunnerConfig};
use chainrun_core::{build_accounts, check_coverage, Session, SessionStore};
use chainrun_execution::{
    AdapterRegistry, BalanceSource, Controller, Executor, FixedGasOracle, GasGate, GasOracle,
    SimulatedAdapter, SimulatedBalances, Sleeper,
};
use chainrun_logging::init_logging;
use chainrun_rpc::{HttpProxyProbe, RpcGasOracle};
use chainrun_tasks::{Account, NetworkName, Token};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

mod display;
mod interactive;
mod utils;

use display::{DisplayFormat, Renderer};
use interactive::ConsoleOperator;
use utils::{
    create_config_interactive, create_spinner, print_error, print_info, print_success,
    print_warning, save_config,
};

/// Two interrupts closer than this end the process
const DOUBLE_INTERRUPT: Duration = Duration::from_secs(2);

/// chainrun CLI
#[derive(Parser, Debug)]
#[clap(name = "chainrun", version, about, long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[clap(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Account roster file, overrides the configured one
    #[clap(short, long, value_name = "FILE")]
    roster: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every account of the roster
    Run {
        /// Answer every transaction locally instead of submitting it
        #[clap(short, long)]
        simulation: bool,

        /// Share of simulated transactions reported as failed
        #[clap(long, value_name = "RATE", default_value_t = 0.0, value_parser = parse_failure_rate)]
        failure_rate: f64,
    },

    /// Resolve the roster and print each account's tasks
    Plan {
        /// Output format
        #[clap(short, long, value_enum, default_value = "text")]
        format: DisplayFormat,
    },

    /// Forget saved session progress
    Reset,

    /// Generate a default configuration
    GenerateConfig {
        /// Output file
        #[clap(short, long, value_name = "FILE", default_value = "chainrun.yaml")]
        output: PathBuf,

        /// Create interactively with prompts
        #[clap(short, long)]
        interactive: bool,
    },
}

/// Share of failed simulated calls, a finite number in `[0, 1]`
fn parse_failure_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|e| format!("{}", e))?;
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{} is not a rate between 0 and 1", value))
    }
}

/// Balance source for builds without chain access
struct NoBalances;

#[async_trait]
impl BalanceSource for NoBalances {
    async fn balance(&self, _account: &Account, network: NetworkName, token: Token) -> Result<f64> {
        Err(anyhow!("no balance source for {} on {}", token, network))
    }

    async fn price_usd(&self, token: Token) -> Result<f64> {
        Err(anyhow!("no price source for {}", token))
    }
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenerateConfig { output, interactive } = &cli.command {
        let config = if *interactive {
            create_config_interactive()?
        } else {
            RunnerConfig::default()
        };
        save_config(&config, output)?;
        print_success(&format!("Configuration generated: {:?}", output));
        return Ok(());
    }

    let config = ConfigLoader::new()
        .with_cli_config_path(cli.config.as_ref())
        .load()?;
    let _logging = init_logging(&config.logging)?;

    match &cli.command {
        Commands::Run {
            simulation,
            failure_rate,
        } => run(&config, cli.roster, *simulation, *failure_rate).await,
        Commands::Plan { format } => plan(&config, cli.roster, *format),
        Commands::Reset => reset(&config),
        Commands::GenerateConfig { .. } => Ok(()),
    }
}

fn load_accounts(config: &RunnerConfig, roster: Option<PathBuf>) -> Result<Vec<Account>> {
    let path = roster.unwrap_or_else(|| config.roster_path.clone());
    let roster = Roster::load(&path)?;
    Ok(build_accounts(roster, config, &mut rand::thread_rng())?)
}

fn plan(config: &RunnerConfig, roster: Option<PathBuf>, format: DisplayFormat) -> Result<()> {
    let accounts = load_accounts(config, roster)?;
    println!("{}", Renderer::new(format).render_plan(&accounts)?);
    Ok(())
}

fn reset(config: &RunnerConfig) -> Result<()> {
    let store = SessionStore::new(&config.state_file);
    if store.clear()? {
        print_success(&format!("Removed session state {:?}", store.path()));
    } else {
        print_info("No saved session");
    }
    Ok(())
}

async fn run(
    config: &RunnerConfig,
    roster: Option<PathBuf>,
    simulation: bool,
    failure_rate: f64,
) -> Result<()> {
    let accounts = load_accounts(config, roster)?;

    if simulation {
        print_warning("Simulation mode: no transaction is submitted");
    }
    let registry = if simulation {
        SimulatedAdapter::registry(failure_rate)
    } else {
        AdapterRegistry::new()
    };
    let gas: Arc<dyn GasOracle> = if simulation {
        Arc::new(FixedGasOracle { price_gwei: 0.0 })
    } else {
        Arc::new(RpcGasOracle::from_config(config)?)
    };
    let balances: Arc<dyn BalanceSource> = if simulation {
        Arc::new(SimulatedBalances::default())
    } else {
        Arc::new(NoBalances)
    };

    let spinner = create_spinner("Checking protocol adapters...");
    let coverage = check_coverage(&registry, &accounts);
    spinner.finish_and_clear();
    if let Err(e) = coverage {
        print_error(&e.to_string());
        if !simulation {
            print_info("This build links no live protocol adapters; use --simulation for a dry run");
        }
        return Err(e.into());
    }

    let sleeper = Sleeper::new();
    let operator = Arc::new(ConsoleOperator::new());
    let controller = Controller::new(
        registry,
        Arc::new(config.catalog.clone()),
        GasGate::new(gas, config.gas_poll_interval()),
        operator.clone(),
        sleeper.clone(),
    );
    let session = Session::new(
        Executor::new(controller, balances),
        operator,
        Arc::new(HttpProxyProbe::from_config(config)),
        SessionStore::new(&config.state_file),
        config.proxy_retry_interval(),
    );

    spawn_interrupt_listener(sleeper);
    print_info("Press Ctrl+C to skip the current wait, twice to quit");

    let summary = session.run(accounts).await?;
    println!("{}", Renderer::render_summary(&summary));
    Ok(())
}

/// Ctrl+C ends the wait in progress; a quick second one ends the process
fn spawn_interrupt_listener(sleeper: Sleeper) {
    tokio::spawn(async move {
        let mut last: Option<Instant> = None;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {}", e);
                return;
            }
            if last.is_some_and(|at| at.elapsed() < DOUBLE_INTERRUPT) {
                print_warning("Interrupted");
                std::process::exit(130);
            }
            last = Some(Instant::now());
            info!("Skipping the current wait");
            sleeper.skip();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_simulation() {
        let cli = Cli::parse_from(["chainrun", "--roster", "accounts.json", "run", "--simulation"]);
        assert_eq!(cli.roster, Some(PathBuf::from("accounts.json")));
        assert!(matches!(
            cli.command,
            Commands::Run { simulation: true, failure_rate } if failure_rate == 0.0
        ));
    }

    #[test]
    fn test_failure_rate_must_be_a_finite_share() {
        let cli = Cli::parse_from(["chainrun", "run", "-s", "--failure-rate", "0.25"]);
        assert!(matches!(cli.command, Commands::Run { failure_rate, .. } if failure_rate == 0.25));

        for rate in ["NaN", "inf", "-0.1", "1.5", "often"] {
            let parsed = Cli::try_parse_from(["chainrun", "run", "-s", "--failure-rate", rate]);
            assert!(parsed.is_err(), "{} accepted", rate);
        }
    }
}
