//! Turning a roster into the concrete accounts of one run

use chainrun_config::{Roster, RunnerConfig};
use chainrun_execution::AdapterRegistry;
use chainrun_tasks::{resolve, sequence, Account};
use rand::Rng;
use tracing::debug;

use crate::CoreResult;

/// Order the roster's random spans, then resolve every account's script
pub fn build_accounts<R: Rng + ?Sized>(
    roster: Roster,
    config: &RunnerConfig,
    rng: &mut R,
) -> CoreResult<Vec<Account>> {
    let specs = sequence(roster.accounts, rng)?;

    let mut accounts = Vec::with_capacity(specs.len());
    for spec in specs {
        let tasks = resolve(&spec.script, rng)?;
        let account = spec.into_account(tasks, config);
        debug!(account = %account.short_identity(), tasks = account.tasks.len(), "Account planned");
        accounts.push(account);
    }
    Ok(accounts)
}

/// Fails when any planned task has no adapter behind it
pub fn check_coverage(registry: &AdapterRegistry, accounts: &[Account]) -> CoreResult<()> {
    registry.ensure_coverage(accounts.iter().flat_map(|account| account.tasks.iter()))?;
    Ok(())
}
