//! Protocol adapters and their registry

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chainrun_tasks::{Account, FunctionName, ModuleName, NetworkName, Params, Task, TransactionStatus};

use crate::{ExecutionError, ExecutionResult};

/// Everything an adapter needs to submit one transaction
#[derive(Debug, Clone, Copy)]
pub struct AdapterCall<'a> {
    /// Account that signs
    pub account: &'a Account,

    /// Module being invoked
    pub module: ModuleName,

    /// Function being invoked, for multi-function modules
    pub function: Option<FunctionName>,

    /// Network the transaction targets
    pub network: NetworkName,

    /// Task settings, including the ones written by composite flows
    pub params: &'a Params,
}

/// Submits transactions for one protocol
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Execute the call and report its terminal status
    async fn execute(&self, call: &AdapterCall<'_>) -> anyhow::Result<TransactionStatus>;
}

/// Maps `(module, function)` to the adapter handling it
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(ModuleName, Option<FunctionName>), Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for every function of `module`
    pub fn register_module(&mut self, module: ModuleName, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert((module, None), adapter);
    }

    /// Register an adapter for a single function, taking precedence over
    /// the module-wide one
    pub fn register(
        &mut self,
        module: ModuleName,
        function: FunctionName,
        adapter: Arc<dyn ProtocolAdapter>,
    ) {
        self.adapters.insert((module, Some(function)), adapter);
    }

    pub fn get(
        &self,
        module: ModuleName,
        function: Option<FunctionName>,
    ) -> Option<&Arc<dyn ProtocolAdapter>> {
        function
            .and_then(|f| self.adapters.get(&(module, Some(f))))
            .or_else(|| self.adapters.get(&(module, None)))
    }

    /// Functions a task ends up invoking, composite flows included
    fn invoked_functions(task: &Task) -> Vec<Option<FunctionName>> {
        use FunctionName::*;
        match (task.module, task.function) {
            (ModuleName::Sleep, _) => Vec::new(),
            (ModuleName::ZkLend, _) => vec![Some(Supply), Some(Borrow), Some(Repay), Some(Withdraw)],
            (_, Some(Pool)) => vec![Some(AddLiquidity), Some(RemoveLiquidity)],
            (_, function) => vec![function],
        }
    }

    /// Fail when any task would reach a module without an adapter
    pub fn ensure_coverage<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> ExecutionResult<()> {
        for task in tasks {
            for function in Self::invoked_functions(task) {
                if self.get(task.module, function).is_none() {
                    return Err(ExecutionError::MissingAdapter {
                        module: task.module,
                        function,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .adapters
            .keys()
            .map(|(module, function)| match function {
                Some(function) => format!("{} {}", module, function),
                None => module.to_string(),
            })
            .collect();
        keys.sort();
        f.debug_struct("AdapterRegistry").field("adapters", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAdapter;

    #[test]
    fn test_function_entry_takes_precedence() {
        let module_wide = ScriptedAdapter::always(TransactionStatus::Success);
        let specific = ScriptedAdapter::always(TransactionStatus::Failed);

        let mut registry = AdapterRegistry::new();
        registry.register_module(ModuleName::JediSwap, module_wide.clone());
        registry.register(ModuleName::JediSwap, FunctionName::AddLiquidity, specific.clone());

        let found = registry.get(ModuleName::JediSwap, Some(FunctionName::AddLiquidity)).unwrap();
        assert_eq!(Arc::as_ptr(found) as *const (), Arc::as_ptr(&specific) as *const ());

        let found = registry.get(ModuleName::JediSwap, Some(FunctionName::Swap)).unwrap();
        assert_eq!(Arc::as_ptr(found) as *const (), Arc::as_ptr(&module_wide) as *const ());

        assert!(registry.get(ModuleName::Avnu, None).is_none());
    }

    #[test]
    fn test_coverage_includes_composite_functions() {
        let mut registry = AdapterRegistry::new();
        registry.register(
            ModuleName::JediSwap,
            FunctionName::AddLiquidity,
            ScriptedAdapter::always(TransactionStatus::Success),
        );

        let pool = Task::new(ModuleName::JediSwap).with_function(FunctionName::Pool);
        let delay = Task::new(ModuleName::Sleep);
        assert!(matches!(
            registry.ensure_coverage([&delay, &pool]),
            Err(ExecutionError::MissingAdapter {
                module: ModuleName::JediSwap,
                function: Some(FunctionName::RemoveLiquidity),
            })
        ));

        registry.register_module(ModuleName::JediSwap, ScriptedAdapter::always(TransactionStatus::Success));
        assert!(registry.ensure_coverage([&delay, &pool]).is_ok());
    }
}
