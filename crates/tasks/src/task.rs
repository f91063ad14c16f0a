//! Tasks and script entries

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolveResult;
use crate::params::{keys, Params, SettingValue};
use crate::types::{FunctionName, ModuleName};

/// One module invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Module to invoke
    pub module: ModuleName,

    /// Sub-operation, for modules that offer several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionName>,

    /// Validated settings, mutated in place by composite flows
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl Task {
    pub fn new(module: ModuleName) -> Self {
        Self {
            module,
            function: None,
            params: Params::new(),
        }
    }

    pub fn with_function(mut self, function: FunctionName) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_param(mut self, name: &str, value: SettingValue) -> Self {
        self.params.set(name, value);
        self
    }

    /// Check the function name against the module's offering
    pub fn validate(&self) -> ResolveResult<()> {
        self.module.check_function(self.function)
    }

    pub fn is_mandatory(&self) -> bool {
        self.params.is_mandatory()
    }

    /// Whether this is an operator-visible delay rather than a chain action
    pub fn is_delay(&self) -> bool {
        self.module == ModuleName::Sleep
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function {
            Some(function) => write!(f, "{} {}", self.module, function)?,
            None => write!(f, "{}", self.module)?,
        }
        if self.is_delay() {
            if let Some(seconds) = self.params.f64(keys::SLEEP_TIME) {
                write!(f, " ({}s)", seconds)?;
            }
        }
        Ok(())
    }
}

/// Parameters of a random block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParams {
    /// Lower bound of the drawn item count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<usize>,

    /// Upper bound of the drawn item count, defaults to the group size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<usize>,

    /// Sample with replacement
    #[serde(default)]
    pub repeat: bool,

    /// The resulting group survives selection in its parent block
    #[serde(default)]
    pub mandatory: bool,
}

impl GroupParams {
    pub fn between(min_amount: usize, max_amount: usize) -> Self {
        Self {
            min_amount: Some(min_amount),
            max_amount: Some(max_amount),
            ..Self::default()
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// One line of an account script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptEntry {
    /// A concrete task
    Task(Task),

    /// Opens a random block
    BeginRandom(GroupParams),

    /// Closes the innermost open random block
    EndRandom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Token;

    #[test]
    fn test_script_entries_deserialize_from_yaml() {
        let yaml = r#"
- task:
    module: JediSwap
    function: SWAP
    params:
      swaps: 2
      end_token: USDC
- begin_random:
    max_amount: 1
    mandatory: true
- task:
    module: Dmail
- end_random
"#;
        let entries: Vec<ScriptEntry> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(entries.len(), 4);

        let ScriptEntry::Task(swap) = &entries[0] else {
            panic!("expected a task");
        };
        assert_eq!(swap.module, ModuleName::JediSwap);
        assert_eq!(swap.function, Some(FunctionName::Swap));
        assert_eq!(swap.params.token(keys::END_TOKEN), Some(Token::Usdc));

        assert_eq!(
            entries[1],
            ScriptEntry::BeginRandom(GroupParams {
                max_amount: Some(1),
                mandatory: true,
                ..GroupParams::default()
            })
        );
        assert_eq!(entries[3], ScriptEntry::EndRandom);
    }

    #[test]
    fn test_unknown_setting_fails_deserialization() {
        let yaml = "task:\n  module: Avnu\n  params:\n    turbo: yes\n";
        assert!(serde_yaml::from_str::<ScriptEntry>(yaml).is_err());
    }

    #[test]
    fn test_display() {
        let task = Task::new(ModuleName::Okx).with_function(FunctionName::SubsToMain);
        assert_eq!(task.to_string(), "OKX SUBS_TO_MAIN");
        let delay = Task::new(ModuleName::Sleep).with_param(keys::SLEEP_TIME, SettingValue::Number(30.0));
        assert_eq!(delay.to_string(), "Sleep (30s)");
    }
}
