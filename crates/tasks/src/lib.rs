//! Task model for chainrun
//!
//! Vocabulary, validated settings, scripts with random blocks and the two
//! resolution passes that turn a roster into a concrete run plan.

pub mod account;
pub mod error;
pub mod params;
pub mod resolver;
pub mod sequencer;
pub mod task;
pub mod types;

pub use account::{short_identity, Account, ExchangeCredentials, Fingerprint, GasCeilings, SleepRange};
pub use error::{Imbalance, ResolveError, ResolveResult};
pub use params::{keys, Params, SettingValue};
pub use resolver::resolve;
pub use sequencer::{sequence, RosterEntry};
pub use task::{GroupParams, ScriptEntry, Task};
pub use types::{
    FunctionName, ModuleName, NetworkFamily, NetworkName, Token, TokenSelector, TransactionStatus,
    WalletVariant,
};
