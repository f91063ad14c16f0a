//! Configuration for chainrun
//!
//! Runner settings are layered with the `config` crate (defaults, file,
//! environment). The account roster is a separate file read directly.

pub mod catalog;
pub mod error;
pub mod loader;
pub mod roster;
pub mod schema;

pub use catalog::{ModuleCatalog, NetworkRoute, PairSet, RouteEntry};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use roster::{AccountSpec, Roster};
pub use schema::{RpcEndpoint, RunnerConfig};
