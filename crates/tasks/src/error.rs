//! Error types for script resolution

use std::fmt;

use thiserror::Error;

/// Which side of a random block is unmatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Imbalance {
    /// An end marker with no open block
    DanglingEnd,

    /// A begin marker that is never closed
    Unterminated,

    /// A begin marker while another block is still open (account rosters only)
    NestedBegin,
}

impl fmt::Display for Imbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imbalance::DanglingEnd => write!(f, "end-random without a matching random"),
            Imbalance::Unterminated => write!(f, "random block is never closed"),
            Imbalance::NestedBegin => write!(f, "random block opened inside another one"),
        }
    }
}

/// Errors raised while validating or resolving a script
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    /// Random markers are not balanced
    #[error("unbalanced random group at entry {position}: {kind}")]
    UnbalancedGroup {
        /// Zero-based index of the offending entry
        position: usize,

        /// Kind of imbalance
        kind: Imbalance,
    },

    /// Setting name is not known
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    /// Setting value has the wrong shape
    #[error("invalid value {value} for setting {name}")]
    InvalidSetting {
        /// Setting name
        name: String,

        /// Offending value, as written
        value: String,
    },

    /// Name does not match any known vocabulary entry
    #[error("unknown {kind} name: {name}")]
    UnknownName {
        /// What was being parsed (token, network, module, function)
        kind: &'static str,

        /// The unparsed name
        name: String,
    },

    /// Function is not offered by the module
    #[error("function {function} is not available in module {module}")]
    UnsupportedFunction {
        /// Module name
        module: String,

        /// Function name
        function: String,
    },

    /// Module requires a function name
    #[error("function name must be specified for module {0}")]
    MissingFunction(String),
}

/// Result type for resolution
pub type ResolveResult<T> = Result<T, ResolveError>;
