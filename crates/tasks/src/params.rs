//! Validated task settings
//!
//! Raw settings arrive as loosely typed key/value pairs. They are checked
//! against the known-setting table once, at load time, and afterwards read
//! through typed accessors that carry the defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResolveError, ResolveResult};
use crate::types::{NetworkName, Token, TokenSelector};

/// Setting names understood by the engine
pub mod keys {
    pub const SWAP_TOKENS: &str = "swap_tokens";
    pub const POOL_TOKENS: &str = "pool_tokens";
    pub const EXCLUDE_TOKENS: &str = "exclude_tokens";
    pub const START_TOKEN: &str = "start_token";
    pub const END_TOKEN: &str = "end_token";
    pub const SWAPS: &str = "swaps";
    pub const WAIT_FOR_RECEIVE: &str = "wait_for_receive";
    pub const MANDATORY: &str = "mandatory";
    pub const REPEAT: &str = "repeat";
    pub const DESTINATION_ADDRESS: &str = "destination_address";
    pub const TO_NETWORK: &str = "to_network";
    pub const FROM_NETWORK: &str = "from_network";
    pub const MIN_PERCENTAGE: &str = "min_percentage";
    pub const MAX_PERCENTAGE: &str = "max_percentage";
    pub const MIN_SUPPLY_PERCENTAGE: &str = "min_supply_percentage";
    pub const MAX_SUPPLY_PERCENTAGE: &str = "max_supply_percentage";
    pub const MIN_BORROW_PERCENTAGE: &str = "min_borrow_percentage";
    pub const MAX_BORROW_PERCENTAGE: &str = "max_borrow_percentage";
    pub const MIN_WITHDRAW_PERCENTAGE: &str = "min_withdraw_percentage";
    pub const MAX_WITHDRAW_PERCENTAGE: &str = "max_withdraw_percentage";
    pub const SLIPPAGE: &str = "slippage";
    pub const MAX_PRICE: &str = "max_price";
    pub const MIN_AMOUNT: &str = "min_amount";
    pub const MAX_AMOUNT: &str = "max_amount";
    pub const SLEEP_TIME: &str = "sleep_time";
    pub const MIN_SLEEP_TIME: &str = "min_sleep_time";
    pub const MAX_SLEEP_TIME: &str = "max_sleep_time";
    pub const MIN_AMOUNT_USD: &str = "min_amount_usd";
    pub const MAX_AMOUNT_USD: &str = "max_amount_usd";
    pub const MIN_WITHDRAW_SLEEP_TIME: &str = "min_withdraw_sleep_time";
    pub const MAX_WITHDRAW_SLEEP_TIME: &str = "max_withdraw_sleep_time";
    pub const MIN_DEPOSIT_AMOUNT: &str = "min_deposit_amount";

    // Written by the engine while executing, never by a script author
    pub const FROM_TOKEN: &str = "from_token";
    pub const TO_TOKEN: &str = "to_token";
    pub const FIRST_TOKEN: &str = "first_token";
    pub const SECOND_TOKEN: &str = "second_token";
    pub const WITHDRAW_PERCENTAGE: &str = "withdraw_percentage";
}

/// Shape a known setting must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingKind {
    TokenList,
    Token,
    Integer,
    Boolean,
    Text,
    Network,
    Float,
}

fn setting_kind(name: &str) -> Option<SettingKind> {
    use keys::*;
    let kind = match name {
        SWAP_TOKENS | POOL_TOKENS | EXCLUDE_TOKENS => SettingKind::TokenList,
        START_TOKEN | END_TOKEN => SettingKind::Token,
        SWAPS => SettingKind::Integer,
        WAIT_FOR_RECEIVE | MANDATORY | REPEAT => SettingKind::Boolean,
        DESTINATION_ADDRESS => SettingKind::Text,
        TO_NETWORK | FROM_NETWORK => SettingKind::Network,
        MIN_PERCENTAGE | MAX_PERCENTAGE | MIN_SUPPLY_PERCENTAGE | MAX_SUPPLY_PERCENTAGE
        | MIN_BORROW_PERCENTAGE | MAX_BORROW_PERCENTAGE | MIN_WITHDRAW_PERCENTAGE
        | MAX_WITHDRAW_PERCENTAGE | SLIPPAGE | MAX_PRICE | MIN_AMOUNT | MAX_AMOUNT | SLEEP_TIME
        | MIN_SLEEP_TIME | MAX_SLEEP_TIME | MIN_AMOUNT_USD | MAX_AMOUNT_USD
        | MIN_WITHDRAW_SLEEP_TIME | MAX_WITHDRAW_SLEEP_TIME | MIN_DEPOSIT_AMOUNT => SettingKind::Float,
        _ => return None,
    };
    Some(kind)
}

/// A single typed setting value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Number(f64),
    Integer(u64),
    Bool(bool),
    Text(String),
    Token(TokenSelector),
    Tokens(BTreeSet<Token>),
    Network(NetworkName),
}

impl SettingValue {
    fn to_json(&self) -> Value {
        match self {
            SettingValue::Number(value) => Value::from(*value),
            SettingValue::Integer(value) => Value::from(*value),
            SettingValue::Bool(value) => Value::from(*value),
            SettingValue::Text(value) => Value::from(value.clone()),
            SettingValue::Token(selector) => Value::from(selector.to_string()),
            SettingValue::Tokens(tokens) => {
                Value::Array(tokens.iter().map(|t| Value::from(t.to_string())).collect())
            }
            SettingValue::Network(network) => Value::from(network.to_string()),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Tokens(tokens) => {
                let names: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", names.join(" "))
            }
            SettingValue::Text(value) => f.write_str(value),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn invalid(name: &str, value: &Value) -> ResolveError {
    ResolveError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_value(name: &str, kind: SettingKind, raw: &Value) -> ResolveResult<SettingValue> {
    let parsed = match (kind, raw) {
        (SettingKind::TokenList, Value::String(list)) => SettingValue::Tokens(
            list.split_whitespace()
                .map(str::parse)
                .collect::<ResolveResult<_>>()?,
        ),
        (SettingKind::TokenList, Value::Array(items)) => {
            let mut tokens = BTreeSet::new();
            for item in items {
                let name_str = item.as_str().ok_or_else(|| invalid(name, raw))?;
                tokens.insert(name_str.parse()?);
            }
            SettingValue::Tokens(tokens)
        }
        (SettingKind::Token, Value::String(token)) => SettingValue::Token(token.parse()?),
        (SettingKind::Integer, Value::Number(n)) => {
            SettingValue::Integer(n.as_u64().ok_or_else(|| invalid(name, raw))?)
        }
        (SettingKind::Integer, Value::String(s)) => {
            SettingValue::Integer(s.trim().parse().map_err(|_| invalid(name, raw))?)
        }
        (SettingKind::Boolean, Value::Bool(b)) => SettingValue::Bool(*b),
        (SettingKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => SettingValue::Bool(true),
            "no" | "false" => SettingValue::Bool(false),
            _ => return Err(invalid(name, raw)),
        },
        (SettingKind::Text, Value::String(s)) => SettingValue::Text(s.trim().to_string()),
        (SettingKind::Network, Value::String(s)) => SettingValue::Network(s.parse()?),
        (SettingKind::Float, Value::Number(n)) => {
            SettingValue::Number(n.as_f64().ok_or_else(|| invalid(name, raw))?)
        }
        (SettingKind::Float, Value::String(s)) => SettingValue::Number(
            s.trim()
                .replace(',', ".")
                .parse()
                .map_err(|_| invalid(name, raw))?,
        ),
        _ => return Err(invalid(name, raw)),
    };
    Ok(parsed)
}

/// Validated settings of one task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct Params {
    values: BTreeMap<String, SettingValue>,
}

impl Params {
    /// Create an empty settings map
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw settings against the known-setting table
    pub fn from_raw(raw: BTreeMap<String, Value>) -> ResolveResult<Self> {
        let mut values = BTreeMap::new();
        for (name, value) in raw {
            let key = name.trim().to_ascii_lowercase();
            let kind = setting_kind(&key).ok_or_else(|| ResolveError::UnknownSetting(key.clone()))?;
            let parsed = parse_value(&key, kind, &value)?;
            values.insert(key, parsed);
        }
        Ok(Self { values })
    }

    /// Builder-style insert, mostly for tests and engine-written settings
    pub fn with(mut self, name: &str, value: SettingValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: SettingValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<SettingValue> {
        self.values.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.values.iter()
    }

    /// Numeric setting, integers widened
    pub fn f64(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            SettingValue::Number(value) => Some(*value),
            SettingValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> f64 {
        self.f64(name).unwrap_or(default)
    }

    /// Count-like setting; fractional values are truncated
    pub fn usize(&self, name: &str) -> Option<usize> {
        self.f64(name).map(|value| value.max(0.0) as usize)
    }

    pub fn usize_or(&self, name: &str, default: usize) -> usize {
        self.usize(name).unwrap_or(default)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(SettingValue::Bool(value)) => *value,
            _ => default,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            SettingValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn selector_or(&self, name: &str, default: TokenSelector) -> TokenSelector {
        match self.values.get(name) {
            Some(SettingValue::Token(selector)) => *selector,
            _ => default,
        }
    }

    /// Concrete token setting
    pub fn token(&self, name: &str) -> Option<Token> {
        match self.values.get(name)? {
            SettingValue::Token(TokenSelector::Token(token)) => Some(*token),
            _ => None,
        }
    }

    pub fn set_token(&mut self, name: &str, token: Token) {
        self.set(name, SettingValue::Token(TokenSelector::Token(token)));
    }

    pub fn tokens(&self, name: &str) -> Option<&BTreeSet<Token>> {
        match self.values.get(name)? {
            SettingValue::Tokens(tokens) => Some(tokens),
            _ => None,
        }
    }

    pub fn network(&self, name: &str) -> Option<NetworkName> {
        match self.values.get(name)? {
            SettingValue::Network(network) => Some(*network),
            _ => None,
        }
    }

    /// Whether the item must survive random-subset selection
    pub fn is_mandatory(&self) -> bool {
        self.bool_or(keys::MANDATORY, false)
    }
}

impl TryFrom<BTreeMap<String, Value>> for Params {
    type Error = ResolveError;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        Params::from_raw(raw)
    }
}

impl From<Params> for BTreeMap<String, Value> {
    fn from(params: Params) -> Self {
        params
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_raw_types_every_kind() {
        let params = Params::from_raw(raw(json!({
            "swap_tokens": "ETH USDC dai",
            "start_token": "random",
            "swaps": 3,
            "mandatory": "yes",
            "to_network": "Arbitrum",
            "min_percentage": "12,5",
            "max_percentage": 40,
            "destination_address": " 0xabc ",
        })))
        .unwrap();

        let tokens = params.tokens(keys::SWAP_TOKENS).unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains(&Token::Dai));
        assert_eq!(params.selector_or(keys::START_TOKEN, TokenSelector::All), TokenSelector::Random);
        assert_eq!(params.usize_or(keys::SWAPS, 5), 3);
        assert!(params.is_mandatory());
        assert_eq!(params.network(keys::TO_NETWORK), Some(NetworkName::Arbitrum));
        assert_eq!(params.f64(keys::MIN_PERCENTAGE), Some(12.5));
        assert_eq!(params.f64(keys::MAX_PERCENTAGE), Some(40.0));
        assert_eq!(params.text(keys::DESTINATION_ADDRESS), Some("0xabc"));
    }

    #[test]
    fn test_unknown_setting_is_rejected() {
        let err = Params::from_raw(raw(json!({ "speed": 3 }))).unwrap_err();
        assert_eq!(err, ResolveError::UnknownSetting("speed".to_string()));
    }

    #[test]
    fn test_mistyped_value_is_rejected() {
        assert!(matches!(
            Params::from_raw(raw(json!({ "repeat": "maybe" }))),
            Err(ResolveError::InvalidSetting { .. })
        ));
        assert!(matches!(
            Params::from_raw(raw(json!({ "swaps": "many" }))),
            Err(ResolveError::InvalidSetting { .. })
        ));
        assert!(matches!(
            Params::from_raw(raw(json!({ "exclude_tokens": "ETH DOGE" }))),
            Err(ResolveError::UnknownName { kind: "token", .. })
        ));
    }

    #[test]
    fn test_defaults_apply_when_missing() {
        let params = Params::new();
        assert_eq!(params.f64_or(keys::MIN_PERCENTAGE, 1.0), 1.0);
        assert_eq!(params.selector_or(keys::END_TOKEN, Token::Eth.into()), TokenSelector::Token(Token::Eth));
        assert!(!params.is_mandatory());
    }

    #[test]
    fn test_serde_round_trip_through_raw_form() {
        let params = Params::new()
            .with(keys::SWAPS, SettingValue::Integer(2))
            .with(keys::EXCLUDE_TOKENS, SettingValue::Tokens([Token::Wbtc].into_iter().collect()));
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, json!({ "swaps": 2, "exclude_tokens": ["WBTC"] }));
        let back: Params = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }
}
