//! Vocabulary shared by every chainrun crate
//!
//! Tokens, networks, modules, functions and the fixed status vocabulary that
//! protocol adapters report back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Case-insensitive lookup over a fixed name table
fn lookup<T: Copy>(
    table: &[(T, &'static str)],
    kind: &'static str,
    name: &str,
) -> Result<T, ResolveError> {
    let wanted = name.trim();
    table
        .iter()
        .find(|(_, candidate)| candidate.eq_ignore_ascii_case(wanted))
        .map(|(value, _)| *value)
        .ok_or_else(|| ResolveError::UnknownName {
            kind,
            name: wanted.to_string(),
        })
}

fn name_of<T: PartialEq>(table: &[(T, &'static str)], value: &T) -> &'static str {
    table
        .iter()
        .find(|(candidate, _)| candidate == value)
        .map(|(_, name)| *name)
        .unwrap_or("?")
}

/// Tradable token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Token {
    Eth,
    Dai,
    Usdc,
    Usdt,
    Wbtc,
}

const TOKEN_NAMES: [(Token, &str); 5] = [
    (Token::Eth, "ETH"),
    (Token::Dai, "DAI"),
    (Token::Usdc, "USDC"),
    (Token::Usdt, "USDT"),
    (Token::Wbtc, "WBTC"),
];

impl Token {
    /// Every known token
    pub const ALL: [Token; 5] = [Token::Eth, Token::Dai, Token::Usdc, Token::Usdt, Token::Wbtc];

    /// Whether the token is pegged to the dollar
    pub fn is_stablecoin(&self) -> bool {
        matches!(self, Token::Dai | Token::Usdc | Token::Usdt)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(name_of(&TOKEN_NAMES, self))
    }
}

impl FromStr for Token {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&TOKEN_NAMES, "token", s)
    }
}

impl TryFrom<String> for Token {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.to_string()
    }
}

/// Token as written in a start/end setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TokenSelector {
    /// A concrete token
    Token(Token),

    /// Uniformly random among the available tokens
    Random,

    /// Whatever the previous swap of this account ended on
    Last,

    /// Every owned token above the balance floor (start only)
    All,
}

impl fmt::Display for TokenSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSelector::Token(token) => token.fmt(f),
            TokenSelector::Random => f.write_str("Random"),
            TokenSelector::Last => f.write_str("Last"),
            TokenSelector::All => f.write_str("All"),
        }
    }
}

impl FromStr for TokenSelector {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(TokenSelector::Random),
            "last" => Ok(TokenSelector::Last),
            "all" => Ok(TokenSelector::All),
            _ => s.parse().map(TokenSelector::Token),
        }
    }
}

impl TryFrom<String> for TokenSelector {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenSelector> for String {
    fn from(selector: TokenSelector) -> Self {
        selector.to_string()
    }
}

impl From<Token> for TokenSelector {
    fn from(token: Token) -> Self {
        TokenSelector::Token(token)
    }
}

/// Gas pricing family a network belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
    /// Ethereum L1 and its testnets
    Ethereum,

    /// Starknet and its testnets
    Starknet,
}

/// Network a task runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkName {
    Ethereum,
    Goerli,
    Arbitrum,
    ArbitrumTestnet,
    Optimism,
    OptimismTestnet,
    Starknet,
    StarknetTestnet,
    /// Centralized exchange account, no chain involved
    Exchange,
}

const NETWORK_NAMES: [(NetworkName, &str); 9] = [
    (NetworkName::Ethereum, "ETH"),
    (NetworkName::Goerli, "Goerli"),
    (NetworkName::Arbitrum, "Arbitrum"),
    (NetworkName::ArbitrumTestnet, "ArbitrumTestnet"),
    (NetworkName::Optimism, "Optimism"),
    (NetworkName::OptimismTestnet, "OptimismTestnet"),
    (NetworkName::Starknet, "Starknet"),
    (NetworkName::StarknetTestnet, "StarknetTestnet"),
    (NetworkName::Exchange, "Exchange"),
];

impl NetworkName {
    /// Gas family used for admission control, if any
    pub fn family(&self) -> Option<NetworkFamily> {
        match self {
            NetworkName::Ethereum | NetworkName::Goerli => Some(NetworkFamily::Ethereum),
            NetworkName::Starknet | NetworkName::StarknetTestnet => Some(NetworkFamily::Starknet),
            _ => None,
        }
    }

    /// Token used to pay fees on this network
    pub fn native_token(&self) -> Token {
        Token::Eth
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(name_of(&NETWORK_NAMES, self))
    }
}

impl FromStr for NetworkName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ethereum") {
            return Ok(NetworkName::Ethereum);
        }
        lookup(&NETWORK_NAMES, "network", s)
    }
}

impl TryFrom<String> for NetworkName {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkName> for String {
    fn from(network: NetworkName) -> Self {
        network.to_string()
    }
}

/// Sub-operation of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FunctionName {
    Swap,
    Pool,
    AddLiquidity,
    RemoveLiquidity,
    Supply,
    Borrow,
    Repay,
    Withdraw,
    DepositToOkx,
    WithdrawFromOkx,
    SubsToMain,
    DepositToStarknet,
    WithdrawFromStarknet,
}

const FUNCTION_NAMES: [(FunctionName, &str); 13] = [
    (FunctionName::Swap, "SWAP"),
    (FunctionName::Pool, "POOL"),
    (FunctionName::AddLiquidity, "ADD_LIQUIDITY"),
    (FunctionName::RemoveLiquidity, "REMOVE_LIQUIDITY"),
    (FunctionName::Supply, "SUPPLY"),
    (FunctionName::Borrow, "BORROW"),
    (FunctionName::Repay, "REPAY"),
    (FunctionName::Withdraw, "WITHDRAW"),
    (FunctionName::DepositToOkx, "DEPOSIT_TO_OKX"),
    (FunctionName::WithdrawFromOkx, "WITHDRAW_FROM_OKX"),
    (FunctionName::SubsToMain, "SUBS_TO_MAIN"),
    (FunctionName::DepositToStarknet, "DEPOSIT_TO_STARKNET"),
    (FunctionName::WithdrawFromStarknet, "WITHDRAW_FROM_STARKNET"),
];

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(name_of(&FUNCTION_NAMES, self))
    }
}

impl FromStr for FunctionName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&FUNCTION_NAMES, "function", s)
    }
}

impl TryFrom<String> for FunctionName {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FunctionName> for String {
    fn from(function: FunctionName) -> Self {
        function.to_string()
    }
}

/// Named blockchain-interaction capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModuleName {
    Avnu,
    Deploy,
    Dmail,
    Fibrous,
    JediSwap,
    LayerSwap,
    MySwap,
    Okx,
    Orbiter,
    Sleep,
    StarkGate,
    StarknetId,
    StarkVerse,
    TenKSwap,
    Upgrade,
    ZkLend,
}

const MODULE_NAMES: [(ModuleName, &str); 16] = [
    (ModuleName::Avnu, "Avnu"),
    (ModuleName::Deploy, "Deploy"),
    (ModuleName::Dmail, "Dmail"),
    (ModuleName::Fibrous, "Fibrous"),
    (ModuleName::JediSwap, "JediSwap"),
    (ModuleName::LayerSwap, "LayerSwap"),
    (ModuleName::MySwap, "mySwap"),
    (ModuleName::Okx, "OKX"),
    (ModuleName::Orbiter, "Orbiter"),
    (ModuleName::Sleep, "Sleep"),
    (ModuleName::StarkGate, "StarkGate"),
    (ModuleName::StarknetId, "StarknetID"),
    (ModuleName::StarkVerse, "StarkVerse"),
    (ModuleName::TenKSwap, "10KSwap"),
    (ModuleName::Upgrade, "Upgrade"),
    (ModuleName::ZkLend, "zkLend"),
];

impl ModuleName {
    /// Every known module
    pub const ALL: [ModuleName; 16] = [
        ModuleName::Avnu,
        ModuleName::Deploy,
        ModuleName::Dmail,
        ModuleName::Fibrous,
        ModuleName::JediSwap,
        ModuleName::LayerSwap,
        ModuleName::MySwap,
        ModuleName::Okx,
        ModuleName::Orbiter,
        ModuleName::Sleep,
        ModuleName::StarkGate,
        ModuleName::StarknetId,
        ModuleName::StarkVerse,
        ModuleName::TenKSwap,
        ModuleName::Upgrade,
        ModuleName::ZkLend,
    ];

    /// Functions a task for this module may name. Empty means the module
    /// takes no function name.
    pub fn functions(&self) -> &'static [FunctionName] {
        use FunctionName::*;
        match self {
            ModuleName::JediSwap | ModuleName::MySwap | ModuleName::TenKSwap => &[Swap, Pool],
            ModuleName::LayerSwap | ModuleName::Orbiter | ModuleName::StarkGate => {
                &[DepositToStarknet, WithdrawFromStarknet]
            }
            ModuleName::Okx => &[DepositToOkx, WithdrawFromOkx, SubsToMain],
            _ => &[],
        }
    }

    /// Modules whose single action may be repeated a random number of times
    pub fn is_repeatable(&self) -> bool {
        matches!(self, ModuleName::Dmail | ModuleName::StarknetId | ModuleName::StarkVerse)
    }

    /// Check that `function` is valid for this module
    pub fn check_function(&self, function: Option<FunctionName>) -> Result<(), ResolveError> {
        let offered = self.functions();
        match function {
            Some(function) if !offered.contains(&function) => Err(ResolveError::UnsupportedFunction {
                module: self.to_string(),
                function: function.to_string(),
            }),
            None if !offered.is_empty() => Err(ResolveError::MissingFunction(self.to_string())),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(name_of(&MODULE_NAMES, self))
    }
}

impl FromStr for ModuleName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(&MODULE_NAMES, "module", s)
    }
}

impl TryFrom<String> for ModuleName {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModuleName> for String {
    fn from(module: ModuleName) -> Self {
        module.to_string()
    }
}

/// Terminal status reported by a protocol adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    InsufficientLiquidity,
    InsufficientBalance,
    Failed,
    NoLiquidities,
    NoCollections,
    LimitReached,
    IncorrectNetwork,
    AddressNotAllowlisted,
}

impl TransactionStatus {
    /// Outcomes that need a human before the run continues
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            TransactionStatus::InsufficientBalance
                | TransactionStatus::AddressNotAllowlisted
                | TransactionStatus::IncorrectNetwork
        )
    }

    pub fn is_success(&self) -> bool {
        *self == TransactionStatus::Success
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            TransactionStatus::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::NoLiquidities => "NO_LIQUIDITIES",
            TransactionStatus::NoCollections => "NO_COLLECTIONS",
            TransactionStatus::LimitReached => "LIMIT_REACHED",
            TransactionStatus::IncorrectNetwork => "INCORRECT_NETWORK",
            TransactionStatus::AddressNotAllowlisted => "ADDRESS_NOT_ALLOWLISTED",
        };
        f.write_str(name)
    }
}

/// Wallet contract flavour of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WalletVariant {
    ArgentX,
    ArgentXOld,
    #[default]
    Braavos,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_case_insensitively() {
        assert_eq!("usdc".parse::<Token>().unwrap(), Token::Usdc);
        assert_eq!("10kswap".parse::<ModuleName>().unwrap(), ModuleName::TenKSwap);
        assert_eq!("zklend".parse::<ModuleName>().unwrap(), ModuleName::ZkLend);
        assert_eq!("add_liquidity".parse::<FunctionName>().unwrap(), FunctionName::AddLiquidity);
        assert_eq!("ethereum".parse::<NetworkName>().unwrap(), NetworkName::Ethereum);
        assert_eq!("eth".parse::<NetworkName>().unwrap(), NetworkName::Ethereum);
        assert!("DOGE".parse::<Token>().is_err());
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("random".parse::<TokenSelector>().unwrap(), TokenSelector::Random);
        assert_eq!("All".parse::<TokenSelector>().unwrap(), TokenSelector::All);
        assert_eq!("WBTC".parse::<TokenSelector>().unwrap(), TokenSelector::Token(Token::Wbtc));
    }

    #[test]
    fn test_module_functions() {
        assert!(ModuleName::JediSwap.check_function(Some(FunctionName::Pool)).is_ok());
        assert!(ModuleName::Avnu.check_function(None).is_ok());
        assert!(matches!(
            ModuleName::JediSwap.check_function(None),
            Err(ResolveError::MissingFunction(_))
        ));
        assert!(matches!(
            ModuleName::Dmail.check_function(Some(FunctionName::Swap)),
            Err(ResolveError::UnsupportedFunction { .. })
        ));
    }

    #[test]
    fn test_critical_statuses() {
        assert!(TransactionStatus::InsufficientBalance.is_critical());
        assert!(TransactionStatus::IncorrectNetwork.is_critical());
        assert!(TransactionStatus::AddressNotAllowlisted.is_critical());
        assert!(!TransactionStatus::Failed.is_critical());
        assert!(!TransactionStatus::Success.is_critical());
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&ModuleName::TenKSwap).unwrap();
        assert_eq!(json, "\"10KSwap\"");
        let status: TransactionStatus = serde_json::from_str("\"INSUFFICIENT_BALANCE\"").unwrap();
        assert_eq!(status, TransactionStatus::InsufficientBalance);
    }
}
