//! Module catalog
//!
//! Which network each module (or module function) runs on, and which token
//! pairs and liquidity pools every swap module offers per network. The
//! defaults describe Starknet mainnet.

use std::collections::HashSet;
use std::fmt;

use chainrun_tasks::{FunctionName, ModuleName, NetworkName, ResolveError, Token};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Where a module's transactions go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkRoute {
    /// Always this network
    Fixed(NetworkName),

    /// Read from the task's `from_network` setting
    DefinedInParams,
}

const DEFINED_IN_PARAMS: &str = "DefinedInParams";

impl fmt::Display for NetworkRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkRoute::Fixed(network) => network.fmt(f),
            NetworkRoute::DefinedInParams => f.write_str(DEFINED_IN_PARAMS),
        }
    }
}

impl TryFrom<String> for NetworkRoute {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case(DEFINED_IN_PARAMS) {
            return Ok(NetworkRoute::DefinedInParams);
        }
        value.parse().map(NetworkRoute::Fixed)
    }
}

impl From<NetworkRoute> for String {
    fn from(route: NetworkRoute) -> Self {
        route.to_string()
    }
}

/// Network routing of a module, or of one of its functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub module: ModuleName,

    /// Applies to every function when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionName>,

    pub network: NetworkRoute,
}

/// Token pairs a module offers on one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSet {
    pub module: ModuleName,
    pub network: NetworkName,
    pub pairs: Vec<(Token, Token)>,
}

/// Static knowledge about modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCatalog {
    /// Network routing
    pub routes: Vec<RouteEntry>,

    /// Swappable pairs
    pub swap_pairs: Vec<PairSet>,

    /// Liquidity pools
    pub pools: Vec<PairSet>,
}

impl ModuleCatalog {
    /// Routing for `module`/`function`; a function-specific entry wins
    pub fn route(&self, module: ModuleName, function: Option<FunctionName>) -> Option<NetworkRoute> {
        let mut fallback = None;
        for entry in self.routes.iter().filter(|entry| entry.module == module) {
            match entry.function {
                Some(f) if Some(f) == function => return Some(entry.network),
                None => fallback = Some(entry.network),
                _ => {}
            }
        }
        fallback
    }

    pub fn swap_pairs(&self, module: ModuleName, network: NetworkName) -> &[(Token, Token)] {
        Self::find(&self.swap_pairs, module, network)
    }

    pub fn pools(&self, module: ModuleName, network: NetworkName) -> &[(Token, Token)] {
        Self::find(&self.pools, module, network)
    }

    /// Whether `module` swaps through the token graph
    pub fn is_swap_module(&self, module: ModuleName) -> bool {
        self.swap_pairs.iter().any(|set| set.module == module)
    }

    fn find(sets: &[PairSet], module: ModuleName, network: NetworkName) -> &[(Token, Token)] {
        sets.iter()
            .find(|set| set.module == module && set.network == network)
            .map(|set| set.pairs.as_slice())
            .unwrap_or(&[])
    }

    /// Check routes against the functions each module offers
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.routes {
            if let Some(function) = entry.function {
                if !entry.module.functions().contains(&function) {
                    return Err(ConfigError::ValidationError(format!(
                        "catalog routes {} {}, which the module does not offer",
                        entry.module, function
                    )));
                }
            }
            if !seen.insert((entry.module, entry.function)) {
                return Err(ConfigError::ValidationError(format!(
                    "catalog routes {} more than once",
                    entry.module
                )));
            }
        }

        for set in self.swap_pairs.iter().chain(&self.pools) {
            if let Some((a, _)) = set.pairs.iter().find(|(a, b)| a == b) {
                return Err(ConfigError::ValidationError(format!(
                    "{} on {} pairs {} with itself",
                    set.module, set.network, a
                )));
            }
        }
        Ok(())
    }

    /// Starknet mainnet tables
    pub fn mainnet() -> Self {
        use FunctionName::*;
        use ModuleName::*;
        use Token::{Dai, Eth, Usdc, Usdt, Wbtc};

        let starknet = |module| RouteEntry {
            module,
            function: None,
            network: NetworkRoute::Fixed(NetworkName::Starknet),
        };
        let bridge = |module| {
            [
                RouteEntry {
                    module,
                    function: Some(DepositToStarknet),
                    network: NetworkRoute::DefinedInParams,
                },
                RouteEntry {
                    module,
                    function: Some(WithdrawFromStarknet),
                    network: NetworkRoute::Fixed(NetworkName::Starknet),
                },
            ]
        };

        let mut routes: Vec<RouteEntry> = [
            Avnu, Deploy, Dmail, Fibrous, JediSwap, MySwap, StarknetId, StarkVerse, TenKSwap, Upgrade,
            ZkLend,
        ]
        .into_iter()
        .map(starknet)
        .collect();
        routes.extend(bridge(LayerSwap));
        routes.extend(bridge(Orbiter));
        routes.extend(bridge(StarkGate));
        routes.push(RouteEntry {
            module: Okx,
            function: Some(DepositToOkx),
            network: NetworkRoute::DefinedInParams,
        });
        for function in [WithdrawFromOkx, SubsToMain] {
            routes.push(RouteEntry {
                module: Okx,
                function: Some(function),
                network: NetworkRoute::Fixed(NetworkName::Exchange),
            });
        }

        let on_starknet = |module, pairs: Vec<(Token, Token)>| PairSet {
            module,
            network: NetworkName::Starknet,
            pairs,
        };
        let dex_pairs = vec![
            (Eth, Usdc),
            (Eth, Usdt),
            (Eth, Dai),
            (Usdc, Usdt),
            (Usdc, Dai),
            (Usdt, Dai),
        ];
        let swap_pairs = vec![
            on_starknet(
                Avnu,
                vec![
                    (Eth, Dai),
                    (Eth, Usdc),
                    (Eth, Usdt),
                    (Eth, Wbtc),
                    (Dai, Usdc),
                    (Dai, Usdt),
                    (Dai, Wbtc),
                    (Usdc, Usdt),
                    (Usdc, Wbtc),
                    (Usdt, Wbtc),
                ],
            ),
            on_starknet(Fibrous, dex_pairs.clone()),
            on_starknet(JediSwap, dex_pairs.clone()),
            on_starknet(
                MySwap,
                vec![(Eth, Usdc), (Eth, Usdt), (Eth, Dai), (Usdc, Usdt), (Usdc, Dai)],
            ),
            on_starknet(TenKSwap, dex_pairs),
        ];

        let pools = [JediSwap, MySwap, TenKSwap]
            .into_iter()
            .map(|module| on_starknet(module, vec![(Eth, Usdc)]))
            .collect();

        Self {
            routes,
            swap_pairs,
            pools,
        }
    }
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::mainnet()
    }
}
