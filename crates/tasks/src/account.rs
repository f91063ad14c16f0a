//! Accounts and their per-account settings

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::task::Task;
use crate::types::{NetworkFamily, WalletVariant};

/// Stable, non-secret identifier of an account
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hex SHA-256 of the account identity
    pub fn of(identity: &str) -> Self {
        let digest = Sha256::digest(identity.trim().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shortened form of an identity for logs: first 8 and last 8 characters
pub fn short_identity(identity: &str) -> String {
    let chars: Vec<char> = identity.chars().collect();
    if chars.len() <= 16 {
        return identity.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Range for randomized waits, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepRange {
    pub min: f64,
    pub max: f64,
}

impl SleepRange {
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min: min.max(0.0),
            max: max.max(0.0),
        }
    }

    /// Draw a wait uniformly from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let range = SleepRange::new(self.min, self.max);
        Duration::from_secs_f64(rng.gen_range(range.min..=range.max))
    }
}

impl Default for SleepRange {
    fn default() -> Self {
        Self { min: 1.0, max: 10.0 }
    }
}

/// Gas price ceilings in gwei per network family
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GasCeilings {
    /// Ceiling for Ethereum L1 and its testnets
    #[serde(default)]
    pub ethereum: Option<f64>,

    /// Ceiling for Starknet
    #[serde(default)]
    pub starknet: Option<f64>,
}

impl GasCeilings {
    pub fn for_family(&self, family: NetworkFamily) -> Option<f64> {
        match family {
            NetworkFamily::Ethereum => self.ethereum,
            NetworkFamily::Starknet => self.starknet,
        }
    }
}

/// Exchange API credentials
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &short_identity(&self.api_key))
            .field("secret", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

/// One account of the roster, with its resolved task list
#[derive(Clone)]
pub struct Account {
    /// Secret identity (private key); never logged in full
    pub identity: String,

    /// Fingerprint of `identity`
    pub fingerprint: Fingerprint,

    /// On-chain address, when known up front
    pub address: Option<String>,

    /// Wallet contract flavour
    pub wallet_variant: WalletVariant,

    /// Concrete task list for this run
    pub tasks: Vec<Task>,

    /// Wait between tasks
    pub sleep_range: SleepRange,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Gas admission ceilings
    pub gas_ceilings: GasCeilings,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// URL that rotates a mobile proxy's outgoing IP when requested
    pub proxy_rotation_link: Option<String>,

    /// Deposit addresses keyed by destination name
    pub deposit_addresses: BTreeMap<String, String>,

    /// Exchange API credentials
    pub exchange_credentials: Option<ExchangeCredentials>,
}

impl Account {
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            fingerprint: Fingerprint::of(&identity),
            identity,
            address: None,
            wallet_variant: WalletVariant::default(),
            tasks: Vec::new(),
            sleep_range: SleepRange::default(),
            max_retries: 0,
            gas_ceilings: GasCeilings::default(),
            proxy: None,
            proxy_rotation_link: None,
            deposit_addresses: BTreeMap::new(),
            exchange_credentials: None,
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn short_identity(&self) -> String {
        short_identity(&self.identity)
    }

    /// Drop the tasks before the 1-based `task_num`
    pub fn start_from_task(&mut self, task_num: usize) {
        let skip = task_num.saturating_sub(1).min(self.tasks.len());
        self.tasks.drain(..skip);
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("identity", &self.short_identity())
            .field("address", &self.address)
            .field("wallet_variant", &self.wallet_variant)
            .field("tasks", &self.tasks.len())
            .field("max_retries", &self.max_retries)
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleName;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = Fingerprint::of("0x01234567890abcdef");
        let b = Fingerprint::of(" 0x01234567890abcdef\n");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, Fingerprint::of("0x01234567890abcdee"));
    }

    #[test]
    fn test_short_identity() {
        assert_eq!(short_identity("0x0123456789abcdef0123"), "0x012345...cdef0123");
        assert_eq!(short_identity("short"), "short");
    }

    #[test]
    fn test_start_from_task_is_one_based() {
        let tasks = (0..5).map(|_| Task::new(ModuleName::Deploy)).collect();
        let mut account = Account::new("key").with_tasks(tasks);
        account.start_from_task(3);
        assert_eq!(account.tasks.len(), 3);

        account.start_from_task(0);
        assert_eq!(account.tasks.len(), 3);

        account.start_from_task(10);
        assert!(account.tasks.is_empty());
    }

    #[test]
    fn test_sleep_range_sampling_stays_in_bounds() {
        let range = SleepRange::new(5.0, 2.0);
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let wait = range.sample(&mut rng).as_secs_f64();
            assert!((2.0..=5.0).contains(&wait));
        }
        assert_eq!(SleepRange::new(3.0, 3.0).sample(&mut rng), Duration::from_secs(3));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut account = Account::new("0xdeadbeefdeadbeefdeadbeefdeadbeef");
        account.exchange_credentials = Some(ExchangeCredentials {
            api_key: "key".into(),
            secret: "topsecret".into(),
            passphrase: "pass".into(),
        });
        let rendered = format!("{:?} {:?}", account, account.exchange_credentials);
        assert!(!rendered.contains("0xdeadbeefdeadbeefdeadbeefdeadbeef"));
        assert!(!rendered.contains("topsecret"));
    }
}
