use std::env;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

const DEFAULT_CALLBACK_URL: &str = "http://wallet.example.org/callback";
const DEFAULT_MESSAGE: &str = "message to sign";
const DEFAULT_RPC_URL: &str = "https://polygon-mumbai.g.alchemy.com/v2/YOUR_ALCHEMY_KEY";
const DEFAULT_CONTRACT_ADDRESS: &str = "0x134B1BE34911E39A8397ec6289782989729807a4";
const DEFAULT_RHS_URL: &str = "https://rhs-staging.polygonid.me";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Where wallets post their response, carried in every challenge.
    pub callback_url: Url,
    /// The message a holder signs over, carried in every challenge.
    pub message: String,
    pub state_resolver: StateResolverConfig,
}

/// Connection details for on-chain identity state lookup.
///
/// Only consumed by [ProofSystem](crate::proof::ProofSystem) implementations.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StateResolverConfig {
    pub rpc_url: Url,
    pub contract_address: String,
    /// Reverse hash service used for revocation status.
    pub rhs_url: Url,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callback_url: parse_default(DEFAULT_CALLBACK_URL),
            message: DEFAULT_MESSAGE.to_owned(),
            state_resolver: StateResolverConfig::default(),
        }
    }
}

impl Default for StateResolverConfig {
    fn default() -> Self {
        Self {
            rpc_url: parse_default(DEFAULT_RPC_URL),
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_owned(),
            rhs_url: parse_default(DEFAULT_RHS_URL),
        }
    }
}

impl Config {
    /// Defaults overridden by `CALLBACK_URL`, `RPC_URL`, `CONTRACT_ADDRESS` and `RHS_URL`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = env_url("CALLBACK_URL")? {
            config.callback_url = url;
        }
        if let Some(url) = env_url("RPC_URL")? {
            config.state_resolver.rpc_url = url;
        }
        if let Ok(address) = env::var("CONTRACT_ADDRESS") {
            config.state_resolver.contract_address = address;
        }
        if let Some(url) = env_url("RHS_URL")? {
            config.state_resolver.rhs_url = url;
        }
        Ok(config)
    }
}

fn env_url(key: &str) -> Result<Option<Url>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .with_context(|| format!("{key} is not a valid URL: {value}")),
        Err(_) => Ok(None),
    }
}

// The defaults are compile-time constants known to parse.
fn parse_default(url: &str) -> Url {
    Url::parse(url).unwrap_or_else(|_| unreachable!("invalid default URL {url}"))
}
