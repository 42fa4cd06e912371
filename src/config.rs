use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub system: SystemConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub networks: HashMap<String, NetworkConfig>,
    pub betting: BettingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub market: MarketDefaults,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    pub dry_run: bool,
    /// Key into `networks`; `NETWORK` in the environment takes precedence.
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub factory_address: Option<String>,
    #[serde(default)]
    pub position_token_address: Option<String>,
    pub rpc_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BettingConfig {
    pub min_bet_eth: f64,
    pub max_bet_eth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
    Supabase,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default)]
    pub erc1155_base_uri: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            fee_bps: default_fee_bps(),
            erc1155_base_uri: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDefaults {
    #[serde(default = "default_question")]
    pub question: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_lock_duration")]
    pub lock_duration_secs: u64,
}

impl Default for MarketDefaults {
    fn default() -> Self {
        Self {
            question: default_question(),
            image_url: String::new(),
            lock_duration_secs: default_lock_duration(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub csv_logging: bool,
    pub csv_log_path: String,
    #[serde(default = "default_stats_refresh")]
    pub stats_refresh_secs: u64,
}

fn default_artifact_path() -> String {
    "artifacts/contracts/MarketFactory.sol/MarketFactory.json".to_string()
}

fn default_fee_bps() -> u32 {
    250
}

fn default_question() -> String {
    "Will the main character reveal their identity in Episode 5?".to_string()
}

fn default_lock_duration() -> u64 {
    3 * 24 * 60 * 60
}

fn default_stats_refresh() -> u64 {
    30
}

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub rpc_url: Option<String>,
    pub admin_key: Option<String>,
    pub network: Option<String>,
    pub factory_address: Option<String>,
    pub position_token_address: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub treasury_address: Option<String>,
    pub fee_bps: Option<String>,
    pub erc1155_base_uri: Option<String>,
    pub market_question: Option<String>,
    pub market_image_url: Option<String>,
    pub market_lock_time: Option<String>,
    pub dry_run: Option<bool>,
}

/// Endpoint and contract addresses after merging `config.toml` with the environment.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub network: Option<String>,
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub gas_limit: Option<u64>,
    pub factory: Option<Address>,
    pub position_token: Option<Address>,
    pub rpc_timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn dry_run(&self, env: &EnvConfig) -> bool {
        env.dry_run.unwrap_or(self.system.dry_run)
    }

    /// Resolve the RPC endpoint and contract addresses.
    ///
    /// A named network's URL wins over `RPC_URL`; networks configured with an
    /// empty URL (like `monad_testnet`) take it from the environment.
    pub fn chain_settings(&self, env: &EnvConfig) -> Result<ChainSettings> {
        let network = env.network.clone().or_else(|| self.system.network.clone());

        let selected = match &network {
            Some(name) => Some(
                self.networks
                    .get(name)
                    .with_context(|| format!("Unknown network: {}", name))?,
            ),
            None => None,
        };

        let rpc_url = selected
            .map(|n| n.url.clone())
            .filter(|url| !url.is_empty())
            .or_else(|| env.rpc_url.clone())
            .filter(|url| !url.is_empty())
            .context("RPC_URL not set and no network URL configured")?;

        let factory = env
            .factory_address
            .as_deref()
            .or(self.chain.factory_address.as_deref())
            .map(|s| parse_address(s, "factory address"))
            .transpose()?;

        let position_token = env
            .position_token_address
            .as_deref()
            .or(self.chain.position_token_address.as_deref())
            .map(|s| parse_address(s, "position token address"))
            .transpose()?;

        Ok(ChainSettings {
            network,
            rpc_url,
            chain_id: selected.and_then(|n| n.chain_id),
            gas_limit: selected.and_then(|n| n.gas_limit),
            factory,
            position_token,
            rpc_timeout_secs: self.chain.rpc_timeout_secs,
        })
    }
}

impl ChainSettings {
    pub fn require_factory(&self) -> Result<Address> {
        self.factory.context("FACTORY_ADDRESS not set")
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        // .env.local overrides .env
        dotenv::from_filename(".env.local").ok();

        Ok(Self {
            rpc_url: var("RPC_URL"),
            admin_key: var("ADMIN_KEY").map(|k| normalize_private_key(&k)),
            network: var("NETWORK"),
            factory_address: var("FACTORY_ADDRESS"),
            position_token_address: var("POSITION_TOKEN_ADDRESS"),
            supabase_url: var("SUPABASE_URL"),
            supabase_anon_key: var("SUPABASE_ANON_KEY"),
            treasury_address: var("TREASURY_ADDRESS"),
            fee_bps: var("FEE_BPS"),
            erc1155_base_uri: var("ERC1155_BASE_URI"),
            market_question: var("MARKET_QUESTION"),
            market_image_url: var("MARKET_IMAGE_URL"),
            market_lock_time: var("MARKET_LOCK_TIME"),
            dry_run: var("DRY_RUN").and_then(|v| v.parse().ok()),
        })
    }

    pub fn require_admin_key(&self) -> Result<&str> {
        self.admin_key.as_deref().context("ADMIN_KEY not set")
    }

    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_anon_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            _ => None,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Keys exported from wallets often drop the `0x` prefix.
pub fn normalize_private_key(raw: &str) -> String {
    let key = raw.trim();
    if key.starts_with("0x") {
        key.to_string()
    } else {
        format!("0x{}", key)
    }
}

pub fn parse_address(raw: &str, what: &str) -> Result<Address> {
    raw.trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid {}: {}", what, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [system]
        dry_run = true
        network = "somnia_testnet"

        [chain]
        factory_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        rpc_timeout_secs = 10
        poll_interval_secs = 15
        cache_ttl_secs = 30

        [networks.somnia_testnet]
        url = "https://dream-rpc.somnia.network"
        chain_id = 50312
        gas_limit = 4500934

        [networks.monad_testnet]
        url = ""

        [betting]
        min_bet_eth = 0.001
        max_bet_eth = 10.0

        [storage]
        backend = "memory"
        database_path = "plotpredict.db"

        [monitoring]
        csv_logging = false
        csv_log_path = "bets.csv"
    "#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::parse(SAMPLE).unwrap();

        assert!(config.system.dry_run);
        assert_eq!(config.storage.backend, StoreBackend::Memory);
        assert_eq!(config.deploy.fee_bps, 250);
        assert_eq!(config.market.lock_duration_secs, 259_200);
        assert_eq!(config.monitoring.stats_refresh_secs, 30);
        assert_eq!(config.networks.len(), 2);
    }

    #[test]
    fn test_named_network_wins_over_env_url() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = EnvConfig {
            rpc_url: Some("http://localhost:8545".to_string()),
            ..Default::default()
        };

        let settings = config.chain_settings(&env).unwrap();
        assert_eq!(settings.rpc_url, "https://dream-rpc.somnia.network");
        assert_eq!(settings.chain_id, Some(50312));
        assert_eq!(settings.gas_limit, Some(4_500_934));
        assert!(settings.factory.is_some());
    }

    #[test]
    fn test_empty_network_url_falls_back_to_env() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = EnvConfig {
            network: Some("monad_testnet".to_string()),
            rpc_url: Some("https://monad.example".to_string()),
            ..Default::default()
        };

        let settings = config.chain_settings(&env).unwrap();
        assert_eq!(settings.rpc_url, "https://monad.example");
        assert_eq!(settings.chain_id, None);
    }

    #[test]
    fn test_unknown_network_is_an_error() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = EnvConfig {
            network: Some("mainnet".to_string()),
            ..Default::default()
        };

        assert!(config.chain_settings(&env).is_err());
    }

    #[test]
    fn test_env_overrides_dry_run() {
        let config = Config::parse(SAMPLE).unwrap();
        let env = EnvConfig {
            dry_run: Some(false),
            ..Default::default()
        };
        assert!(!config.dry_run(&env));
        assert!(config.dry_run(&EnvConfig::default()));
    }

    #[test]
    fn test_normalize_private_key() {
        assert_eq!(normalize_private_key("abc123"), "0xabc123");
        assert_eq!(normalize_private_key("0xabc123"), "0xabc123");
        assert_eq!(normalize_private_key("  abc  "), "0xabc");
    }
}
