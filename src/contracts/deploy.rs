//! Factory deployment and the parameters of the create-market flow.

use anyhow::{Context, Result};
use ethers::abi::Abi;
use ethers::contract::ContractFactory;
use ethers::providers::Middleware;
use ethers::types::{Address, Bytes, H256, U256};
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use tracing::info;

use crate::config::{parse_address, DeployConfig, EnvConfig, MarketDefaults};
use crate::contracts::abi::MarketFactory;
use crate::execution::types::{TxAction, TxSummary};

/// The parts of a Hardhat build artifact needed to deploy.
#[derive(Debug, Clone, Deserialize)]
pub struct HardhatArtifact {
    #[serde(rename = "contractName", default)]
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl HardhatArtifact {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact: {} (run the contract build first)", path))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse artifact: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let artifact: HardhatArtifact = serde_json::from_str(contents)?;
        anyhow::ensure!(!artifact.bytecode.is_empty(), "artifact has no bytecode");
        Ok(artifact)
    }
}

/// Constructor arguments of `MarketFactory(admin, treasury, feeBps, baseUri)`
/// other than the admin, which is the deployer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployParams {
    pub treasury: Address,
    pub fee_bps: u32,
    pub erc1155_base_uri: String,
}

impl DeployParams {
    pub fn resolve(deploy: &DeployConfig, env: &EnvConfig) -> Result<Self> {
        let treasury = env
            .treasury_address
            .as_deref()
            .context("TREASURY_ADDRESS env is required")?;
        let treasury = parse_address(treasury, "TREASURY_ADDRESS")?;

        let fee_bps = match env.fee_bps.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("FEE_BPS must be a number, got {:?}", raw))?,
            None => deploy.fee_bps,
        };

        let erc1155_base_uri = env
            .erc1155_base_uri
            .clone()
            .unwrap_or_else(|| deploy.erc1155_base_uri.clone());

        Ok(Self {
            treasury,
            fee_bps,
            erc1155_base_uri,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub factory: Address,
    pub position_token: Address,
    pub tx_hash: H256,
    pub block: Option<u64>,
}

impl Deployment {
    /// Lines to paste into `.env`.
    pub fn env_lines(&self) -> String {
        format!(
            "FACTORY_ADDRESS={:#x}\nPOSITION_TOKEN_ADDRESS={:#x}",
            self.factory, self.position_token
        )
    }

    pub fn summary(&self) -> TxSummary {
        let mut summary = TxSummary::new(TxAction::DeployFactory, None, self.factory, false);
        summary.tx_hash = Some(self.tx_hash);
        summary.block = self.block;
        summary
    }
}

pub async fn deploy_factory<M: Middleware + 'static>(
    client: Arc<M>,
    admin: Address,
    artifact: HardhatArtifact,
    params: &DeployParams,
    gas_limit: Option<u64>,
) -> Result<Deployment> {
    info!(
        "Deploying {} (admin {:#x}, treasury {:#x}, fee {} bps)",
        if artifact.contract_name.is_empty() { "MarketFactory" } else { artifact.contract_name.as_str() },
        admin,
        params.treasury,
        params.fee_bps
    );

    let factory = ContractFactory::new(artifact.abi, artifact.bytecode, client.clone());
    let mut deployer = factory
        .deploy((
            admin,
            params.treasury,
            U256::from(params.fee_bps),
            params.erc1155_base_uri.clone(),
        ))
        .context("Failed to encode MarketFactory constructor")?;
    if let Some(gas) = gas_limit {
        deployer.tx.set_gas(gas);
    }

    let (contract, receipt) = deployer
        .send_with_receipt()
        .await
        .context("MarketFactory deployment failed")?;
    let factory_address = contract.address();
    info!("MarketFactory deployed: {:#x}", factory_address);

    let position_token = MarketFactory::new(factory_address, client)
        .position_token()
        .call()
        .await
        .context("Failed to read positionToken from new factory")?;
    info!("PositionToken: {:#x}", position_token);

    Ok(Deployment {
        factory: factory_address,
        position_token,
        tx_hash: receipt.transaction_hash,
        block: receipt.block_number.map(|b| b.as_u64()),
    })
}

/// Arguments of `factory.createMarket(question, imageUrl, lockTime)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketParams {
    pub question: String,
    pub image_url: String,
    pub lock_time: u64,
}

impl MarketParams {
    /// Environment first, then `[market]` defaults; lock time defaults to
    /// `now + lock_duration_secs`.
    pub fn resolve(defaults: &MarketDefaults, env: &EnvConfig, now_secs: u64) -> Result<Self> {
        let lock_time = match env.market_lock_time.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("MARKET_LOCK_TIME must be unix seconds, got {:?}", raw))?,
            None => now_secs + defaults.lock_duration_secs,
        };

        Ok(Self {
            question: env
                .market_question
                .clone()
                .unwrap_or_else(|| defaults.question.clone()),
            image_url: env
                .market_image_url
                .clone()
                .unwrap_or_else(|| defaults.image_url.clone()),
            lock_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_params_require_treasury() {
        let err = DeployParams::resolve(&DeployConfig::default(), &EnvConfig::default()).unwrap_err();
        assert!(err.to_string().contains("TREASURY_ADDRESS"));
    }

    #[test]
    fn test_deploy_params_defaults_and_overrides() {
        let env = EnvConfig {
            treasury_address: Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()),
            ..Default::default()
        };
        let params = DeployParams::resolve(&DeployConfig::default(), &env).unwrap();
        assert_eq!(params.fee_bps, 250);
        assert_eq!(params.erc1155_base_uri, "");

        let env = EnvConfig {
            fee_bps: Some("100".to_string()),
            erc1155_base_uri: Some("ipfs://base/".to_string()),
            ..env
        };
        let params = DeployParams::resolve(&DeployConfig::default(), &env).unwrap();
        assert_eq!(params.fee_bps, 100);
        assert_eq!(params.erc1155_base_uri, "ipfs://base/");
    }

    #[test]
    fn test_non_numeric_fee_rejected() {
        let env = EnvConfig {
            treasury_address: Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string()),
            fee_bps: Some("two percent".to_string()),
            ..Default::default()
        };
        let err = DeployParams::resolve(&DeployConfig::default(), &env).unwrap_err();
        assert!(err.to_string().contains("FEE_BPS"));
    }

    #[test]
    fn test_market_params_defaults() {
        let params = MarketParams::resolve(&MarketDefaults::default(), &EnvConfig::default(), 1_000).unwrap();
        assert_eq!(params.question, "Will the main character reveal their identity in Episode 5?");
        assert_eq!(params.image_url, "");
        assert_eq!(params.lock_time, 1_000 + 3 * 24 * 60 * 60);
    }

    #[test]
    fn test_market_params_from_env() {
        let env = EnvConfig {
            market_question: Some("Will ETH flip BTC?".to_string()),
            market_lock_time: Some("1900000000".to_string()),
            ..Default::default()
        };
        let params = MarketParams::resolve(&MarketDefaults::default(), &env, 0).unwrap();
        assert_eq!(params.question, "Will ETH flip BTC?");
        assert_eq!(params.lock_time, 1_900_000_000);
    }

    #[test]
    fn test_artifact_parsing() {
        let json = r#"{
            "contractName": "MarketFactory",
            "abi": [{"type": "function", "name": "positionToken", "stateMutability": "view", "inputs": [], "outputs": [{"name": "", "type": "address"}]}],
            "bytecode": "0x6080604052"
        }"#;
        let artifact = HardhatArtifact::parse(json).unwrap();
        assert_eq!(artifact.contract_name, "MarketFactory");
        assert_eq!(artifact.bytecode.len(), 5);
        assert!(artifact.abi.function("positionToken").is_ok());

        let empty = r#"{"abi": [], "bytecode": "0x"}"#;
        assert!(HardhatArtifact::parse(empty).is_err());
    }

    fn deployment() -> Deployment {
        Deployment {
            factory: Address::repeat_byte(0x11),
            position_token: Address::repeat_byte(0x22),
            tx_hash: H256::repeat_byte(0x33),
            block: Some(12),
        }
    }

    #[test]
    fn test_env_lines() {
        let lines = deployment().env_lines();
        assert!(lines.starts_with("FACTORY_ADDRESS=0x1111"));
        assert!(lines.contains("\nPOSITION_TOKEN_ADDRESS=0x2222"));
    }

    #[test]
    fn test_deployment_summary_targets_factory() {
        let summary = deployment().summary();
        assert_eq!(summary.action, TxAction::DeployFactory);
        assert_eq!(summary.target, Address::repeat_byte(0x11));
        assert_eq!(summary.tx_hash, Some(H256::repeat_byte(0x33)));
        assert_eq!(summary.block, Some(12));
        assert_eq!(summary.market_id, None);
        assert!(!summary.dry_run);
    }
}
