//! Deployment record resolution
//!
//! A chain's contract address comes from, in order:
//! 1. `contract_addr` in the configuration
//! 2. `contractAddress` in the JSON deployment record
//! 3. the `contractAddress` of the receipt for the record's `tx`
//!
//! When step 3 succeeds the record is rewritten with the resolved address.

use crate::config::ChainConfig;
use crate::error::{ChainResultExt, MirrorError};
use crate::persist::write_json_atomic;
use chain_clients_common::{Bytes32, EvmAddress};
use chain_clients_evm::EvmClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Persisted deployment record `{ contractAddress?, tx?, deployedAt? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<EvmAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<Bytes32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
}

impl DeploymentRecord {
    pub async fn load(chain: &str, path: &Path) -> Result<Self, MirrorError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MirrorError::UnresolvedAddress {
                chain: chain.to_string(),
                reason: format!("cannot read deployment record {}: {}", path.display(), e),
            }
        })?;
        serde_json::from_str(&content).map_err(|e| MirrorError::UnresolvedAddress {
            chain: chain.to_string(),
            reason: format!("invalid deployment record {}: {}", path.display(), e),
        })
    }

    pub async fn save(&self, path: &Path) -> Result<(), MirrorError> {
        write_json_atomic(path, self).await.map_err(|e| {
            MirrorError::Config(format!(
                "cannot write deployment record {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Resolves an address from a record, falling back to the deployment receipt.
pub async fn resolve_from_record(
    chain: &str,
    record: &DeploymentRecord,
    client: &EvmClient,
) -> Result<EvmAddress, MirrorError> {
    if let Some(address) = record.contract_address {
        return Ok(address);
    }

    let tx = record.tx.ok_or_else(|| MirrorError::UnresolvedAddress {
        chain: chain.to_string(),
        reason: "deployment record has neither contractAddress nor tx".to_string(),
    })?;

    let receipt = client
        .get_transaction_receipt(&tx)
        .await
        .on_chain(chain)?
        .ok_or_else(|| MirrorError::UnresolvedAddress {
            chain: chain.to_string(),
            reason: format!("deployment tx {} has no receipt", tx),
        })?;

    receipt
        .contract_address
        .filter(|a| !a.is_zero())
        .ok_or_else(|| MirrorError::UnresolvedAddress {
            chain: chain.to_string(),
            reason: format!("deployment tx {} did not create a contract", tx),
        })
}

/// Resolves the hub or spoke contract address for a configured chain.
pub async fn resolve_contract_address(
    config: &ChainConfig,
    client: &EvmClient,
) -> Result<EvmAddress, MirrorError> {
    if let Some(address) = config.contract_addr {
        return Ok(address);
    }

    let path = config
        .deployment_record
        .as_ref()
        .ok_or_else(|| MirrorError::UnresolvedAddress {
            chain: config.name.clone(),
            reason: "neither contract_addr nor deployment_record is configured".to_string(),
        })?;

    let mut record = DeploymentRecord::load(&config.name, path).await?;
    let address = resolve_from_record(&config.name, &record, client).await?;

    if record.contract_address.is_none() {
        info!(
            "Resolved {} contract {} from deployment tx",
            config.name, address
        );
        record.contract_address = Some(address);
        if let Err(e) = record.save(path).await {
            warn!("Could not update deployment record for {}: {}", config.name, e);
        }
    }

    Ok(address)
}
