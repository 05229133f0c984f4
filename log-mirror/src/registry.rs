//! Hub registry operations: companies, hub-native logs and off-chain receipts

use crate::abi::{self, hub};
use crate::error::MirrorError;
use crate::network::Network;
use crate::types::{CompanyRecord, CompanyRegistration, LogRecord};
use chain_clients_common::Bytes32;
use chain_clients_evm::SubmittedTransaction;
use tracing::{info, warn};

pub async fn get_company(hub_net: &Network, company_id: u128) -> Result<CompanyRecord, MirrorError> {
    let raw = hub_net.call_contract(&hub::encode_companies(company_id)).await?;
    hub::decode_company(company_id, &raw)
}

/// Existing company entries are never overwritten.
#[derive(Debug, Clone)]
pub enum Registration {
    AlreadyRegistered(CompanyRecord),
    Registered { tx_hash: Bytes32 },
}

pub async fn register_company(
    hub_net: &Network,
    registration: &CompanyRegistration,
) -> Result<Registration, MirrorError> {
    let existing = get_company(hub_net, registration.company_id).await?;
    if existing.exists {
        if existing.destination_domain != registration.destination_domain {
            warn!(
                "Company {} already registered with destination {} (requested {})",
                registration.company_id, existing.destination_domain, registration.destination_domain
            );
        }
        return Ok(Registration::AlreadyRegistered(existing));
    }

    let signer = hub_net.wallet()?.address();
    let raw = hub_net.call_contract(&hub::encode_owner()).await?;
    let owner = abi::decode_address(&raw, hub::OWNER)?;
    if owner != signer {
        return Err(MirrorError::Config(format!(
            "hub signer {} is not the hub owner {}",
            signer, owner
        )));
    }

    let tx = hub_net
        .submit_to_contract(hub::encode_register_company(registration), 0)
        .await?;
    info!(
        "Registered company {} (destination {}) in {}",
        registration.company_id, registration.destination_domain, tx.tx_hash
    );
    Ok(Registration::Registered { tx_hash: tx.tx_hash })
}

/// Records a log that originates on the hub itself.
pub async fn push_hub_log(
    hub_net: &Network,
    log_id: &Bytes32,
    content_hash: &Bytes32,
    metadata: &str,
) -> Result<SubmittedTransaction, MirrorError> {
    let tx = hub_net
        .submit_to_contract(hub::encode_push_hub_log(log_id, content_hash, metadata), 0)
        .await?;
    info!("Hub log {} pushed in {}", log_id, tx.tx_hash);
    Ok(tx)
}

pub async fn has_offchain_receipt(
    hub_net: &Network,
    origin_domain: u32,
    log_id: &Bytes32,
) -> Result<bool, MirrorError> {
    let raw = hub_net
        .call_contract(&hub::encode_has_offchain_receipt(origin_domain, log_id))
        .await?;
    abi::decode_bool(&raw, hub::HAS_OFFCHAIN_RECEIPT)
}

pub async fn record_receipt_from_offchain(
    hub_net: &Network,
    record: &LogRecord,
) -> Result<SubmittedTransaction, MirrorError> {
    hub_net
        .submit_to_contract(hub::encode_record_receipt_from_offchain(record), 0)
        .await
}
