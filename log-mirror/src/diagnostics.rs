//! Read-only diagnostics: contract state, signer balances and event listings

use crate::abi::hub::{self, decode_hub_event, HubEvent};
use crate::abi::spoke::{self, decode_spoke_event, SpokeEvent};
use crate::abi::{decode_address, decode_u32};
use crate::config::TransportKind;
use crate::error::{ChainResultExt, MirrorError};
use crate::network::{Network, Topology};
use crate::reconcile::plan_chunks;
use crate::wiring::{ack_fee, read_wiring, WiringStatus};
use chain_clients_common::{Bytes32, EvmAddress};
use chain_clients_evm::{EvmLog, LogFilter};
use std::future::Future;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ContractInspection {
    pub chain: String,
    pub address: EvmAddress,
    pub code_size: usize,
    pub owner: Option<EvmAddress>,
    pub mailbox: Option<EvmAddress>,
}

impl ContractInspection {
    pub fn is_deployed(&self) -> bool {
        self.code_size > 0
    }
}

#[derive(Debug, Clone)]
pub struct SpokeInspection {
    pub contract: ContractInspection,
    pub transport: TransportKind,
    pub flow_domain: Option<u32>,
    pub hub_recipient: Option<EvmAddress>,
    pub ack_fee_wei: Option<u128>,
    pub wiring: WiringStatus,
}

/// Reads that a contract may not implement are reported as `None`.
async fn optional<T, F>(what: &str, read: F) -> Option<T>
where
    F: Future<Output = Result<T, MirrorError>>,
{
    match read.await {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{} unavailable: {}", what, e);
            None
        }
    }
}

async fn inspect_contract(net: &Network) -> Result<ContractInspection, MirrorError> {
    let code = net.client().get_code(&net.contract).await.on_chain(&net.name)?;
    let owner = optional("owner()", async {
        decode_address(&net.call_contract(&hub::encode_owner()).await?, hub::OWNER)
    })
    .await;
    let mailbox = optional("mailbox()", async {
        decode_address(&net.call_contract(&hub::encode_mailbox()).await?, hub::MAILBOX)
    })
    .await;

    Ok(ContractInspection {
        chain: net.name.clone(),
        address: net.contract,
        code_size: code.len(),
        owner,
        mailbox: mailbox.filter(|m| !m.is_zero()),
    })
}

pub async fn inspect_hub(hub_net: &Network) -> Result<ContractInspection, MirrorError> {
    inspect_contract(hub_net).await
}

pub async fn inspect_spoke(hub_net: &Network, spoke_net: &Network) -> Result<SpokeInspection, MirrorError> {
    let contract = inspect_contract(spoke_net).await?;
    let flow_domain = optional("flowDomain()", async {
        decode_u32(
            &spoke_net.call_contract(&spoke::encode_flow_domain()).await?,
            spoke::FLOW_DOMAIN,
        )
    })
    .await;
    let hub_recipient = optional("hubRecipient()", async {
        decode_address(
            &spoke_net.call_contract(&spoke::encode_hub_recipient()).await?,
            spoke::HUB_RECIPIENT,
        )
    })
    .await;
    let ack_fee_wei = optional("ackFeeWei()", ack_fee(spoke_net)).await;
    let wiring = read_wiring(hub_net, spoke_net).await?;

    Ok(SpokeInspection {
        contract,
        transport: spoke_net.transport,
        flow_domain,
        hub_recipient,
        ack_fee_wei,
        wiring,
    })
}

#[derive(Debug, Clone)]
pub struct SignerBalance {
    pub chain: String,
    pub address: EvmAddress,
    pub balance_wei: u128,
}

/// Native balance of every chain's admin signer. Read-only chains are skipped.
pub async fn signer_balances(topology: &Topology) -> Result<Vec<SignerBalance>, MirrorError> {
    let mut balances = Vec::new();
    for net in std::iter::once(&topology.hub).chain(topology.spokes.iter()) {
        let Ok(wallet) = net.wallet() else {
            continue;
        };
        let address = wallet.address();
        let balance_wei = net.client().get_balance(&address).await.on_chain(&net.name)?;
        balances.push(SignerBalance {
            chain: net.name.clone(),
            address,
            balance_wei,
        });
    }
    Ok(balances)
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    Hub(HubEvent),
    Spoke(SpokeEvent),
}

#[derive(Debug, Clone)]
pub struct ObservedEvent {
    pub block_number: Option<u64>,
    pub tx_hash: Option<Bytes32>,
    pub event: ContractEvent,
}

fn decode_contract_event(log: &EvmLog) -> Result<Option<ContractEvent>, MirrorError> {
    if let Some(event) = decode_hub_event(log)? {
        return Ok(Some(ContractEvent::Hub(event)));
    }
    Ok(decode_spoke_event(log)?.map(ContractEvent::Spoke))
}

fn collect_events<'l>(net: &Network, logs: impl Iterator<Item = &'l EvmLog>) -> Vec<ObservedEvent> {
    logs.filter_map(|log| match decode_contract_event(log) {
        Ok(Some(event)) => Some(ObservedEvent {
            block_number: log.block_number(),
            tx_hash: log.transaction_hash,
            event,
        }),
        Ok(None) => None,
        Err(e) => {
            debug!("{}: skipping undecodable log: {}", net.name, e);
            None
        }
    })
    .collect()
}

/// Hub and spoke events emitted by the chain's contract in `tx_hash`.
pub async fn read_transaction_events(net: &Network, tx_hash: &Bytes32) -> Result<Vec<ObservedEvent>, MirrorError> {
    let receipt = net
        .client()
        .get_transaction_receipt(tx_hash)
        .await
        .on_chain(&net.name)?
        .ok_or_else(|| MirrorError::Config(format!("no receipt for {} on {}", tx_hash, net.name)))?;
    Ok(collect_events(net, receipt.logs_from(&net.contract)))
}

/// Events from the last `window_blocks` blocks, fetched `page_blocks` at a time.
pub async fn scan_recent_events(
    net: &Network,
    window_blocks: u64,
    page_blocks: u64,
) -> Result<Vec<ObservedEvent>, MirrorError> {
    let head = net.client().get_block_number().await.on_chain(&net.name)?;
    let from = head.saturating_sub(window_blocks);

    let mut events = Vec::new();
    for page in plan_chunks(from, head, page_blocks) {
        let filter = LogFilter::new(net.contract, page.from, page.to);
        let logs = net.client().get_logs(&filter).await.on_chain(&net.name)?;
        events.extend(collect_events(net, logs.iter()));
    }
    Ok(events)
}
