//! Direct (peer-to-peer) transport: quote, send with headroom, read the ack

use super::{with_headroom, AckStatus, DirectReceipt};
use crate::abi::codec::event_topic;
use crate::abi::hub::{decode_hub_event, HubEvent};
use crate::abi::oapp::{self, TransportFee};
use crate::abi::spoke::{decode_spoke_event, SpokeEvent, BLOCK_MIRRORED};
use crate::error::{ChainResultExt, MirrorError, SoftFailure, SoftFailureKind};
use crate::network::Network;
use crate::types::MirrorAck;
use chain_clients_common::Bytes32;
use chain_clients_evm::{EvmReceipt, LogFilter, SubmittedTransaction};
use tracing::{debug, info, warn};

pub async fn quote(
    origin: &Network,
    destination_domain: u32,
    payload: &[u8],
    options: &[u8],
) -> Result<TransportFee, MirrorError> {
    let raw = origin
        .call_contract(&oapp::encode_quote(destination_domain, payload, options))
        .await?;
    let fee = oapp::decode_quote(&raw)?;
    debug!(
        "{}: quote to domain {} is {} wei native",
        origin.name, destination_domain, fee.native_fee
    );
    Ok(fee)
}

/// Quotes, then submits `call_data` carrying the quoted fee plus headroom.
pub(crate) async fn send_with_quote(
    origin: &Network,
    destination_domain: u32,
    payload: &[u8],
    options: &[u8],
    headroom_percent: u64,
    call_data: Vec<u8>,
) -> Result<(TransportFee, u128, SubmittedTransaction), MirrorError> {
    let fee = quote(origin, destination_domain, payload, options).await?;
    let value = with_headroom(fee.native_fee, headroom_percent);
    info!(
        "{}: sending to domain {} with {} wei (quoted {})",
        origin.name, destination_domain, value, fee.native_fee
    );
    let tx = origin.submit_to_contract(call_data, value).await?;
    Ok((fee, value, tx))
}

/// Classifies the `MirrorAcked` event in an origin receipt.
///
/// Missing, rejected or misaddressed acks are soft failures; the origin
/// transaction itself has already succeeded.
pub fn inspect_ack(
    receipt: &EvmReceipt,
    origin: &Network,
    destination_domain: u32,
) -> (AckStatus, Vec<SoftFailure>) {
    let mut soft_failures = Vec::new();
    let mut ack: Option<MirrorAck> = None;

    for log in receipt.logs_from(&origin.contract) {
        match decode_hub_event(log) {
            Ok(Some(HubEvent::MirrorAcked(found))) => {
                ack = Some(found);
                break;
            }
            Ok(_) => {}
            Err(e) => soft_failures.push(SoftFailure::new(
                SoftFailureKind::MalformedLog,
                format!("{} in {}: {}", origin.name, receipt.transaction_hash, e),
            )),
        }
    }

    let status = match ack {
        None => {
            soft_failures.push(SoftFailure::new(
                SoftFailureKind::AckNotObserved,
                format!(
                    "no MirrorAcked in {} on {}",
                    receipt.transaction_hash, origin.name
                ),
            ));
            AckStatus::NotObserved
        }
        Some(ack) if !ack.ok => {
            soft_failures.push(SoftFailure::new(
                SoftFailureKind::AckRejected,
                format!(
                    "MirrorAcked ok=false for payload {} in {}",
                    ack.payload_hash, receipt.transaction_hash
                ),
            ));
            AckStatus::Rejected(ack)
        }
        Some(ack) if ack.destination_domain != destination_domain || ack.destination_tx_ref.is_zero() => {
            soft_failures.push(SoftFailure::new(
                SoftFailureKind::AckRejected,
                format!(
                    "MirrorAcked reports domain {} ref {} (expected domain {})",
                    ack.destination_domain, ack.destination_tx_ref, destination_domain
                ),
            ));
            AckStatus::Rejected(ack)
        }
        Some(ack) => AckStatus::Confirmed(ack),
    };

    (status, soft_failures)
}

pub(crate) fn into_receipt(
    fee: TransportFee,
    attached_value: u128,
    tx: SubmittedTransaction,
    origin: &Network,
    destination_domain: u32,
) -> DirectReceipt {
    let (ack, soft_failures) = inspect_ack(&tx.receipt, origin, destination_domain);
    for failure in &soft_failures {
        warn!("{}", failure);
    }
    DirectReceipt {
        tx_hash: tx.tx_hash,
        quoted_fee: fee,
        attached_value,
        ack,
        soft_failures,
    }
}

/// Looks for `BlockMirrored(payloadHash)` in the destination's recent blocks.
pub async fn observe_block_mirrored(
    destination: &Network,
    payload_hash: &Bytes32,
    window_blocks: u64,
) -> Result<bool, MirrorError> {
    let head = destination
        .client()
        .get_block_number()
        .await
        .on_chain(&destination.name)?;
    let mut filter = LogFilter::new(
        destination.contract,
        head.saturating_sub(window_blocks),
        head,
    );
    filter.topic0 = vec![event_topic(BLOCK_MIRRORED)];

    let logs = destination
        .client()
        .get_logs(&filter)
        .await
        .on_chain(&destination.name)?;
    for log in &logs {
        match decode_spoke_event(log) {
            Ok(Some(SpokeEvent::BlockMirrored { payload_hash: found, .. })) if found == *payload_hash => {
                return Ok(true)
            }
            Ok(_) => {}
            Err(e) => debug!("{}: skipping undecodable BlockMirrored: {}", destination.name, e),
        }
    }
    Ok(false)
}
