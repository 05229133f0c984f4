//! Mailbox transport: quoteDispatch, pay the exact quote, poll `delivered`

use super::MailboxReceipt;
use crate::abi::{self, encode_log_body, mailbox, spoke};
use crate::error::MirrorError;
use crate::network::Network;
use crate::types::{DispatchRequest, LogRecord};
use crate::wiring::resolve_mailbox;
use chain_clients_common::{to_peer_id, Bytes32};
use chain_clients_evm::EvmReceipt;
use tracing::{debug, info, warn};

/// Builds the dispatch for `record` and quotes it on the origin mailbox.
///
/// A zero quote means the mailbox has no route or gas oracle entry for the
/// destination, and is refused with `ZeroFeeQuoted`.
pub async fn prepare(
    origin: &Network,
    hub_net: &Network,
    record: &LogRecord,
) -> Result<DispatchRequest, MirrorError> {
    let mailbox_addr = resolve_mailbox(origin).await?;
    let recipient = to_peer_id(&hub_net.contract);
    let body = encode_log_body(record);

    let raw = origin
        .call(
            &mailbox_addr,
            &mailbox::encode_quote_dispatch(hub_net.domain, &recipient, &body),
        )
        .await?;
    let quoted_fee = abi::decode_uint(&raw, mailbox::QUOTE_DISPATCH)?;
    if quoted_fee == 0 {
        return Err(MirrorError::ZeroFeeQuoted {
            chain: origin.name.clone(),
            destination: hub_net.domain,
        });
    }
    debug!(
        "{}: mailbox {} quoted {} wei to domain {}",
        origin.name, mailbox_addr, quoted_fee, hub_net.domain
    );

    Ok(DispatchRequest {
        destination_domain: hub_net.domain,
        recipient,
        body,
        quoted_fee,
    })
}

/// Submits `pushSpokeLog` with exactly the quoted fee.
pub async fn dispatch(
    origin: &Network,
    hub_net: &Network,
    record: &LogRecord,
) -> Result<MailboxReceipt, MirrorError> {
    let request = prepare(origin, hub_net, record).await?;
    let data = spoke::encode_push_spoke_log(&record.log_id, &record.content_hash, &record.metadata);
    let tx = origin.submit_to_contract(data, request.quoted_fee).await?;

    let message_id = extract_message_id(&tx.receipt, origin, &record.log_id);
    match message_id {
        Some(id) => info!("{}: log {} dispatched as message {}", origin.name, record.log_id, id),
        None => warn!(
            "{}: no SpokeDispatched for log {} in {}",
            origin.name, record.log_id, tx.tx_hash
        ),
    }

    Ok(MailboxReceipt {
        tx_hash: tx.tx_hash,
        request,
        message_id,
    })
}

/// Message id from the `SpokeDispatched` event for `log_id`.
pub fn extract_message_id(receipt: &EvmReceipt, origin: &Network, log_id: &Bytes32) -> Option<Bytes32> {
    receipt
        .logs_from(&origin.contract)
        .filter_map(|log| match spoke::decode_spoke_event(log) {
            Ok(event) => event,
            Err(e) => {
                debug!("{}: skipping undecodable log: {}", origin.name, e);
                None
            }
        })
        .find_map(|event| match event {
            spoke::SpokeEvent::SpokeDispatched {
                log_id: found,
                message_id,
                ..
            } if found == *log_id => Some(message_id),
            _ => None,
        })
}

/// `delivered(messageId)` on the destination mailbox.
pub async fn is_delivered(destination: &Network, message_id: &Bytes32) -> Result<bool, MirrorError> {
    let mailbox_addr = resolve_mailbox(destination).await?;
    let raw = destination
        .call(&mailbox_addr, &mailbox::encode_delivered(message_id))
        .await?;
    abi::decode_bool(&raw, mailbox::DELIVERED)
}
