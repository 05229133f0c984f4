//! Spoke registry ABI

use super::codec::{
    encode_call, event_topic, indexed_topic, log_data, matches_event, topic_address, topic_uint,
    Decoder, Token,
};
use crate::error::MirrorError;
use chain_clients_common::{Bytes32, EvmAddress};
use chain_clients_evm::EvmLog;

pub const PUSH_SPOKE_LOG: &str = "pushSpokeLog(bytes32,bytes32,string)";
pub const SET_HUB: &str = "setHub(uint32,bytes32)";
pub const HUBS: &str = "hubs(uint32)";
pub const ACK_FEE_WEI: &str = "ackFeeWei()";
pub const SET_ACK_FEE_WEI: &str = "setAckFeeWei(uint256)";
pub const SET_HYPERLANE: &str = "setHyperlane(address,uint32,address)";
pub const MAILBOX: &str = "mailbox()";
pub const FLOW_DOMAIN: &str = "flowDomain()";
pub const HUB_RECIPIENT: &str = "hubRecipient()";

pub const SPOKE_LOG_PUSHED: &str = "SpokeLogPushed(bytes32,address,bytes32,string)";
pub const SPOKE_DISPATCHED: &str = "SpokeDispatched(bytes32,bytes32,uint32,address)";
pub const BLOCK_MIRRORED: &str = "BlockMirrored(uint256,bytes32,uint32,bytes32,uint64)";

pub fn encode_push_spoke_log(log_id: &Bytes32, content_hash: &Bytes32, metadata: &str) -> Vec<u8> {
    encode_call(
        PUSH_SPOKE_LOG,
        &[
            Token::Bytes32(*log_id),
            Token::Bytes32(*content_hash),
            Token::String(metadata.to_string()),
        ],
    )
}

pub fn encode_set_hub(domain: u32, hub: &Bytes32) -> Vec<u8> {
    encode_call(SET_HUB, &[Token::Uint(domain as u128), Token::Bytes32(*hub)])
}

pub fn encode_hubs(domain: u32) -> Vec<u8> {
    encode_call(HUBS, &[Token::Uint(domain as u128)])
}

pub fn encode_ack_fee_wei() -> Vec<u8> {
    encode_call(ACK_FEE_WEI, &[])
}

pub fn encode_set_ack_fee_wei(value: u128) -> Vec<u8> {
    encode_call(SET_ACK_FEE_WEI, &[Token::Uint(value)])
}

pub fn encode_set_hyperlane(mailbox: &EvmAddress, hub_domain: u32, hub: &EvmAddress) -> Vec<u8> {
    encode_call(
        SET_HYPERLANE,
        &[
            Token::Address(*mailbox),
            Token::Uint(hub_domain as u128),
            Token::Address(*hub),
        ],
    )
}

pub fn encode_mailbox() -> Vec<u8> {
    encode_call(MAILBOX, &[])
}

pub fn encode_flow_domain() -> Vec<u8> {
    encode_call(FLOW_DOMAIN, &[])
}

pub fn encode_hub_recipient() -> Vec<u8> {
    encode_call(HUB_RECIPIENT, &[])
}

// ============================================================================
// EVENTS
// ============================================================================

/// A `SpokeLogPushed` event before an origin id is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedLog {
    pub log_id: Bytes32,
    pub author: EvmAddress,
    pub content_hash: Bytes32,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpokeEvent {
    SpokeLogPushed(PushedLog),
    SpokeDispatched {
        log_id: Bytes32,
        message_id: Bytes32,
        hub_domain: u32,
        hub_recipient: EvmAddress,
    },
    BlockMirrored {
        company_id: u128,
        payload_hash: Bytes32,
        origin_domain: u32,
        dst_tx_hash_like: Bytes32,
        nonce: u64,
    },
}

/// Decodes a spoke log; `Ok(None)` when topic0 is not a spoke event.
pub fn decode_spoke_event(log: &EvmLog) -> Result<Option<SpokeEvent>, MirrorError> {
    if matches_event(log, &event_topic(SPOKE_LOG_PUSHED)) {
        let data = log_data(log, SPOKE_LOG_PUSHED)?;
        let d = Decoder::new(&data, SPOKE_LOG_PUSHED);
        return Ok(Some(SpokeEvent::SpokeLogPushed(PushedLog {
            log_id: indexed_topic(log, 1, SPOKE_LOG_PUSHED)?,
            author: topic_address(&indexed_topic(log, 2, SPOKE_LOG_PUSHED)?, SPOKE_LOG_PUSHED)?,
            content_hash: d.bytes32(0)?,
            metadata: d.string(1)?,
        })));
    }

    if matches_event(log, &event_topic(SPOKE_DISPATCHED)) {
        let data = log_data(log, SPOKE_DISPATCHED)?;
        let d = Decoder::new(&data, SPOKE_DISPATCHED);
        return Ok(Some(SpokeEvent::SpokeDispatched {
            log_id: indexed_topic(log, 1, SPOKE_DISPATCHED)?,
            message_id: d.bytes32(0)?,
            hub_domain: d.uint_u32(1)?,
            hub_recipient: d.address(2)?,
        }));
    }

    if matches_event(log, &event_topic(BLOCK_MIRRORED)) {
        let data = log_data(log, BLOCK_MIRRORED)?;
        let d = Decoder::new(&data, BLOCK_MIRRORED);
        return Ok(Some(SpokeEvent::BlockMirrored {
            company_id: topic_uint(&indexed_topic(log, 1, BLOCK_MIRRORED)?, BLOCK_MIRRORED)?,
            payload_hash: d.bytes32(0)?,
            origin_domain: d.uint_u32(1)?,
            dst_tx_hash_like: d.bytes32(2)?,
            nonce: d.uint_u64(3)?,
        }));
    }

    Ok(None)
}
