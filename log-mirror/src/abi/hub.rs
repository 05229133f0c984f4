//! Hub registry ABI

use super::codec::{
    encode_call, event_topic, indexed_topic, log_data, matches_event, topic_address, topic_uint,
    Decoder, Token,
};
use crate::error::MirrorError;
use crate::types::{BlockMirror, CompanyRecord, CompanyRegistration, LogRecord, MirrorAck};
use chain_clients_common::{Bytes32, EvmAddress};
use chain_clients_evm::EvmLog;

pub const REGISTER_COMPANY: &str = "registerCompany(uint256,address,bool,uint32,string)";
pub const COMPANIES: &str = "companies(uint256)";
pub const PUSH_HUB_LOG: &str = "pushHubLog(bytes32,bytes32,string)";
pub const PUSH_BLOCK: &str = "pushBlock(uint256,bytes32,uint256,uint256,uint64,bytes)";
pub const HAS_OFFCHAIN_RECEIPT: &str = "hasOffchainReceipt(uint32,bytes32)";
pub const RECORD_RECEIPT_FROM_OFFCHAIN: &str =
    "recordReceiptFromOffchain(uint32,bytes32,bytes32,string,address)";
pub const SET_PEER: &str = "setPeer(uint32,bytes32)";
pub const PEERS: &str = "peers(uint32)";
pub const OWNER: &str = "owner()";
pub const MAILBOX: &str = "mailbox()";

pub const HUB_LOG_PUSHED: &str = "HubLogPushed(bytes32,address,bytes32,string)";
pub const MIRROR_ACKED: &str = "MirrorAcked(uint256,bytes32,uint32,bool,bytes32,uint64)";
pub const OFFCHAIN_RECEIPT_RECORDED: &str = "OffchainReceiptRecorded(uint32,bytes32,address)";

// ============================================================================
// CALLS
// ============================================================================

pub fn encode_register_company(registration: &CompanyRegistration) -> Vec<u8> {
    encode_call(
        REGISTER_COMPANY,
        &[
            Token::Uint(registration.company_id),
            Token::Address(registration.owner),
            Token::Bool(registration.has_own_chain),
            Token::Uint(registration.destination_domain as u128),
            Token::String(registration.metadata_uri.clone()),
        ],
    )
}

pub fn encode_companies(company_id: u128) -> Vec<u8> {
    encode_call(COMPANIES, &[Token::Uint(company_id)])
}

/// Decodes `(address owner, bool hasOwnChain, uint32 dstEid, string metaURI, bool exists)`.
pub fn decode_company(company_id: u128, data: &[u8]) -> Result<CompanyRecord, MirrorError> {
    let d = Decoder::new(data, COMPANIES);
    Ok(CompanyRecord {
        company_id,
        owner: d.address(0)?,
        has_own_chain: d.bool(1)?,
        destination_domain: d.uint_u32(2)?,
        metadata_uri: d.string(3)?,
        exists: d.bool(4)?,
    })
}

pub fn encode_push_hub_log(log_id: &Bytes32, content_hash: &Bytes32, metadata: &str) -> Vec<u8> {
    encode_call(
        PUSH_HUB_LOG,
        &[
            Token::Bytes32(*log_id),
            Token::Bytes32(*content_hash),
            Token::String(metadata.to_string()),
        ],
    )
}

pub fn encode_push_block(block: &BlockMirror, options: &[u8]) -> Vec<u8> {
    encode_call(
        PUSH_BLOCK,
        &[
            Token::Uint(block.company_id),
            Token::Bytes32(block.payload_hash),
            Token::Uint(block.user_id),
            Token::Uint(block.workspace_id),
            Token::Uint(block.nonce as u128),
            Token::Bytes(options.to_vec()),
        ],
    )
}

pub fn encode_has_offchain_receipt(origin_domain: u32, log_id: &Bytes32) -> Vec<u8> {
    encode_call(
        HAS_OFFCHAIN_RECEIPT,
        &[Token::Uint(origin_domain as u128), Token::Bytes32(*log_id)],
    )
}

pub fn encode_record_receipt_from_offchain(record: &LogRecord) -> Vec<u8> {
    encode_call(
        RECORD_RECEIPT_FROM_OFFCHAIN,
        &[
            Token::Uint(record.origin_domain as u128),
            Token::Bytes32(record.log_id),
            Token::Bytes32(record.content_hash),
            Token::String(record.metadata.clone()),
            Token::Address(record.author),
        ],
    )
}

pub fn encode_set_peer(domain: u32, peer: &Bytes32) -> Vec<u8> {
    encode_call(
        SET_PEER,
        &[Token::Uint(domain as u128), Token::Bytes32(*peer)],
    )
}

pub fn encode_peers(domain: u32) -> Vec<u8> {
    encode_call(PEERS, &[Token::Uint(domain as u128)])
}

pub fn encode_owner() -> Vec<u8> {
    encode_call(OWNER, &[])
}

pub fn encode_mailbox() -> Vec<u8> {
    encode_call(MAILBOX, &[])
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    HubLogPushed {
        log_id: Bytes32,
        author: EvmAddress,
        content_hash: Bytes32,
        metadata: String,
    },
    MirrorAcked(MirrorAck),
    OffchainReceiptRecorded {
        origin_domain: u32,
        log_id: Bytes32,
        author: EvmAddress,
    },
}

/// Decodes a hub log; `Ok(None)` when topic0 is not a hub event.
pub fn decode_hub_event(log: &EvmLog) -> Result<Option<HubEvent>, MirrorError> {
    if matches_event(log, &event_topic(HUB_LOG_PUSHED)) {
        let data = log_data(log, HUB_LOG_PUSHED)?;
        let d = Decoder::new(&data, HUB_LOG_PUSHED);
        return Ok(Some(HubEvent::HubLogPushed {
            log_id: indexed_topic(log, 1, HUB_LOG_PUSHED)?,
            author: topic_address(&indexed_topic(log, 2, HUB_LOG_PUSHED)?, HUB_LOG_PUSHED)?,
            content_hash: d.bytes32(0)?,
            metadata: d.string(1)?,
        }));
    }

    if matches_event(log, &event_topic(MIRROR_ACKED)) {
        let data = log_data(log, MIRROR_ACKED)?;
        let d = Decoder::new(&data, MIRROR_ACKED);
        return Ok(Some(HubEvent::MirrorAcked(MirrorAck {
            company_id: topic_uint(&indexed_topic(log, 1, MIRROR_ACKED)?, MIRROR_ACKED)?,
            payload_hash: d.bytes32(0)?,
            destination_domain: d.uint_u32(1)?,
            ok: d.bool(2)?,
            destination_tx_ref: d.bytes32(3)?,
            nonce: d.uint_u64(4)?,
        })));
    }

    if matches_event(log, &event_topic(OFFCHAIN_RECEIPT_RECORDED)) {
        let data = log_data(log, OFFCHAIN_RECEIPT_RECORDED)?;
        let d = Decoder::new(&data, OFFCHAIN_RECEIPT_RECORDED);
        let origin_word = indexed_topic(log, 1, OFFCHAIN_RECEIPT_RECORDED)?;
        return Ok(Some(HubEvent::OffchainReceiptRecorded {
            origin_domain: Decoder::new(origin_word.as_bytes(), OFFCHAIN_RECEIPT_RECORDED)
                .uint_u32(0)?,
            log_id: indexed_topic(log, 2, OFFCHAIN_RECEIPT_RECORDED)?,
            author: d.address(0)?,
        }));
    }

    Ok(None)
}
