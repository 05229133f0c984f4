//! Contract Interface Layer
//!
//! Typed encode/decode for the hub registry, spoke registry, mailbox and
//! direct-transport (OApp) entry points. No business logic lives here.
//!
//! Return values decode into named structures in one step or fail with
//! `AbiMismatch`. Event decoders return `Ok(None)` for logs whose topic0 does
//! not belong to the contract, so a batch never fails on unrelated events.

pub mod codec;
pub mod hub;
pub mod mailbox;
pub mod oapp;
pub mod spoke;

use crate::error::MirrorError;
use crate::types::{BlockMirror, LogRecord};
use chain_clients_common::{Bytes32, EvmAddress};
use codec::{encode, Decoder, Token};

// ============================================================================
// MESSAGE BODIES
// ============================================================================

/// Cross-chain log body: `(bytes32 logId, bytes32 contentHash, string metadata, address author)`.
///
/// The field order is part of the wire contract with the receiving hub.
pub fn encode_log_body(record: &LogRecord) -> Vec<u8> {
    encode(&[
        Token::Bytes32(record.log_id),
        Token::Bytes32(record.content_hash),
        Token::String(record.metadata.clone()),
        Token::Address(record.author),
    ])
}

/// Decoded log body fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBody {
    pub log_id: Bytes32,
    pub content_hash: Bytes32,
    pub metadata: String,
    pub author: EvmAddress,
}

pub fn decode_log_body(data: &[u8]) -> Result<LogBody, MirrorError> {
    let d = Decoder::new(data, "log body");
    Ok(LogBody {
        log_id: d.bytes32(0)?,
        content_hash: d.bytes32(1)?,
        metadata: d.string(2)?,
        author: d.address(3)?,
    })
}

/// Block payload quoted for `pushBlock`:
/// `(uint256 companyId, bytes32 payloadHash, uint256 userId, uint256 workspaceId, uint64 nonce)`.
pub fn encode_block_payload(block: &BlockMirror) -> Vec<u8> {
    encode(&[
        Token::Uint(block.company_id),
        Token::Bytes32(block.payload_hash),
        Token::Uint(block.user_id),
        Token::Uint(block.workspace_id),
        Token::Uint(block.nonce as u128),
    ])
}

// ============================================================================
// SINGLE-VALUE RETURNS
// ============================================================================

pub fn decode_bool(data: &[u8], context: &str) -> Result<bool, MirrorError> {
    Decoder::new(data, context).bool(0)
}

pub fn decode_bytes32(data: &[u8], context: &str) -> Result<Bytes32, MirrorError> {
    Decoder::new(data, context).bytes32(0)
}

pub fn decode_uint(data: &[u8], context: &str) -> Result<u128, MirrorError> {
    Decoder::new(data, context).uint(0)
}

pub fn decode_u32(data: &[u8], context: &str) -> Result<u32, MirrorError> {
    Decoder::new(data, context).uint_u32(0)
}

pub fn decode_address(data: &[u8], context: &str) -> Result<EvmAddress, MirrorError> {
    Decoder::new(data, context).address(0)
}
