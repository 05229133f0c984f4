//! Domain types shared by dispatch, reconciliation and diagnostics

use chain_clients_common::{Bytes32, EvmAddress};

/// A content-addressed log record mirrored from its origin chain to the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub log_id: Bytes32,
    pub author: EvmAddress,
    pub content_hash: Bytes32,
    pub metadata: String,
    /// Origin id the hub keys receipts by
    pub origin_domain: u32,
}

/// Hub-resident company entry, as returned by `companies(companyId)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    pub company_id: u128,
    pub owner: EvmAddress,
    pub has_own_chain: bool,
    /// Spoke domain mirroring this company; meaningful only with `has_own_chain`
    pub destination_domain: u32,
    pub metadata_uri: String,
    pub exists: bool,
}

/// Arguments to `registerCompany`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRegistration {
    pub company_id: u128,
    pub owner: EvmAddress,
    pub has_own_chain: bool,
    pub destination_domain: u32,
    pub metadata_uri: String,
}

/// A hub-originated block mirrored to a company's spoke via `pushBlock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMirror {
    pub company_id: u128,
    pub payload_hash: Bytes32,
    pub user_id: u128,
    pub workspace_id: u128,
    pub nonce: u64,
}

/// `MirrorAcked` as emitted by the hub.
///
/// This is the destination-reported outcome; it says nothing about
/// origin-side finality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorAck {
    pub company_id: u128,
    pub payload_hash: Bytes32,
    pub destination_domain: u32,
    pub ok: bool,
    pub destination_tx_ref: Bytes32,
    pub nonce: u64,
}

/// One mailbox dispatch, built right before submission and dropped after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub destination_domain: u32,
    pub recipient: Bytes32,
    pub body: Vec<u8>,
    pub quoted_fee: u128,
}
