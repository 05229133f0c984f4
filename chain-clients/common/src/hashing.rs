//! Keccak helpers and log identifier derivation

use crate::identifiers::{Bytes32, EvmAddress};
use sha3::{Digest, Keccak256};

/// keccak256 of `data`.
pub fn keccak256(data: &[u8]) -> Bytes32 {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Bytes32(out)
}

/// Hash of an off-chain payload, as carried in `contentHash`.
pub fn content_hash(payload: &[u8]) -> Bytes32 {
    keccak256(payload)
}

/// Deterministic log id: keccak256(author || contentHash || nonce_be).
///
/// The nonce disambiguates two records with the same author and payload.
pub fn derive_log_id(author: &EvmAddress, content_hash: &Bytes32, nonce: u64) -> Bytes32 {
    let mut buf = Vec::with_capacity(20 + 32 + 8);
    buf.extend_from_slice(author.as_bytes());
    buf.extend_from_slice(content_hash.as_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    keccak256(&buf)
}
