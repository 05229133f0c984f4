//! Shared utilities for cross-chain client libraries
//!
//! Strongly-typed EVM identifiers, the 20-byte to 32-byte peer identifier codec
//! used by both messaging transports, and the keccak-based hash helpers used to
//! derive log identifiers.

pub mod hashing;
pub mod identifiers;

pub use hashing::{content_hash, derive_log_id, keccak256};
pub use identifiers::{from_peer_id, to_peer_id, Bytes32, CodecError, EvmAddress};
