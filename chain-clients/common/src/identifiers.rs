//! EVM identifier types and the peer identifier codec
//!
//! Both messaging transports address remote contracts by a 32-byte peer
//! identifier. For EVM contracts this is the 20-byte address left-padded with
//! twelve zero bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or converting identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid hex string '{0}'")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("malformed peer identifier {0}: high 12 bytes are not zero")]
    MalformedIdentifier(String),
}

// ============================================================================
// HEX PARSING
// ============================================================================

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CodecError> {
    let clean = s.trim().strip_prefix("0x").unwrap_or(s.trim());
    let bytes = hex::decode(clean).map_err(|_| CodecError::InvalidHex(s.to_string()))?;
    if bytes.len() != N {
        return Err(CodecError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

// ============================================================================
// EVM ADDRESS
// ============================================================================

/// A 20-byte EVM account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EvmAddress(pub [u8; 20]);

impl EvmAddress {
    pub const ZERO: EvmAddress = EvmAddress([0u8; 20]);

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Builds an address from the last 20 bytes of a 32-byte word.
    ///
    /// Used for ABI words and indexed topics, where the upper bytes are
    /// already known to be padding.
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&word[12..]);
        EvmAddress(out)
    }
}

impl FromStr for EvmAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(EvmAddress)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

// ============================================================================
// BYTES32
// ============================================================================

/// A 32-byte value: log ids, content hashes, transaction hashes, peer ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Big-endian 32-byte word holding `value`.
    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&value.to_be_bytes());
        Bytes32(out)
    }
}

impl FromStr for Bytes32 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Bytes32)
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self)
    }
}

macro_rules! impl_hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_hex_serde!(EvmAddress);
impl_hex_serde!(Bytes32);

// ============================================================================
// PEER IDENTIFIER CODEC
// ============================================================================

/// Left-pads a 20-byte address into the 32-byte peer identifier.
pub fn to_peer_id(address: &EvmAddress) -> Bytes32 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&address.0);
    Bytes32(out)
}

/// Recovers the address encoded in a peer identifier.
///
/// Fails with [`CodecError::MalformedIdentifier`] when any of the high 12
/// bytes are set, because such a value does not encode a plain address.
pub fn from_peer_id(peer: &Bytes32) -> Result<EvmAddress, CodecError> {
    if peer.0[..12].iter().any(|b| *b != 0) {
        return Err(CodecError::MalformedIdentifier(peer.to_string()));
    }
    Ok(EvmAddress::from_word(&peer.0))
}
