//! Local ECDSA (secp256k1) signing
//!
//! ## Security
//!
//! The private key is held in memory only for the lifetime of the signer and
//! is never logged; `Debug` prints the derived address.

use crate::error::EvmError;
use chain_clients_common::{keccak256, Bytes32, EvmAddress};
use k256::ecdsa::SigningKey;
use std::fmt;

/// r, s and the y-parity bit of a secp256k1 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub y_parity: u8,
}

pub struct EvmSigner {
    signing_key: SigningKey,
    address: EvmAddress,
}

impl EvmSigner {
    /// Creates a signer from a hex-encoded 32-byte private key (0x optional).
    pub fn from_hex(private_key: &str) -> Result<Self, EvmError> {
        let clean = private_key.trim();
        let clean = clean.strip_prefix("0x").unwrap_or(clean);
        let bytes = hex::decode(clean)
            .map_err(|_| EvmError::InvalidKey("private key is not valid hex".to_string()))?;
        if bytes.len() != 32 {
            return Err(EvmError::InvalidKey(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| EvmError::InvalidKey(e.to_string()))?;
        let address = derive_address(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> EvmAddress {
        self.address
    }

    /// Signs a 32-byte prehash, returning the recovery parity alongside r and s.
    pub fn sign_hash(&self, hash: &Bytes32) -> Result<RecoverableSignature, EvmError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| EvmError::InvalidKey(format!("signing failed: {}", e)))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(RecoverableSignature {
            r,
            s,
            y_parity: recovery_id.to_byte(),
        })
    }
}

impl fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address)
            .finish()
    }
}

/// keccak256(uncompressed_pubkey[1..])[12..32]
fn derive_address(signing_key: &SigningKey) -> EvmAddress {
    let public_key_point = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&public_key_point.as_bytes()[1..]);
    EvmAddress::from_word(hash.as_bytes())
}
