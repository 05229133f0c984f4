//! Structured EVM client errors
//!
//! Node-specific error shapes are mapped to [`EvmError`] variants here and
//! nowhere else.

use chain_clients_common::Bytes32;
use thiserror::Error;

/// Substrings nodes use when a transaction's fees lose to a pending one.
///
/// geth, erigon and Flow EVM phrase this differently; all of them are the
/// same condition for the escalation loop.
const UNDERPRICED_MARKERS: &[&str] = &[
    "replacement transaction underpriced",
    "transaction underpriced",
    "gas price below minimum",
    "max fee per gas less than block base fee",
    "fee too low",
];

/// The nonce was consumed by another transaction from the same account, or
/// the same transaction is already pending.
const NONCE_CONFLICT_MARKERS: &[&str] = &[
    "nonce too low",
    "already known",
    "nonce has already been used",
];

/// Rate limiting and "try again" codes returned by public RPC providers.
const TRANSIENT_RPC_CODES: &[i64] = &[-32005, 429];

const TRANSIENT_RPC_MARKERS: &[&str] = &["rate limit", "header not found", "too many requests"];

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retrying the same request later may succeed.
    Transient,
    /// The submitted fees lost to a competing pending transaction.
    Underpriced,
    /// Retrying without a change in input will not help.
    Fatal,
}

#[derive(Error, Debug)]
pub enum EvmError {
    #[error("{method} request failed: {message}")]
    Transport { method: String, message: String },
    #[error("timed out after {timeout_ms}ms waiting for {method}")]
    Timeout { method: String, timeout_ms: u64 },
    #[error("JSON-RPC error from {method} (code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("transaction underpriced: {message}")]
    Underpriced { message: String },
    #[error("nonce conflict: {message}")]
    NonceConflict { message: String },
    #[error("malformed {method} response: {message}")]
    MalformedResponse { method: String, message: String },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: Bytes32 },
    #[error("transaction {tx_hash} not confirmed within {waited_ms}ms")]
    TransactionNotConfirmed { tx_hash: Bytes32, waited_ms: u64 },
    #[error(
        "gas escalation exhausted after {attempts} attempts \
         (maxFeePerGas={max_fee_per_gas}, maxPriorityFeePerGas={max_priority_fee_per_gas})"
    )]
    GasEscalationExhausted {
        attempts: u32,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

impl EvmError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EvmError::Transport { .. }
            | EvmError::Timeout { .. }
            | EvmError::TransactionNotConfirmed { .. }
            | EvmError::GasEscalationExhausted { .. }
            | EvmError::NonceConflict { .. } => ErrorClass::Transient,
            EvmError::Underpriced { .. } => ErrorClass::Underpriced,
            EvmError::Rpc { code, message, .. } => {
                let lower = message.to_lowercase();
                if TRANSIENT_RPC_CODES.contains(code)
                    || TRANSIENT_RPC_MARKERS.iter().any(|m| lower.contains(m))
                {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Fatal
                }
            }
            EvmError::MalformedResponse { .. } | EvmError::Reverted { .. } | EvmError::InvalidKey(_) => {
                ErrorClass::Fatal
            }
        }
    }

    /// Transient and underpriced errors may both succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::Underpriced)
    }

    pub fn is_underpriced(&self) -> bool {
        self.class() == ErrorClass::Underpriced
    }
}

/// Maps a JSON-RPC error object to a structured error.
pub(crate) fn classify_rpc_error(method: &str, code: i64, message: &str) -> EvmError {
    let lower = message.to_lowercase();
    if UNDERPRICED_MARKERS.iter().any(|m| lower.contains(m)) {
        return EvmError::Underpriced {
            message: message.to_string(),
        };
    }
    if NONCE_CONFLICT_MARKERS.iter().any(|m| lower.contains(m)) {
        return EvmError::NonceConflict {
            message: message.to_string(),
        };
    }
    EvmError::Rpc {
        method: method.to_string(),
        code,
        message: message.to_string(),
    }
}
