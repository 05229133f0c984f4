//! Error taxonomy
//!
//! Every library operation returns [`MirrorError`]. [`MirrorError::kind`] sorts
//! errors into the four classes the CLI reports on:
//!
//! - **Configuration**: the deployment or environment is incomplete; fatal.
//! - **Transient**: network or chain conditions that a later attempt may clear.
//! - **ProtocolSoft**: never raised as an error; see [`SoftFailure`].
//! - **Invariant**: the chains returned something that retrying will not fix.

use chain_clients_common::{Bytes32, CodecError};
use chain_clients_evm::EvmError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transient,
    ProtocolSoft,
    Invariant,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transient => "transient",
            ErrorKind::ProtocolSoft => "protocol-soft",
            ErrorKind::Invariant => "invariant",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing credential for chain '{chain}': environment variable '{env}' is not set")]
    MissingCredential { chain: String, env: String },

    #[error("unresolved address for '{chain}': {reason}")]
    UnresolvedAddress { chain: String, reason: String },

    #[error("malformed identifier: {0}")]
    MalformedIdentifier(#[from] CodecError),

    #[error("ABI mismatch decoding {context}: {reason}")]
    AbiMismatch { context: String, reason: String },

    #[error("'{hub}' <-> '{spoke}' is not wired: {missing}")]
    NotWired {
        hub: String,
        spoke: String,
        missing: String,
    },

    #[error("company {0} is not registered on the hub")]
    CompanyNotRegistered(u128),

    #[error("mailbox on '{chain}' quoted a zero fee for dispatch to domain {destination}")]
    ZeroFeeQuoted { chain: String, destination: u32 },

    #[error("wiring mismatch on '{chain}': expected {expected}, read back {actual}")]
    WiringMismatch {
        chain: String,
        expected: Bytes32,
        actual: Bytes32,
    },

    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("chain '{chain}': {source}")]
    Chain {
        chain: String,
        #[source]
        source: EvmError,
    },
}

impl MirrorError {
    pub fn abi(context: &str, reason: impl Into<String>) -> Self {
        MirrorError::AbiMismatch {
            context: context.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::Config(_)
            | MirrorError::MissingCredential { .. }
            | MirrorError::UnresolvedAddress { .. }
            | MirrorError::MalformedIdentifier(_)
            | MirrorError::NotWired { .. }
            | MirrorError::CompanyNotRegistered(_) => ErrorKind::Configuration,
            MirrorError::AbiMismatch { .. }
            | MirrorError::ZeroFeeQuoted { .. }
            | MirrorError::WiringMismatch { .. } => ErrorKind::Invariant,
            MirrorError::Checkpoint(_) => ErrorKind::Transient,
            MirrorError::Chain { source, .. } => {
                if source.is_transient() {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Invariant
                }
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Process exit code for a command that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Invariant => 3,
            ErrorKind::Transient => 4,
            ErrorKind::ProtocolSoft => 0,
        }
    }
}

/// Attaches the chain name to adapter errors.
pub trait ChainResultExt<T> {
    fn on_chain(self, chain: &str) -> Result<T, MirrorError>;
}

impl<T> ChainResultExt<T> for Result<T, EvmError> {
    fn on_chain(self, chain: &str) -> Result<T, MirrorError> {
        self.map_err(|source| MirrorError::Chain {
            chain: chain.to_string(),
            source,
        })
    }
}

// ============================================================================
// SOFT FAILURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftFailureKind {
    /// No MirrorAcked event in the origin receipt.
    AckNotObserved,
    /// MirrorAcked reported `ok == false`.
    AckRejected,
    /// `delivered(messageId)` still false after the polling window.
    NotDelivered,
    /// A log matched a known event signature but its data did not decode.
    MalformedLog,
}

/// A warning-level outcome: the operation went through but did not confirm
/// end-to-end. Carries enough context for an operator to follow up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    pub kind: SoftFailureKind,
    pub context: String,
}

impl SoftFailure {
    pub fn new(kind: SoftFailureKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
        }
    }

    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::ProtocolSoft
    }
}

impl fmt::Display for SoftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}
