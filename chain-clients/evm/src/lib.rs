//! EVM JSON-RPC client for cross-chain relay services
//!
//! Read access (`eth_call`, `eth_getLogs`, receipts), locally signed EIP-1559
//! submissions, and the gas escalation policy used when a submission is
//! rejected as underpriced.
//!
//! ## Error classification
//!
//! JSON-RPC error objects are classified exactly once, in [`error`], into
//! transient, underpriced and fatal classes. Callers branch on
//! [`EvmError::class`], never on message text.

pub mod client;
pub mod error;
pub mod gas;
pub mod rlp;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{ConfirmationPolicy, EvmClient};
pub use error::{ErrorClass, EvmError};
pub use gas::{recommended_priority_fee, submit_with_escalation, Escalated, GasFees, GasPolicy};
pub use signer::{EvmSigner, RecoverableSignature};
pub use transaction::Eip1559Transaction;
pub use types::{EvmLog, EvmReceipt, LogFilter};
pub use wallet::{EvmWallet, GasSettings, SubmittedTransaction, TransactionRequest};
