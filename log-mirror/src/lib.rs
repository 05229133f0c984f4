//! Log Mirror Library
//!
//! Relays content-addressed logs between spoke chains and a hub chain.
//! Spokes push logs to the hub over a direct or mailbox transport, the hub
//! mirrors company blocks back out, and a reconciliation worker backfills any
//! spoke log the hub has not recorded.
pub mod abi;
pub mod config;
pub mod deployment;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod persist;
pub mod reconcile;
pub mod registry;
pub mod types;
pub mod wiring;

// Re-export commonly used types
pub use config::{ChainConfig, Config, TransportKind};
pub use dispatch::{DeliveryStatus, DispatchEngine, DispatchOutcome};
pub use error::{ErrorKind, MirrorError, SoftFailure, SoftFailureKind};
pub use network::{Network, Topology};
pub use reconcile::{CheckpointStore, ReconciliationWorker};
pub use types::{BlockMirror, CompanyRecord, CompanyRegistration, LogRecord};
