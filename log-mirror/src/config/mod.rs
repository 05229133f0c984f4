//! Configuration Management Module
//!
//! This module handles loading and validating configuration for the log mirror.
//! Configuration covers the hub chain, every spoke chain, dispatch fee headroom,
//! reconciliation chunking, gas escalation and RPC timeouts.
//!
//! The configuration is built once at startup and passed by reference to every
//! component; nothing reads chain parameters from globals.

use crate::error::MirrorError;
use chain_clients_common::EvmAddress;
use chain_clients_evm::{recommended_priority_fee, ConfirmationPolicy, GasPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "LOG_MIRROR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/log-mirror.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
///
/// This structure holds configuration for:
/// - The hub chain (aggregation point for mirrored logs and companies)
/// - Every spoke chain that originates logs
/// - Dispatch, reconciliation, gas and RPC tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub hub: ChainConfig,
    #[serde(default)]
    pub spokes: Vec<ChainConfig>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
}

/// Messaging transport a spoke is wired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Peer-to-peer messaging with a quoted native fee (LayerZero-style).
    Direct,
    /// Dispatch-and-deliver messaging through a mailbox (Hyperlane-style).
    #[default]
    Mailbox,
}

/// Configuration for one EVM chain, hub or spoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Name used on the CLI and as the checkpoint key
    pub name: String,
    pub rpc_url: String,
    /// Native chain id (signing, priority fee defaults)
    pub chain_id: u64,
    /// Transport domain / endpoint id of this chain
    pub domain: u32,
    /// Hub or spoke contract address; takes precedence over `deployment_record`
    #[serde(default)]
    pub contract_addr: Option<EvmAddress>,
    /// Path to a JSON deployment record `{contractAddress?, tx?}`
    #[serde(default)]
    pub deployment_record: Option<PathBuf>,
    /// Mailbox contract on this chain (mailbox transport only)
    #[serde(default)]
    pub mailbox_addr: Option<EvmAddress>,
    /// Environment variable name containing this chain's admin private key (hex)
    pub private_key_env: String,
    /// Overrides the recommended priority fee for this chain
    #[serde(default)]
    pub priority_fee_wei: Option<u64>,
    /// Spokes only: transport used between this spoke and the hub
    #[serde(default)]
    pub transport: TransportKind,
    /// Spokes only: origin id the hub keys off-chain receipts by.
    /// Defaults to the native chain id.
    #[serde(default)]
    pub origin_domain: Option<u32>,
}

impl ChainConfig {
    /// Loads the admin private key from the environment variable.
    pub fn get_private_key(&self) -> Result<String, MirrorError> {
        std::env::var(&self.private_key_env).map_err(|_| MirrorError::MissingCredential {
            chain: self.name.clone(),
            env: self.private_key_env.clone(),
        })
    }

    pub fn priority_fee(&self) -> u128 {
        self.priority_fee_wei
            .map(u128::from)
            .unwrap_or_else(|| recommended_priority_fee(self.chain_id))
    }

    /// Origin id the hub keys this chain's receipts by.
    pub fn origin_domain(&self) -> Result<u32, MirrorError> {
        match self.origin_domain {
            Some(domain) => Ok(domain),
            None => u32::try_from(self.chain_id).map_err(|_| {
                MirrorError::Config(format!(
                    "chain '{}': chain ID {} does not fit a uint32 origin id, set origin_domain",
                    self.name, self.chain_id
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Value attached to direct-transport sends, as a percentage of the quote
    #[serde(default = "default_fee_headroom_percent")]
    pub fee_headroom_percent: u64,
    /// Transport options passed to quote and send (hex)
    #[serde(default = "default_transport_options")]
    pub transport_options: String,
    /// How long to poll `delivered(messageId)` after a mailbox dispatch
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    #[serde(default = "default_delivery_poll_interval_ms")]
    pub delivery_poll_interval_ms: u64,
    /// Blocks searched on the destination for a BlockMirrored event
    #[serde(default = "default_observation_window_blocks")]
    pub observation_window_blocks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Blocks per eth_getLogs request; public RPCs cap ranges around 50k
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Start this far behind the head when an origin has no checkpoint
    #[serde(default = "default_chunk_size")]
    pub lookback_blocks: u64,
    /// The newest block scanned is `head - finality_blocks`
    #[serde(default = "default_finality_blocks")]
    pub finality_blocks: u64,
    /// Sleep between passes in continuous mode
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_bump_percent")]
    pub bump_percent: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_confirmation_poll_interval_ms")]
    pub confirmation_poll_interval_ms: u64,
}

fn default_fee_headroom_percent() -> u64 {
    120
}

fn default_transport_options() -> String {
    "0x".to_string()
}

fn default_delivery_timeout_ms() -> u64 {
    60_000
}

fn default_delivery_poll_interval_ms() -> u64 {
    5_000
}

fn default_observation_window_blocks() -> u64 {
    300
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(".mirror-state.json")
}

fn default_chunk_size() -> u64 {
    40_000
}

fn default_finality_blocks() -> u64 {
    1
}

fn default_polling_interval_ms() -> u64 {
    15_000
}

fn default_max_attempts() -> u32 {
    6
}

fn default_bump_percent() -> u64 {
    150
}

fn default_retry_backoff_ms() -> u64 {
    5_000
}

fn default_gas_limit() -> u64 {
    500_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_confirmation_timeout_ms() -> u64 {
    120_000
}

fn default_confirmation_poll_interval_ms() -> u64 {
    1_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fee_headroom_percent: default_fee_headroom_percent(),
            transport_options: default_transport_options(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            delivery_poll_interval_ms: default_delivery_poll_interval_ms(),
            observation_window_blocks: default_observation_window_blocks(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            chunk_size: default_chunk_size(),
            lookback_blocks: default_chunk_size(),
            finality_blocks: default_finality_blocks(),
            polling_interval_ms: default_polling_interval_ms(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            bump_percent: default_bump_percent(),
            retry_backoff_ms: default_retry_backoff_ms(),
            gas_limit: default_gas_limit(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            confirmation_poll_interval_ms: default_confirmation_poll_interval_ms(),
        }
    }
}

impl DispatchConfig {
    /// Decoded transport options bytes.
    pub fn options_bytes(&self) -> Result<Vec<u8>, MirrorError> {
        let clean = self
            .transport_options
            .strip_prefix("0x")
            .unwrap_or(&self.transport_options);
        hex::decode(clean).map_err(|_| {
            MirrorError::Config(format!(
                "dispatch.transport_options '{}' is not valid hex",
                self.transport_options
            ))
        })
    }
}

impl GasConfig {
    pub fn policy(&self) -> GasPolicy {
        GasPolicy {
            max_attempts: self.max_attempts,
            bump_percent: u128::from(self.bump_percent),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn confirmation(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: Duration::from_millis(self.confirmation_timeout_ms),
            poll_interval: Duration::from_millis(self.confirmation_poll_interval_ms),
        }
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates chain uniqueness and tuning bounds.
    ///
    /// This function ensures that:
    /// - At least one spoke is configured
    /// - Chain names, chain ids and domains are unique across hub and spokes
    /// - Chunk size, headroom, bump and attempt limits are usable
    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.spokes.is_empty() {
            return Err(MirrorError::Config(
                "at least one [[spokes]] entry is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut chain_ids = HashSet::new();
        let mut domains = HashSet::new();
        for chain in self.chains() {
            if !names.insert(chain.name.as_str()) {
                return Err(MirrorError::Config(format!(
                    "duplicate chain name '{}'",
                    chain.name
                )));
            }
            if !chain_ids.insert(chain.chain_id) {
                return Err(MirrorError::Config(format!(
                    "chain '{}' reuses chain ID {}. Each chain must have a unique chain ID.",
                    chain.name, chain.chain_id
                )));
            }
            if !domains.insert(chain.domain) {
                return Err(MirrorError::Config(format!(
                    "chain '{}' reuses domain {}. Each chain must have a unique domain.",
                    chain.name, chain.domain
                )));
            }
            chain.origin_domain()?;
        }

        if self.reconcile.chunk_size == 0 {
            return Err(MirrorError::Config(
                "reconcile.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.dispatch.fee_headroom_percent < 100 {
            return Err(MirrorError::Config(format!(
                "dispatch.fee_headroom_percent {} would attach less than the quoted fee",
                self.dispatch.fee_headroom_percent
            )));
        }
        if self.gas.bump_percent <= 100 {
            return Err(MirrorError::Config(format!(
                "gas.bump_percent {} must exceed 100",
                self.gas.bump_percent
            )));
        }
        if self.gas.max_attempts == 0 {
            return Err(MirrorError::Config(
                "gas.max_attempts must be at least 1".to_string(),
            ));
        }
        self.dispatch.options_bytes()?;

        Ok(())
    }

    /// Hub first, then spokes in configuration order.
    pub fn chains(&self) -> impl Iterator<Item = &ChainConfig> {
        std::iter::once(&self.hub).chain(self.spokes.iter())
    }

    pub fn spoke(&self, name: &str) -> Result<&ChainConfig, MirrorError> {
        self.spokes
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| MirrorError::Config(format!("unknown spoke '{}'", name)))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, MirrorError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| MirrorError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, MirrorError> {
        if !path.exists() {
            return Err(MirrorError::Config(format!(
                "Configuration file '{}' not found. Please copy the template:\n\
                 cp config/log-mirror.template.toml config/log-mirror.toml\n\
                 Then edit config/log-mirror.toml with your actual values.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| MirrorError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Loads configuration from `LOG_MIRROR_CONFIG_PATH` or the default path.
    pub fn load() -> Result<Self, MirrorError> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }
}
