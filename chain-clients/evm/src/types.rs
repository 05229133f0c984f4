//! JSON-RPC wire types

use crate::error::EvmError;
use chain_clients_common::{Bytes32, EvmAddress};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// JSON-RPC ENVELOPE
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Vec<Value>,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

// ============================================================================
// LOGS AND RECEIPTS
// ============================================================================

/// EVM event log as returned by `eth_getLogs` and inside receipts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmLog {
    pub address: EvmAddress,
    pub topics: Vec<Bytes32>,
    pub data: String,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<Bytes32>,
    #[serde(rename = "logIndex", default)]
    pub log_index: Option<String>,
}

impl EvmLog {
    /// Non-indexed event data as bytes.
    pub fn data_bytes(&self) -> Result<Vec<u8>, EvmError> {
        decode_hex_data("eth_getLogs", &self.data)
    }

    /// Block number, absent for pending logs.
    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .as_deref()
            .and_then(|b| parse_quantity(b).ok())
            .map(|b| b as u64)
    }
}

/// Transaction receipt from `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Bytes32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(rename = "contractAddress", default)]
    pub contract_address: Option<EvmAddress>,
    #[serde(default)]
    pub logs: Vec<EvmLog>,
}

impl EvmReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    /// Logs emitted by `address` in this transaction.
    pub fn logs_from(&self, address: &EvmAddress) -> impl Iterator<Item = &EvmLog> {
        let address = *address;
        self.logs.iter().filter(move |log| log.address == address)
    }
}

/// Filter for `eth_getLogs` over an inclusive block range.
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub address: EvmAddress,
    pub from_block: u64,
    pub to_block: u64,
    /// Alternatives for topic0; empty matches every event.
    pub topic0: Vec<Bytes32>,
}

impl LogFilter {
    pub fn new(address: EvmAddress, from_block: u64, to_block: u64) -> Self {
        Self {
            address,
            from_block,
            to_block,
            topic0: Vec::new(),
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut filter = json!({
            "address": self.address.to_string(),
            "fromBlock": to_quantity(self.from_block as u128),
            "toBlock": to_quantity(self.to_block as u128),
        });
        if !self.topic0.is_empty() {
            let topics: Vec<String> = self.topic0.iter().map(|t| t.to_string()).collect();
            filter["topics"] = json!([topics]);
        }
        filter
    }
}

// ============================================================================
// QUANTITY HELPERS
// ============================================================================

/// Parses a 0x-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Result<u128, EvmError> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    if clean.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(clean, 16).map_err(|e| EvmError::MalformedResponse {
        method: "quantity".to_string(),
        message: format!("'{}' is not a hex quantity: {}", value, e),
    })
}

/// Formats a quantity the way nodes expect it (no leading zeros).
pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

pub(crate) fn decode_hex_data(method: &str, value: &str) -> Result<Vec<u8>, EvmError> {
    let clean = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(clean).map_err(|e| EvmError::MalformedResponse {
        method: method.to_string(),
        message: format!("invalid hex data: {}", e),
    })
}
