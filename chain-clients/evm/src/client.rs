//! EVM JSON-RPC client
//!
//! Thin typed wrapper over the handful of `eth_*` methods the relay needs.
//! Every request is bounded by a timeout; a response carrying a JSON-RPC
//! error object is classified before it reaches the caller.

use crate::error::{classify_rpc_error, EvmError};
use crate::types::{
    decode_hex_data, parse_quantity, EvmLog, EvmReceipt, JsonRpcRequest, JsonRpcResponse,
    LogFilter,
};
use chain_clients_common::{Bytes32, EvmAddress};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bounds for waiting on transaction inclusion.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Client for interacting with one EVM chain over JSON-RPC.
#[derive(Debug, Clone)]
pub struct EvmClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl EvmClient {
    pub fn new(base_url: &str) -> Result<Self, EvmError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, request_timeout: Duration) -> Result<Self, EvmError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EvmError::Transport {
                method: "client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one JSON-RPC request and deserializes its `result`.
    ///
    /// A `null` result deserializes into `Option<T>` as `None`.
    pub async fn json_rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, EvmError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let rpc_future = async {
            let response = self
                .client
                .post(&self.base_url)
                .json(&request)
                .send()
                .await
                .map_err(|e| EvmError::Transport {
                    method: method.to_string(),
                    message: e.to_string(),
                })?;
            response
                .json::<JsonRpcResponse>()
                .await
                .map_err(|e| EvmError::MalformedResponse {
                    method: method.to_string(),
                    message: e.to_string(),
                })
        };

        let response = tokio::time::timeout(self.request_timeout, rpc_future)
            .await
            .map_err(|_| EvmError::Timeout {
                method: method.to_string(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            })??;

        if let Some(error) = response.error {
            return Err(classify_rpc_error(method, error.code, &error.message));
        }

        serde_json::from_value(response.result.unwrap_or(Value::Null)).map_err(|e| {
            EvmError::MalformedResponse {
                method: method.to_string(),
                message: e.to_string(),
            }
        })
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u128, EvmError> {
        let hex: String = self.json_rpc(method, params).await?;
        parse_quantity(&hex)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_block_number(&self) -> Result<u64, EvmError> {
        Ok(self.quantity("eth_blockNumber", vec![]).await? as u64)
    }

    pub async fn get_chain_id(&self) -> Result<u64, EvmError> {
        Ok(self.quantity("eth_chainId", vec![]).await? as u64)
    }

    /// Base fee of the latest block, `None` on chains without EIP-1559.
    pub async fn get_latest_base_fee(&self) -> Result<Option<u128>, EvmError> {
        let block: Option<Value> = self
            .json_rpc("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await?;
        match block
            .as_ref()
            .and_then(|b| b.get("baseFeePerGas"))
            .and_then(|f| f.as_str())
        {
            Some(fee) => Ok(Some(parse_quantity(fee)?)),
            None => Ok(None),
        }
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EvmLog>, EvmError> {
        debug!(
            "eth_getLogs {} [{}, {}]",
            filter.address, filter.from_block, filter.to_block
        );
        self.json_rpc("eth_getLogs", vec![filter.to_json()]).await
    }

    /// `eth_call` against the latest block, returning the raw return data.
    pub async fn call(&self, to: &EvmAddress, data: &[u8]) -> Result<Vec<u8>, EvmError> {
        let result: String = self
            .json_rpc(
                "eth_call",
                vec![
                    json!({
                        "to": to.to_string(),
                        "data": format!("0x{}", hex::encode(data)),
                    }),
                    json!("latest"),
                ],
            )
            .await?;
        decode_hex_data("eth_call", &result)
    }

    pub async fn get_code(&self, address: &EvmAddress) -> Result<Vec<u8>, EvmError> {
        let code: String = self
            .json_rpc("eth_getCode", vec![json!(address.to_string()), json!("latest")])
            .await?;
        decode_hex_data("eth_getCode", &code)
    }

    pub async fn get_balance(&self, address: &EvmAddress) -> Result<u128, EvmError> {
        self.quantity(
            "eth_getBalance",
            vec![json!(address.to_string()), json!("latest")],
        )
        .await
    }

    /// Pending nonce, so queued transactions from the same key are counted.
    pub async fn get_transaction_count(&self, address: &EvmAddress) -> Result<u64, EvmError> {
        Ok(self
            .quantity(
                "eth_getTransactionCount",
                vec![json!(address.to_string()), json!("pending")],
            )
            .await? as u64)
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &Bytes32,
    ) -> Result<Option<EvmReceipt>, EvmError> {
        self.json_rpc("eth_getTransactionReceipt", vec![json!(tx_hash.to_string())])
            .await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<Bytes32, EvmError> {
        self.json_rpc(
            "eth_sendRawTransaction",
            vec![json!(format!("0x{}", hex::encode(raw_tx)))],
        )
        .await
    }

    /// Polls for a receipt until one appears or the policy's timeout elapses.
    ///
    /// Transient poll failures are retried within the same deadline. Running
    /// out of time yields [`EvmError::TransactionNotConfirmed`], which callers
    /// may treat as "re-poll later".
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &Bytes32,
        policy: &ConfirmationPolicy,
    ) -> Result<EvmReceipt, EvmError> {
        let started = Instant::now();
        loop {
            match self.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    debug!("Receipt poll for {} failed, retrying: {}", tx_hash, e);
                }
                Err(e) => return Err(e),
            }

            if started.elapsed() + policy.poll_interval > policy.timeout {
                return Err(EvmError::TransactionNotConfirmed {
                    tx_hash: *tx_hash,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    }
}
