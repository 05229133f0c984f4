//! Signing account bound to one chain
//!
//! Combines the client, a local signer and the gas settings into the single
//! `send_transaction` entry point used for every state-changing call.

use crate::client::{ConfirmationPolicy, EvmClient};
use crate::error::EvmError;
use crate::gas::{submit_with_escalation, GasFees, GasPolicy, DEFAULT_BASE_FEE_WEI};
use crate::signer::EvmSigner;
use crate::transaction::Eip1559Transaction;
use crate::types::EvmReceipt;
use chain_clients_common::{Bytes32, EvmAddress};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct GasSettings {
    pub policy: GasPolicy,
    pub priority_fee_wei: u128,
    pub gas_limit: u64,
    pub confirmation: ConfirmationPolicy,
}

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub to: EvmAddress,
    pub data: Vec<u8>,
    pub value: u128,
}

/// A mined, successful transaction.
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub tx_hash: Bytes32,
    pub receipt: EvmReceipt,
    pub fees: GasFees,
    pub attempts: u32,
}

#[derive(Debug)]
pub struct EvmWallet {
    client: EvmClient,
    signer: EvmSigner,
    chain_id: u64,
    gas: GasSettings,
    /// Held from the nonce read until the receipt arrives.
    submission: Mutex<()>,
}

impl EvmWallet {
    pub fn new(client: EvmClient, signer: EvmSigner, chain_id: u64, gas: GasSettings) -> Self {
        Self {
            client,
            signer,
            chain_id,
            gas,
            submission: Mutex::new(()),
        }
    }

    pub fn address(&self) -> EvmAddress {
        self.signer.address()
    }

    pub fn client(&self) -> &EvmClient {
        &self.client
    }

    /// Fees for the first attempt, from the latest block's base fee.
    pub async fn initial_fees(&self) -> Result<GasFees, EvmError> {
        let base_fee = match self.client.get_latest_base_fee().await? {
            Some(fee) => fee,
            None => {
                debug!("No base fee on latest block, using {} wei", DEFAULT_BASE_FEE_WEI);
                DEFAULT_BASE_FEE_WEI
            }
        };
        Ok(GasFees::from_base_fee(base_fee, self.gas.priority_fee_wei))
    }

    /// Signs, submits and waits for one transaction.
    ///
    /// All attempts reuse the pending nonce read up front, so an escalated
    /// attempt replaces the previous one instead of queueing behind it.
    /// Concurrent callers sharing this wallet are served one at a time; two
    /// of them never sign with the same nonce.
    pub async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SubmittedTransaction, EvmError> {
        let _submission = self.submission.lock().await;
        let nonce = self.client.get_transaction_count(&self.address()).await?;
        let initial = self.initial_fees().await?;

        let client = &self.client;
        let signer = &self.signer;
        let chain_id = self.chain_id;
        let gas_limit = self.gas.gas_limit;

        let escalated = submit_with_escalation(&self.gas.policy, initial, move |fees, attempt| {
            let tx = Eip1559Transaction {
                chain_id,
                nonce,
                max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                max_fee_per_gas: fees.max_fee_per_gas,
                gas_limit,
                to: request.to,
                value: request.value,
                data: request.data.clone(),
            };
            async move {
                let raw = tx.sign(signer)?;
                debug!(
                    "Submitting tx to {} (attempt {}, nonce {}, maxFeePerGas {})",
                    tx.to, attempt, nonce, fees.max_fee_per_gas
                );
                client.send_raw_transaction(&raw).await
            }
        })
        .await?;

        let tx_hash = escalated.value;
        info!(
            "Submitted {} on chain {} after {} attempt(s)",
            tx_hash, self.chain_id, escalated.attempts
        );

        let receipt = self
            .client
            .wait_for_receipt(&tx_hash, &self.gas.confirmation)
            .await?;
        if !receipt.succeeded() {
            return Err(EvmError::Reverted { tx_hash });
        }

        Ok(SubmittedTransaction {
            tx_hash,
            receipt,
            fees: escalated.fees,
            attempts: escalated.attempts,
        })
    }
}
