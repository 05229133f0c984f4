//! Per-chain handles
//!
//! A [`Network`] bundles one chain's client, its resolved contract address and
//! (when the key is available) its administrative wallet. Each wallet only
//! ever signs for its own chain.

use crate::config::{ChainConfig, Config, TransportKind};
use crate::deployment::resolve_contract_address;
use crate::error::{ChainResultExt, MirrorError};
use chain_clients_common::EvmAddress;
use chain_clients_evm::{
    EvmClient, EvmSigner, EvmWallet, GasSettings, SubmittedTransaction, TransactionRequest,
};
use futures::future::try_join_all;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    pub domain: u32,
    pub origin_domain: u32,
    pub contract: EvmAddress,
    pub mailbox: Option<EvmAddress>,
    pub transport: TransportKind,
    client: EvmClient,
    wallet: Option<EvmWallet>,
    private_key_env: String,
}

impl Network {
    pub async fn connect(chain: &ChainConfig, config: &Config) -> Result<Self, MirrorError> {
        let client =
            EvmClient::with_timeout(&chain.rpc_url, config.rpc.request_timeout()).on_chain(&chain.name)?;
        let contract = resolve_contract_address(chain, &client).await?;

        let wallet = match chain.get_private_key() {
            Ok(key) => {
                let reported = client.get_chain_id().await.on_chain(&chain.name)?;
                if reported != chain.chain_id {
                    return Err(MirrorError::Config(format!(
                        "{}: configured chain id {} but {} reports {}",
                        chain.name, chain.chain_id, chain.rpc_url, reported
                    )));
                }
                let signer = EvmSigner::from_hex(&key).on_chain(&chain.name)?;
                let gas = GasSettings {
                    policy: config.gas.policy(),
                    priority_fee_wei: chain.priority_fee(),
                    gas_limit: config.gas.gas_limit,
                    confirmation: config.rpc.confirmation(),
                };
                Some(EvmWallet::new(client.clone(), signer, chain.chain_id, gas))
            }
            Err(_) => {
                debug!(
                    "{}: {} not set, chain is read-only",
                    chain.name, chain.private_key_env
                );
                None
            }
        };

        info!(
            "{}: contract {} (chain id {}, domain {})",
            chain.name, contract, chain.chain_id, chain.domain
        );

        Ok(Self {
            name: chain.name.clone(),
            chain_id: chain.chain_id,
            domain: chain.domain,
            origin_domain: chain.origin_domain()?,
            contract,
            mailbox: chain.mailbox_addr,
            transport: chain.transport,
            client,
            wallet,
            private_key_env: chain.private_key_env.clone(),
        })
    }

    pub fn client(&self) -> &EvmClient {
        &self.client
    }

    /// The administrative wallet, or `MissingCredential` on a read-only chain.
    pub fn wallet(&self) -> Result<&EvmWallet, MirrorError> {
        self.wallet
            .as_ref()
            .ok_or_else(|| MirrorError::MissingCredential {
                chain: self.name.clone(),
                env: self.private_key_env.clone(),
            })
    }

    /// `eth_call` against any address on this chain.
    pub async fn call(&self, to: &EvmAddress, data: &[u8]) -> Result<Vec<u8>, MirrorError> {
        self.client.call(to, data).await.on_chain(&self.name)
    }

    /// `eth_call` against this chain's hub or spoke contract.
    pub async fn call_contract(&self, data: &[u8]) -> Result<Vec<u8>, MirrorError> {
        self.call(&self.contract, data).await
    }

    pub async fn submit(
        &self,
        to: &EvmAddress,
        data: Vec<u8>,
        value: u128,
    ) -> Result<SubmittedTransaction, MirrorError> {
        let request = TransactionRequest {
            to: *to,
            data,
            value,
        };
        self.wallet()?
            .send_transaction(&request)
            .await
            .on_chain(&self.name)
    }

    pub async fn submit_to_contract(
        &self,
        data: Vec<u8>,
        value: u128,
    ) -> Result<SubmittedTransaction, MirrorError> {
        let contract = self.contract;
        self.submit(&contract, data, value).await
    }
}

/// The hub and every configured spoke, connected.
#[derive(Debug)]
pub struct Topology {
    pub hub: Network,
    pub spokes: Vec<Network>,
}

impl Topology {
    pub async fn connect(config: &Config) -> Result<Self, MirrorError> {
        let hub = Network::connect(&config.hub, config).await?;
        let spokes = try_join_all(
            config
                .spokes
                .iter()
                .map(|spoke| Network::connect(spoke, config)),
        )
        .await?;
        Ok(Self { hub, spokes })
    }

    pub fn spoke(&self, name: &str) -> Result<&Network, MirrorError> {
        self.spokes
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| MirrorError::Config(format!("unknown spoke '{}'", name)))
    }

    pub fn spoke_by_domain(&self, domain: u32) -> Option<&Network> {
        self.spokes.iter().find(|s| s.domain == domain)
    }

    /// Hub or spoke by name.
    pub fn network(&self, name: &str) -> Result<&Network, MirrorError> {
        if self.hub.name == name {
            return Ok(&self.hub);
        }
        self.spoke(name)
    }
}
