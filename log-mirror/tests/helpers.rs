//! Shared test helpers for log-mirror tests
//!
//! This module provides helper functions used by the integration tests.
//!
//! The module is organized into several categories:
//! - **Constants**: Dummy addresses, chain ids and domains
//! - **Configuration Builders**: Functions to create hub/spoke test configurations
//! - **Fake Chain**: A stateful JSON-RPC responder standing in for an EVM node
//!   with a hub or spoke contract deployed

#![allow(dead_code)]

use chain_clients_common::{keccak256, to_peer_id, Bytes32, EvmAddress};
use chain_clients_evm::types::to_quantity;
use log_mirror::abi::codec::{encode, event_topic, selector, Decoder, Token};
use log_mirror::abi::{hub, mailbox, oapp, spoke};
use log_mirror::config::{
    ChainConfig, Config, DispatchConfig, GasConfig, ReconcileConfig, RpcConfig, TransportKind,
};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Well-known Hardhat account #0 private key (test-only)
pub const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address derived from `HARDHAT_KEY`
pub const HARDHAT_ADDR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Dummy hub contract address (EVM format, 20 bytes)
pub const DUMMY_HUB_CONTRACT_ADDR: &str = "0x000000000000000000000000000000000000000a";

/// Dummy spoke contract address (EVM format, 20 bytes)
pub const DUMMY_SPOKE_CONTRACT_ADDR: &str = "0x000000000000000000000000000000000000000b";

/// Dummy spoke-side mailbox address
pub const DUMMY_SPOKE_MAILBOX_ADDR: &str = "0x000000000000000000000000000000000000000c";

/// Dummy hub-side mailbox address
pub const DUMMY_HUB_MAILBOX_ADDR: &str = "0x000000000000000000000000000000000000000d";

/// Dummy log author
pub const DUMMY_AUTHOR_ADDR: &str = "0x0000000000000000000000000000000000000007";

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000012";

pub const TEST_HUB_NAME: &str = "hub";
pub const TEST_SPOKE_NAME: &str = "spoke-a";
pub const TEST_HUB_CHAIN_ID: u64 = 545;
pub const TEST_SPOKE_CHAIN_ID: u64 = 11_155_111;
pub const TEST_HUB_DOMAIN: u32 = 30_332;
pub const TEST_SPOKE_DOMAIN: u32 = 40_161;

pub const GWEI: u128 = 1_000_000_000;

/// Base fee reported by every fake chain's latest block
pub const TEST_BASE_FEE: u128 = 10 * GWEI;

/// Priority fee configured on test chains
pub const TEST_PRIORITY_FEE: u128 = 2 * GWEI;

pub fn addr(value: &str) -> EvmAddress {
    value.parse().expect("valid test address")
}

pub fn word(value: u64) -> Bytes32 {
    Bytes32::from_u64(value)
}

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Sets a uniquely named environment variable holding `HARDHAT_KEY`.
pub fn unique_key_env(prefix: &str) -> String {
    let name = format!("{}_{}", prefix, rand::thread_rng().gen::<u32>());
    std::env::set_var(&name, HARDHAT_KEY);
    name
}

/// Path in the temp directory that no other test uses.
pub fn temp_state_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "log-mirror-{}-{:016x}.json",
        label,
        rand::thread_rng().gen::<u64>()
    ))
}

pub fn build_chain_config(
    name: &str,
    rpc_url: &str,
    chain_id: u64,
    domain: u32,
    contract: &str,
    mailbox_addr: &str,
) -> ChainConfig {
    ChainConfig {
        name: name.to_string(),
        rpc_url: rpc_url.to_string(),
        chain_id,
        domain,
        contract_addr: Some(addr(contract)),
        deployment_record: None,
        mailbox_addr: Some(addr(mailbox_addr)),
        private_key_env: unique_key_env("LOG_MIRROR_TEST_KEY"),
        priority_fee_wei: Some(TEST_PRIORITY_FEE as u64),
        transport: TransportKind::Mailbox,
        origin_domain: None,
    }
}

/// Hub plus one spoke, tuned for fast tests (no backoff, short polling).
pub fn build_test_config(hub_url: &str, spoke_url: &str, transport: TransportKind) -> Config {
    let hub = build_chain_config(
        TEST_HUB_NAME,
        hub_url,
        TEST_HUB_CHAIN_ID,
        TEST_HUB_DOMAIN,
        DUMMY_HUB_CONTRACT_ADDR,
        DUMMY_HUB_MAILBOX_ADDR,
    );
    let mut spoke = build_chain_config(
        TEST_SPOKE_NAME,
        spoke_url,
        TEST_SPOKE_CHAIN_ID,
        TEST_SPOKE_DOMAIN,
        DUMMY_SPOKE_CONTRACT_ADDR,
        DUMMY_SPOKE_MAILBOX_ADDR,
    );
    spoke.transport = transport;

    Config {
        hub,
        spokes: vec![spoke],
        dispatch: DispatchConfig {
            delivery_timeout_ms: 100,
            delivery_poll_interval_ms: 20,
            ..DispatchConfig::default()
        },
        reconcile: ReconcileConfig {
            checkpoint_path: temp_state_path("checkpoint"),
            chunk_size: 50,
            lookback_blocks: 100,
            finality_blocks: 1,
            polling_interval_ms: 20,
        },
        gas: GasConfig {
            retry_backoff_ms: 0,
            ..GasConfig::default()
        },
        rpc: RpcConfig {
            request_timeout_ms: 5_000,
            confirmation_timeout_ms: 2_000,
            confirmation_poll_interval_ms: 10,
        },
    }
}

/// Running hub and spoke fake chains with a matching configuration.
pub struct TestEnv {
    pub hub_server: MockServer,
    pub spoke_server: MockServer,
    pub hub: FakeChain,
    pub spoke: FakeChain,
    pub config: Config,
}

impl TestEnv {
    pub async fn start(transport: TransportKind) -> Self {
        let hub_server = MockServer::start().await;
        let spoke_server = MockServer::start().await;

        let hub = FakeChain::new(TEST_HUB_CHAIN_ID, DUMMY_HUB_CONTRACT_ADDR, DUMMY_HUB_MAILBOX_ADDR);
        let spoke = FakeChain::new(
            TEST_SPOKE_CHAIN_ID,
            DUMMY_SPOKE_CONTRACT_ADDR,
            DUMMY_SPOKE_MAILBOX_ADDR,
        );
        hub.mount(&hub_server).await;
        spoke.mount(&spoke_server).await;

        let config = build_test_config(&hub_server.uri(), &spoke_server.uri(), transport);
        Self {
            hub_server,
            spoke_server,
            hub,
            spoke,
            config,
        }
    }

    /// Registers hub and spoke with each other directly in chain state.
    pub fn wire(&self) {
        self.hub.state().peers.insert(
            TEST_SPOKE_DOMAIN,
            to_peer_id(&addr(DUMMY_SPOKE_CONTRACT_ADDR)),
        );
        self.spoke
            .state()
            .hubs
            .insert(TEST_HUB_DOMAIN, to_peer_id(&addr(DUMMY_HUB_CONTRACT_ADDR)));
    }
}

// ============================================================================
// FAKE CHAIN
// ============================================================================

/// A transaction accepted by the fake chain.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub nonce: u64,
    pub to: EvmAddress,
    pub selector: [u8; 4],
    pub data: Vec<u8>,
    pub value: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone)]
pub struct CompanyEntry {
    pub owner: EvmAddress,
    pub has_own_chain: bool,
    pub destination_domain: u32,
    pub metadata_uri: String,
}

/// Node and contract state behind one fake chain. Tests mutate it directly.
#[derive(Debug)]
pub struct ChainState {
    pub chain_id: u64,
    pub block_number: u64,
    pub base_fee: u128,
    pub nonce: u64,
    pub contract: EvmAddress,
    pub mailbox: EvmAddress,
    pub owner: EvmAddress,
    pub peers: HashMap<u32, Bytes32>,
    pub hubs: HashMap<u32, Bytes32>,
    pub recorded: HashSet<(u32, Bytes32)>,
    pub companies: HashMap<u128, CompanyEntry>,
    pub ack_fee_wei: u128,
    /// Returned by both `quote` and `quoteDispatch`
    pub quote_fee: u128,
    pub delivered: HashSet<Bytes32>,
    pub emit_ack: bool,
    pub ack_ok: bool,
    /// Accept setPeer/setHub without changing state
    pub ignore_peer_writes: bool,
    /// Reject this many submissions as underpriced
    pub underpriced_remaining: u32,
    /// The next recordReceiptFromOffchain loses a race to another writer
    pub record_race: bool,
    /// recordReceiptFromOffchain submissions fail with a rate limit
    pub fail_record_send: bool,
    /// eth_getLogs starting at this block fails with a rate limit
    pub fail_logs_from: Option<u64>,
    pub logs: Vec<Value>,
    pub receipts: HashMap<String, Value>,
    pub methods: Vec<String>,
    pub calls: Vec<[u8; 4]>,
    pub sent: Vec<SentTx>,
    pub rejected_max_fees: Vec<u128>,
    pub log_ranges: Vec<(u64, u64)>,
}

type RpcOutcome = Result<Value, (i64, String)>;

fn revert() -> (i64, String) {
    (3, "execution reverted".to_string())
}

fn hex_data(data: &[u8]) -> Value {
    json!(format!("0x{}", hex::encode(data)))
}

fn parse_hex(value: &Value) -> Vec<u8> {
    let s = value.as_str().unwrap_or("0x");
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).expect("hex param")
}

fn parse_block(value: &Value) -> u64 {
    let s = value.as_str().expect("block param");
    u64::from_str_radix(s.trim_start_matches("0x"), 16).expect("hex block")
}

impl ChainState {
    fn new(chain_id: u64, contract: EvmAddress, mailbox: EvmAddress) -> Self {
        Self {
            chain_id,
            block_number: 1_000,
            base_fee: TEST_BASE_FEE,
            nonce: 0,
            contract,
            mailbox,
            owner: addr(HARDHAT_ADDR),
            peers: HashMap::new(),
            hubs: HashMap::new(),
            recorded: HashSet::new(),
            companies: HashMap::new(),
            ack_fee_wei: 0,
            quote_fee: 0,
            delivered: HashSet::new(),
            emit_ack: true,
            ack_ok: true,
            ignore_peer_writes: false,
            underpriced_remaining: 0,
            record_race: false,
            fail_record_send: false,
            fail_logs_from: None,
            logs: Vec::new(),
            receipts: HashMap::new(),
            methods: Vec::new(),
            calls: Vec::new(),
            sent: Vec::new(),
            rejected_max_fees: Vec::new(),
            log_ranges: Vec::new(),
        }
    }

    pub fn called(&self, signature: &str) -> bool {
        self.calls.contains(&selector(signature))
    }

    pub fn sent_with(&self, signature: &str) -> Vec<SentTx> {
        let wanted = selector(signature);
        self.sent.iter().filter(|tx| tx.selector == wanted).cloned().collect()
    }

    pub fn log_json(&self, topics: &[Bytes32], data: &[u8], block: u64, tx_hash: &Bytes32) -> Value {
        json!({
            "address": self.contract.to_string(),
            "topics": topics.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            "data": hex_data(data),
            "blockNumber": to_quantity(block as u128),
            "transactionHash": tx_hash.to_string(),
            "logIndex": "0x0",
        })
    }

    /// Adds a `SpokeLogPushed` event at `block`.
    pub fn push_spoke_log(
        &mut self,
        block: u64,
        log_id: Bytes32,
        author: EvmAddress,
        content_hash: Bytes32,
        metadata: &str,
    ) {
        let data = encode(&[Token::Bytes32(content_hash), Token::String(metadata.to_string())]);
        let topics = [event_topic(spoke::SPOKE_LOG_PUSHED), log_id, to_peer_id(&author)];
        let log = self.log_json(&topics, &data, block, &keccak256(log_id.as_bytes()));
        self.logs.push(log);
    }

    fn handle(&mut self, rpc_method: &str, params: &Value) -> RpcOutcome {
        match rpc_method {
            "eth_blockNumber" => Ok(json!(to_quantity(self.block_number as u128))),
            "eth_chainId" => Ok(json!(to_quantity(self.chain_id as u128))),
            "eth_getBlockByNumber" => Ok(json!({
                "number": to_quantity(self.block_number as u128),
                "baseFeePerGas": to_quantity(self.base_fee),
            })),
            "eth_getTransactionCount" => Ok(json!(to_quantity(self.nonce as u128))),
            "eth_getCode" => Ok(json!("0x6080604052")),
            "eth_getBalance" => Ok(json!(to_quantity(1_000_000_000_000_000_000))),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default().to_lowercase();
                Ok(self.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            "eth_call" => {
                let data = parse_hex(&params[0]["data"]);
                self.eth_call(&data).map(|out| hex_data(&out))
            }
            "eth_getLogs" => self.get_logs(&params[0]),
            "eth_sendRawTransaction" => self.send_raw(&parse_hex(&params[0])),
            other => Err((-32601, format!("method {} not found", other))),
        }
    }

    fn eth_call(&mut self, data: &[u8]) -> Result<Vec<u8>, (i64, String)> {
        if data.len() < 4 {
            return Err(revert());
        }
        let sel = [data[0], data[1], data[2], data[3]];
        self.calls.push(sel);
        let args = Decoder::new(&data[4..], "fake chain");

        if sel == selector(hub::PEERS) {
            let domain = args.uint_u32(0).expect("domain");
            let peer = self.peers.get(&domain).copied().unwrap_or(Bytes32::ZERO);
            return Ok(encode(&[Token::Bytes32(peer)]));
        }
        if sel == selector(spoke::HUBS) {
            let domain = args.uint_u32(0).expect("domain");
            let peer = self.hubs.get(&domain).copied().unwrap_or(Bytes32::ZERO);
            return Ok(encode(&[Token::Bytes32(peer)]));
        }
        if sel == selector(hub::HAS_OFFCHAIN_RECEIPT) {
            let key = (args.uint_u32(0).expect("origin"), args.bytes32(1).expect("log id"));
            return Ok(encode(&[Token::Bool(self.recorded.contains(&key))]));
        }
        if sel == selector(hub::COMPANIES) {
            let id = args.uint(0).expect("company id");
            let tokens = match self.companies.get(&id) {
                Some(c) => vec![
                    Token::Address(c.owner),
                    Token::Bool(c.has_own_chain),
                    Token::Uint(c.destination_domain as u128),
                    Token::String(c.metadata_uri.clone()),
                    Token::Bool(true),
                ],
                None => vec![
                    Token::Address(EvmAddress::ZERO),
                    Token::Bool(false),
                    Token::Uint(0),
                    Token::String(String::new()),
                    Token::Bool(false),
                ],
            };
            return Ok(encode(&tokens));
        }
        if sel == selector(hub::OWNER) {
            return Ok(encode(&[Token::Address(self.owner)]));
        }
        if sel == selector(hub::MAILBOX) {
            return Ok(encode(&[Token::Address(self.mailbox)]));
        }
        if sel == selector(spoke::ACK_FEE_WEI) {
            return Ok(encode(&[Token::Uint(self.ack_fee_wei)]));
        }
        if sel == selector(spoke::FLOW_DOMAIN) {
            return Ok(encode(&[Token::Uint(TEST_HUB_DOMAIN as u128)]));
        }
        if sel == selector(oapp::QUOTE) {
            return Ok(encode(&[Token::Uint(self.quote_fee), Token::Uint(0)]));
        }
        if sel == selector(mailbox::QUOTE_DISPATCH) {
            return Ok(encode(&[Token::Uint(self.quote_fee)]));
        }
        if sel == selector(mailbox::DELIVERED) {
            let id = args.bytes32(0).expect("message id");
            return Ok(encode(&[Token::Bool(self.delivered.contains(&id))]));
        }
        Err(revert())
    }

    fn get_logs(&mut self, filter: &Value) -> RpcOutcome {
        let from = parse_block(&filter["fromBlock"]);
        let to = parse_block(&filter["toBlock"]);
        self.log_ranges.push((from, to));
        if self.fail_logs_from == Some(from) {
            return Err((429, "rate limited".to_string()));
        }

        let address = filter["address"].as_str().unwrap_or_default().to_lowercase();
        let topic0: Vec<String> = filter["topics"][0]
            .as_array()
            .map(|ts| ts.iter().filter_map(|t| t.as_str().map(str::to_lowercase)).collect())
            .unwrap_or_default();

        let matching = self
            .logs
            .iter()
            .filter(|log| {
                let block = parse_block(&log["blockNumber"]);
                let log_topic = log["topics"][0].as_str().unwrap_or_default().to_lowercase();
                block >= from
                    && block <= to
                    && log["address"].as_str().unwrap_or_default().to_lowercase() == address
                    && (topic0.is_empty() || topic0.contains(&log_topic))
            })
            .cloned()
            .collect::<Vec<_>>();
        Ok(Value::Array(matching))
    }

    fn send_raw(&mut self, raw: &[u8]) -> RpcOutcome {
        let tx = decode_raw_tx(raw);
        if self.underpriced_remaining > 0 {
            self.underpriced_remaining -= 1;
            self.rejected_max_fees.push(tx.max_fee_per_gas);
            return Err((-32000, "replacement transaction underpriced".to_string()));
        }
        if self.fail_record_send && tx.selector == selector(hub::RECORD_RECEIPT_FROM_OFFCHAIN) {
            return Err((429, "rate limited".to_string()));
        }

        if tx.nonce != self.nonce {
            let reason = if tx.nonce < self.nonce { "too low" } else { "too high" };
            return Err((
                -32000,
                format!("nonce {}: next nonce {}, tx nonce {}", reason, self.nonce, tx.nonce),
            ));
        }

        let tx_hash = keccak256(raw);
        self.nonce += 1;
        let (success, logs) = self.apply(&tx, &tx_hash);
        self.logs.extend(logs.iter().cloned());
        self.receipts.insert(
            tx_hash.to_string(),
            json!({
                "transactionHash": tx_hash.to_string(),
                "status": if success { "0x1" } else { "0x0" },
                "blockNumber": to_quantity(self.block_number as u128),
                "contractAddress": null,
                "logs": logs,
            }),
        );
        self.sent.push(tx);
        Ok(json!(tx_hash.to_string()))
    }

    /// Applies a transaction's contract effects; returns (success, emitted logs).
    fn apply(&mut self, tx: &SentTx, tx_hash: &Bytes32) -> (bool, Vec<Value>) {
        let args = Decoder::new(&tx.data[4..], "fake chain tx");
        let block = self.block_number;
        let sel = tx.selector;

        if sel == selector(hub::SET_PEER) {
            if !self.ignore_peer_writes {
                let domain = args.uint_u32(0).expect("domain");
                self.peers.insert(domain, args.bytes32(1).expect("peer"));
            }
            return (true, vec![]);
        }
        if sel == selector(spoke::SET_HUB) {
            if !self.ignore_peer_writes {
                let domain = args.uint_u32(0).expect("domain");
                self.hubs.insert(domain, args.bytes32(1).expect("hub"));
            }
            return (true, vec![]);
        }
        if sel == selector(hub::RECORD_RECEIPT_FROM_OFFCHAIN) {
            let key = (args.uint_u32(0).expect("origin"), args.bytes32(1).expect("log id"));
            if self.record_race {
                self.record_race = false;
                self.recorded.insert(key);
                return (false, vec![]);
            }
            if !self.recorded.insert(key) {
                return (false, vec![]);
            }
            let author = args.address(4).expect("author");
            let log = self.log_json(
                &[event_topic(hub::OFFCHAIN_RECEIPT_RECORDED), word(key.0 as u64), key.1],
                &encode(&[Token::Address(author)]),
                block,
                tx_hash,
            );
            return (true, vec![log]);
        }
        if sel == selector(spoke::PUSH_SPOKE_LOG) {
            let log_id = args.bytes32(0).expect("log id");
            let content_hash = args.bytes32(1).expect("content hash");
            let metadata = args.string(2).expect("metadata");
            let pushed = self.log_json(
                &[event_topic(spoke::SPOKE_LOG_PUSHED), log_id, to_peer_id(&self.owner)],
                &encode(&[Token::Bytes32(content_hash), Token::String(metadata)]),
                block,
                tx_hash,
            );
            let dispatched = self.log_json(
                &[event_topic(spoke::SPOKE_DISPATCHED), log_id],
                &encode(&[
                    Token::Bytes32(keccak256(log_id.as_bytes())),
                    Token::Uint(TEST_HUB_DOMAIN as u128),
                    Token::Address(addr(DUMMY_HUB_CONTRACT_ADDR)),
                ]),
                block,
                tx_hash,
            );
            return (true, vec![pushed, dispatched]);
        }
        if sel == selector(oapp::SEND) {
            let destination = args.uint_u32(0).expect("destination");
            return (true, self.ack_logs(0, Bytes32::ZERO, destination, 0, block, tx_hash));
        }
        if sel == selector(hub::PUSH_BLOCK) {
            let company_id = args.uint(0).expect("company id");
            let payload_hash = args.bytes32(1).expect("payload hash");
            let nonce = args.uint_u64(4).expect("nonce");
            let destination = self
                .companies
                .get(&company_id)
                .map(|c| c.destination_domain)
                .unwrap_or(0);
            return (
                true,
                self.ack_logs(company_id, payload_hash, destination, nonce, block, tx_hash),
            );
        }
        if sel == selector(spoke::SET_ACK_FEE_WEI) {
            self.ack_fee_wei = args.uint(0).expect("fee");
            return (true, vec![]);
        }
        if sel == selector(hub::REGISTER_COMPANY) {
            self.companies.insert(
                args.uint(0).expect("company id"),
                CompanyEntry {
                    owner: args.address(1).expect("owner"),
                    has_own_chain: args.bool(2).expect("has own chain"),
                    destination_domain: args.uint_u32(3).expect("destination"),
                    metadata_uri: args.string(4).expect("metadata uri"),
                },
            );
            return (true, vec![]);
        }
        if sel == selector(hub::PUSH_HUB_LOG) || sel == selector(spoke::SET_HYPERLANE) {
            return (true, vec![]);
        }
        (false, vec![])
    }

    fn ack_logs(
        &self,
        company_id: u128,
        payload_hash: Bytes32,
        destination: u32,
        nonce: u64,
        block: u64,
        tx_hash: &Bytes32,
    ) -> Vec<Value> {
        if !self.emit_ack {
            return vec![];
        }
        let company_word = Bytes32(encode(&[Token::Uint(company_id)]).try_into().expect("one word"));
        vec![self.log_json(
            &[event_topic(hub::MIRROR_ACKED), company_word],
            &encode(&[
                Token::Bytes32(payload_hash),
                Token::Uint(destination as u128),
                Token::Bool(self.ack_ok),
                Token::Bytes32(keccak256(tx_hash.as_bytes())),
                Token::Uint(nonce as u128),
            ]),
            block,
            tx_hash,
        )]
    }
}

/// Shared handle to one fake chain; mounted as the responder of a MockServer.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new(chain_id: u64, contract: &str, mailbox_addr: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::new(
                chain_id,
                addr(contract),
                addr(mailbox_addr),
            ))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().expect("fake chain state")
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }
}

impl Respond for FakeChain {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let rpc_method = body["method"].as_str().unwrap_or_default().to_string();

        let mut state = self.state();
        state.methods.push(rpc_method.clone());
        let envelope = match state.handle(&rpc_method, &body["params"]) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": body["id"], "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "error": { "code": code, "message": message }
            }),
        };
        ResponseTemplate::new(200).set_body_json(envelope)
    }
}

// ============================================================================
// RAW TRANSACTION DECODING
// ============================================================================

enum Rlp {
    Bytes(Vec<u8>),
    List(Vec<Rlp>),
}

fn be_len(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize)
}

fn decode_rlp(data: &[u8]) -> (Rlp, usize) {
    let prefix = data[0];
    match prefix {
        0x00..=0x7f => (Rlp::Bytes(vec![prefix]), 1),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            (Rlp::Bytes(data[1..1 + len].to_vec()), 1 + len)
        }
        0xb8..=0xbf => {
            let len_len = (prefix - 0xb7) as usize;
            let len = be_len(&data[1..1 + len_len]);
            let start = 1 + len_len;
            (Rlp::Bytes(data[start..start + len].to_vec()), start + len)
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            (Rlp::List(decode_rlp_items(&data[1..1 + len])), 1 + len)
        }
        _ => {
            let len_len = (prefix - 0xf7) as usize;
            let len = be_len(&data[1..1 + len_len]);
            let start = 1 + len_len;
            (
                Rlp::List(decode_rlp_items(&data[start..start + len])),
                start + len,
            )
        }
    }
}

fn decode_rlp_items(mut data: &[u8]) -> Vec<Rlp> {
    let mut items = Vec::new();
    while !data.is_empty() {
        let (item, used) = decode_rlp(data);
        items.push(item);
        data = &data[used..];
    }
    items
}

fn rlp_bytes(item: &Rlp) -> &[u8] {
    match item {
        Rlp::Bytes(b) => b,
        Rlp::List(_) => panic!("expected RLP bytes"),
    }
}

fn rlp_uint(item: &Rlp) -> u128 {
    rlp_bytes(item)
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | *b as u128)
}

/// Decodes a signed type-2 transaction: 0x02 || rlp([chainId, nonce, tip, maxFee, gas, to, value, data, ...]).
pub fn decode_raw_tx(raw: &[u8]) -> SentTx {
    assert_eq!(raw[0], 0x02, "expected an EIP-1559 transaction");
    let fields = match decode_rlp(&raw[1..]).0 {
        Rlp::List(fields) => fields,
        Rlp::Bytes(_) => panic!("expected RLP list"),
    };
    let mut to = [0u8; 20];
    to.copy_from_slice(rlp_bytes(&fields[5]));
    let data = rlp_bytes(&fields[7]).to_vec();
    SentTx {
        nonce: rlp_uint(&fields[1]) as u64,
        to: EvmAddress(to),
        selector: [data[0], data[1], data[2], data[3]],
        data,
        value: rlp_uint(&fields[6]),
        max_fee_per_gas: rlp_uint(&fields[3]),
        max_priority_fee_per_gas: rlp_uint(&fields[2]),
    }
}
