//! Log Mirror CLI
//!
//! Operator entry point for wiring, dispatch, reconciliation and diagnostics.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin log-mirror -- --config config/log-mirror.toml wire spoke-a
//! cargo run --bin log-mirror -- push-log spoke-a --content "hello" --wait
//! cargo run --bin log-mirror -- mirror --continuous
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! LOG_MIRROR_CONFIG_PATH=config/log-mirror.toml cargo run --bin log-mirror -- inspect
//! ```
//!
//! Exit codes: 0 success (soft failures are warnings), 2 configuration,
//! 3 invariant violation, 4 transient.

use anyhow::{Context, Result};
use chain_clients_common::{content_hash, derive_log_id, Bytes32, EvmAddress};
use clap::{Parser, Subcommand};
use log_mirror::config::Config;
use log_mirror::diagnostics;
use log_mirror::dispatch::{AckStatus, DeliveryStatus, DispatchEngine, DispatchOutcome};
use log_mirror::error::{MirrorError, SoftFailure};
use log_mirror::network::Topology;
use log_mirror::reconcile::ReconciliationWorker;
use log_mirror::registry::{self, Registration};
use log_mirror::types::{BlockMirror, CompanyRegistration, LogRecord};
use log_mirror::wiring;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "log-mirror")]
#[command(about = "Hub/spoke log relay - wires peers, dispatches logs and reconciles spokes into the hub")]
struct Args {
    /// Path to configuration file (default: config/log-mirror.toml or LOG_MIRROR_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register the hub and a spoke as each other's peer
    Wire { spoke: String },

    /// Push a log from a spoke to the hub
    PushLog {
        spoke: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        metadata: String,
        /// Log id nonce (default: current time in ms)
        #[arg(long)]
        nonce: Option<u64>,
        /// Poll the hub mailbox until the message is delivered
        #[arg(long)]
        wait: bool,
    },

    /// Record a log that originates on the hub
    PushHubLog {
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        metadata: String,
        #[arg(long)]
        nonce: Option<u64>,
    },

    /// Mirror a company block from the hub to the company's spoke
    PushBlock {
        #[arg(long)]
        company_id: u128,
        #[arg(long)]
        payload: String,
        #[arg(long, default_value_t = 0)]
        user_id: u128,
        #[arg(long, default_value_t = 0)]
        workspace_id: u128,
        #[arg(long)]
        nonce: Option<u64>,
    },

    /// Register a company on the hub (no-op if it already exists)
    RegisterCompany {
        #[arg(long)]
        company_id: u128,
        /// Spoke that mirrors this company's blocks
        #[arg(long)]
        spoke: Option<String>,
        /// Company owner (default: hub signer)
        #[arg(long)]
        owner: Option<EvmAddress>,
        #[arg(long, default_value = "")]
        metadata_uri: String,
    },

    /// Backfill spoke logs into the hub
    Mirror {
        /// Keep polling until Ctrl-C
        #[arg(long)]
        continuous: bool,
    },

    /// Check mailbox delivery on the hub
    CheckDelivered {
        #[arg(required = true)]
        message_ids: Vec<Bytes32>,
        #[arg(long)]
        wait: bool,
    },

    /// Set the native fee a spoke pays for acknowledgements
    SetAckFee { spoke: String, wei: u128 },

    /// Route a spoke's mailbox transport to the hub
    ConfigureMailbox { spoke: String },

    /// Show contract state and wiring (hub and all spokes by default)
    Inspect { chain: Option<String> },

    /// Show admin signer balances
    Balances,

    /// Decode hub and spoke events from transactions
    ReadTx {
        chain: String,
        #[arg(required = true)]
        tx_hashes: Vec<Bytes32>,
    },

    /// List recent hub and spoke events
    Events {
        chain: String,
        #[arg(long, default_value_t = 1000)]
        blocks: u64,
        #[arg(long, default_value_t = 500)]
        page: u64,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    if let Err(e) = run(args).await {
        let code = e
            .downcast_ref::<MirrorError>()
            .map(MirrorError::exit_code)
            .unwrap_or(1);
        match e.downcast_ref::<MirrorError>() {
            Some(mirror) => error!("{} error: {:#}", mirror.kind(), e),
            None => error!("{:#}", e),
        }
        std::process::exit(code);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::load_from(&path)?
        }
        None => Config::load()?,
    };
    info!(
        "Hub: {} (chain ID {}), {} spoke(s)",
        config.hub.name,
        config.hub.chain_id,
        config.spokes.len()
    );
    Ok(config)
}

fn default_nonce() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn report_soft_failures(failures: &[SoftFailure]) {
    for failure in failures {
        warn!("Soft failure: {}", failure);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config)?;
    let topology = Topology::connect(&config)
        .await
        .context("connecting to configured chains")?;

    match args.command {
        Command::Wire { spoke } => {
            let spoke_net = topology.spoke(&spoke)?;
            let report = wiring::wire_peers(&topology.hub, spoke_net).await?;
            println!("hub peer:  {}", report.after.hub_peer);
            println!("spoke hub: {}", report.after.spoke_hub);
            if let Some(tx) = report.hub_tx {
                println!("setPeer tx: {}", tx);
            }
            if let Some(tx) = report.spoke_tx {
                println!("setHub tx:  {}", tx);
            }
        }

        Command::PushLog {
            spoke,
            content,
            metadata,
            nonce,
            wait,
        } => {
            let spoke_net = topology.spoke(&spoke)?;
            let author = spoke_net.wallet()?.address();
            let hash = content_hash(content.as_bytes());
            let record = LogRecord {
                log_id: derive_log_id(&author, &hash, nonce.unwrap_or_else(default_nonce)),
                author,
                content_hash: hash,
                metadata,
                origin_domain: spoke_net.origin_domain,
            };
            let engine = DispatchEngine::new(&topology, &config.dispatch);
            let outcome = engine.push_log(&spoke, &record).await?;
            println!("log id: {}", record.log_id);
            println!("tx:     {}", outcome.tx_hash());
            report_soft_failures(outcome.soft_failures());

            match outcome {
                DispatchOutcome::Direct(receipt) => {
                    println!("fee:    {} wei (quoted {})", receipt.attached_value, receipt.quoted_fee.native_fee);
                    if let AckStatus::Confirmed(ack) = receipt.ack {
                        println!("ack:    ok, destination ref {}", ack.destination_tx_ref);
                    }
                }
                DispatchOutcome::Mailbox(receipt) => {
                    println!("fee:    {} wei", receipt.request.quoted_fee);
                    if let Some(message_id) = receipt.message_id {
                        println!("message: {}", message_id);
                        if wait {
                            match engine.await_delivery(&message_id).await? {
                                DeliveryStatus::Delivered => println!("delivered"),
                                DeliveryStatus::Pending => {
                                    report_soft_failures(&[engine.undelivered(&message_id)])
                                }
                            }
                        }
                    }
                }
            }
        }

        Command::PushHubLog {
            content,
            metadata,
            nonce,
        } => {
            let author = topology.hub.wallet()?.address();
            let hash = content_hash(content.as_bytes());
            let log_id = derive_log_id(&author, &hash, nonce.unwrap_or_else(default_nonce));
            let tx = registry::push_hub_log(&topology.hub, &log_id, &hash, &metadata).await?;
            println!("log id: {}", log_id);
            println!("tx:     {}", tx.tx_hash);
        }

        Command::PushBlock {
            company_id,
            payload,
            user_id,
            workspace_id,
            nonce,
        } => {
            let block = BlockMirror {
                company_id,
                payload_hash: content_hash(payload.as_bytes()),
                user_id,
                workspace_id,
                nonce: nonce.unwrap_or_else(default_nonce),
            };
            let engine = DispatchEngine::new(&topology, &config.dispatch);
            let outcome = engine.push_block(&block).await?;
            println!("payload hash: {}", block.payload_hash);
            println!("destination:  {}", outcome.destination);
            println!("tx:           {}", outcome.receipt.tx_hash);
            println!(
                "fee:          {} wei (quoted {})",
                outcome.receipt.attached_value, outcome.receipt.quoted_fee.native_fee
            );
            report_soft_failures(&outcome.receipt.soft_failures);
            match outcome.observed_on_destination {
                Some(true) => println!("BlockMirrored observed on {}", outcome.destination),
                Some(false) => warn!("BlockMirrored not yet observed on {}", outcome.destination),
                None => {}
            }
        }

        Command::RegisterCompany {
            company_id,
            spoke,
            owner,
            metadata_uri,
        } => {
            let destination_domain = match &spoke {
                Some(name) => topology.spoke(name)?.domain,
                None => 0,
            };
            let owner = match owner {
                Some(owner) => owner,
                None => topology.hub.wallet()?.address(),
            };
            let registration = CompanyRegistration {
                company_id,
                owner,
                has_own_chain: spoke.is_some(),
                destination_domain,
                metadata_uri,
            };
            match registry::register_company(&topology.hub, &registration).await? {
                Registration::AlreadyRegistered(existing) => println!(
                    "company {} already registered (owner {}, destination {})",
                    company_id, existing.owner, existing.destination_domain
                ),
                Registration::Registered { tx_hash } => {
                    println!("company {} registered in {}", company_id, tx_hash)
                }
            }
        }

        Command::Mirror { continuous } => {
            let worker = ReconciliationWorker::new(&topology, &config.reconcile);
            if continuous {
                info!(
                    "Reconciling continuously every {} ms (checkpoints in {})",
                    config.reconcile.polling_interval_ms,
                    worker.checkpoints().path().display()
                );
                worker
                    .run_continuous(async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            error!("Cannot listen for Ctrl-C: {}", e);
                            std::future::pending::<()>().await;
                        }
                    })
                    .await?;
            } else {
                let report = worker.run_once().await;
                for origin in &report.origins {
                    println!(
                        "{}: {} recorded, {} already known, checkpoint {:?}",
                        origin.origin, origin.recorded, origin.duplicates, origin.checkpoint
                    );
                    report_soft_failures(&origin.soft_failures);
                }
                for failure in &report.failures {
                    println!("{}: failed: {}", failure.origin, failure.error);
                }
                if let Some(fatal) = report.into_fatal() {
                    return Err(fatal.into());
                }
            }
        }

        Command::CheckDelivered { message_ids, wait } => {
            let engine = DispatchEngine::new(&topology, &config.dispatch);
            for message_id in &message_ids {
                let delivered = if wait {
                    engine.await_delivery(message_id).await? == DeliveryStatus::Delivered
                } else {
                    engine.check_delivered(message_id).await?
                };
                println!("{}: {}", message_id, if delivered { "delivered" } else { "pending" });
                if !delivered {
                    report_soft_failures(&[engine.undelivered(message_id)]);
                }
            }
        }

        Command::SetAckFee { spoke, wei } => {
            let change = wiring::set_ack_fee(topology.spoke(&spoke)?, wei).await?;
            println!("ackFeeWei {} -> {} ({})", change.before, change.after, change.tx_hash);
        }

        Command::ConfigureMailbox { spoke } => {
            let tx = wiring::configure_mailbox(&topology.hub, topology.spoke(&spoke)?).await?;
            println!("setHyperlane tx: {}", tx);
        }

        Command::Inspect { chain } => {
            let show_hub = chain.as_deref().map_or(true, |c| c == topology.hub.name);
            if show_hub {
                let hub = diagnostics::inspect_hub(&topology.hub).await?;
                println!("{} (hub) {}", hub.chain, hub.address);
                println!("  deployed: {} ({} bytes)", hub.is_deployed(), hub.code_size);
                println!("  owner:    {:?}", hub.owner);
                println!("  mailbox:  {:?}", hub.mailbox);
            }
            for spoke_net in &topology.spokes {
                if chain.as_deref().map_or(false, |c| c != spoke_net.name) {
                    continue;
                }
                let spoke = diagnostics::inspect_spoke(&topology.hub, spoke_net).await?;
                println!("{} (spoke, {:?}) {}", spoke.contract.chain, spoke.transport, spoke.contract.address);
                println!("  deployed:      {} ({} bytes)", spoke.contract.is_deployed(), spoke.contract.code_size);
                println!("  mailbox:       {:?}", spoke.contract.mailbox);
                println!("  flow domain:   {:?}", spoke.flow_domain);
                println!("  hub recipient: {:?}", spoke.hub_recipient);
                println!("  ack fee wei:   {:?}", spoke.ack_fee_wei);
                println!(
                    "  wiring:        hub->spoke {}, spoke->hub {}",
                    spoke.wiring.hub_to_spoke(),
                    spoke.wiring.spoke_to_hub()
                );
            }
        }

        Command::Balances => {
            for balance in diagnostics::signer_balances(&topology).await? {
                println!("{}: {} holds {} wei", balance.chain, balance.address, balance.balance_wei);
            }
        }

        Command::ReadTx { chain, tx_hashes } => {
            let net = topology.network(&chain)?;
            for tx_hash in &tx_hashes {
                let events = diagnostics::read_transaction_events(net, tx_hash).await?;
                println!("{} ({} event(s))", tx_hash, events.len());
                for event in events {
                    println!("  {:?}", event.event);
                }
            }
        }

        Command::Events { chain, blocks, page } => {
            let net = topology.network(&chain)?;
            let events = diagnostics::scan_recent_events(net, blocks, page).await?;
            println!("{} event(s) in the last {} blocks on {}", events.len(), blocks, net.name);
            for event in events {
                println!(
                    "  block {:?} tx {:?}: {:?}",
                    event.block_number, event.tx_hash, event.event
                );
            }
        }
    }

    Ok(())
}
