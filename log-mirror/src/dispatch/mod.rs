//! Dispatch Engine
//!
//! Sends logs from a spoke to the hub and blocks from the hub to a company's
//! spoke over either transport. Every dispatch first checks that the pair is
//! wired in both directions; nothing is quoted or paid for otherwise.
//!
//! Gas escalation for the submitted transaction lives in the wallet
//! (`chain_clients_evm::submit_with_escalation`).

pub mod direct;
pub mod mailbox;

use crate::abi::hub::encode_push_block;
use crate::abi::oapp::{encode_send, TransportFee};
use crate::abi::{encode_block_payload, encode_log_body};
use crate::config::{DispatchConfig, TransportKind};
use crate::error::{MirrorError, SoftFailure, SoftFailureKind};
use crate::network::Topology;
use crate::registry::get_company;
use crate::types::{BlockMirror, DispatchRequest, LogRecord, MirrorAck};
use crate::wiring::{ack_fee, ensure_wired};
use chain_clients_common::Bytes32;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Quoted fee scaled by `percent`, rounded up.
pub fn with_headroom(fee: u128, percent: u64) -> u128 {
    fee.saturating_mul(u128::from(percent)).saturating_add(99) / 100
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckStatus {
    Confirmed(MirrorAck),
    Rejected(MirrorAck),
    NotObserved,
}

#[derive(Debug, Clone)]
pub struct DirectReceipt {
    pub tx_hash: Bytes32,
    pub quoted_fee: TransportFee,
    /// Native value attached to the send
    pub attached_value: u128,
    pub ack: AckStatus,
    pub soft_failures: Vec<SoftFailure>,
}

#[derive(Debug, Clone)]
pub struct MailboxReceipt {
    pub tx_hash: Bytes32,
    pub request: DispatchRequest,
    /// Absent if the spoke emitted no `SpokeDispatched` for the log
    pub message_id: Option<Bytes32>,
}

#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Direct(DirectReceipt),
    Mailbox(MailboxReceipt),
}

impl DispatchOutcome {
    pub fn tx_hash(&self) -> Bytes32 {
        match self {
            DispatchOutcome::Direct(r) => r.tx_hash,
            DispatchOutcome::Mailbox(r) => r.tx_hash,
        }
    }

    pub fn soft_failures(&self) -> &[SoftFailure] {
        match self {
            DispatchOutcome::Direct(r) => &r.soft_failures,
            DispatchOutcome::Mailbox(_) => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockPushOutcome {
    pub receipt: DirectReceipt,
    pub destination: String,
    /// `Some(found)` when the destination was scanned for `BlockMirrored`
    pub observed_on_destination: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Still undelivered after the polling window
    Pending,
}

pub struct DispatchEngine<'a> {
    topology: &'a Topology,
    config: &'a DispatchConfig,
}

impl<'a> DispatchEngine<'a> {
    pub fn new(topology: &'a Topology, config: &'a DispatchConfig) -> Self {
        Self { topology, config }
    }

    /// Sends `record` from spoke `spoke_name` to the hub over the spoke's transport.
    pub async fn push_log(&self, spoke_name: &str, record: &LogRecord) -> Result<DispatchOutcome, MirrorError> {
        let hub_net = &self.topology.hub;
        let spoke_net = self.topology.spoke(spoke_name)?;
        ensure_wired(hub_net, spoke_net).await?;

        match spoke_net.transport {
            TransportKind::Direct => {
                let options = self.config.options_bytes()?;
                let body = encode_log_body(record);
                let call = encode_send(hub_net.domain, &body, &options);
                let (fee, value, tx) = direct::send_with_quote(
                    spoke_net,
                    hub_net.domain,
                    &body,
                    &options,
                    self.config.fee_headroom_percent,
                    call,
                )
                .await?;
                let receipt = direct::into_receipt(fee, value, tx, spoke_net, hub_net.domain);
                Ok(DispatchOutcome::Direct(receipt))
            }
            TransportKind::Mailbox => {
                let receipt = mailbox::dispatch(spoke_net, hub_net, record).await?;
                Ok(DispatchOutcome::Mailbox(receipt))
            }
        }
    }

    /// Mirrors a block from the hub to the company's own spoke.
    pub async fn push_block(&self, block: &BlockMirror) -> Result<BlockPushOutcome, MirrorError> {
        let hub_net = &self.topology.hub;
        let company = get_company(hub_net, block.company_id).await?;
        if !company.exists {
            return Err(MirrorError::CompanyNotRegistered(block.company_id));
        }
        if !company.has_own_chain {
            return Err(MirrorError::Config(format!(
                "company {} has no chain of its own to mirror to",
                block.company_id
            )));
        }
        let spoke_net = self
            .topology
            .spoke_by_domain(company.destination_domain)
            .ok_or_else(|| {
                MirrorError::Config(format!(
                    "company {} mirrors to domain {}, which is not a configured spoke",
                    block.company_id, company.destination_domain
                ))
            })?;
        ensure_wired(hub_net, spoke_net).await?;

        match ack_fee(spoke_net).await {
            Ok(0) => warn!(
                "{}: ackFeeWei is 0, the destination cannot pay for its acknowledgement",
                spoke_net.name
            ),
            Ok(_) => {}
            Err(e) => warn!("{}: could not read ackFeeWei: {}", spoke_net.name, e),
        }

        let options = self.config.options_bytes()?;
        let payload = encode_block_payload(block);
        let call = encode_push_block(block, &options);
        let (fee, value, tx) = direct::send_with_quote(
            hub_net,
            spoke_net.domain,
            &payload,
            &options,
            self.config.fee_headroom_percent,
            call,
        )
        .await?;
        let receipt = direct::into_receipt(fee, value, tx, hub_net, spoke_net.domain);

        let observed_on_destination = if self.config.observation_window_blocks > 0 {
            match direct::observe_block_mirrored(
                spoke_net,
                &block.payload_hash,
                self.config.observation_window_blocks,
            )
            .await
            {
                Ok(found) => Some(found),
                Err(e) => {
                    warn!("{}: BlockMirrored scan failed: {}", spoke_net.name, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(BlockPushOutcome {
            receipt,
            destination: spoke_net.name.clone(),
            observed_on_destination,
        })
    }

    /// Single `delivered(messageId)` check on the hub mailbox.
    pub async fn check_delivered(&self, message_id: &Bytes32) -> Result<bool, MirrorError> {
        mailbox::is_delivered(&self.topology.hub, message_id).await
    }

    /// Polls delivery until it succeeds or the configured window elapses.
    ///
    /// Running out of time is `Pending`, never an error.
    pub async fn await_delivery(&self, message_id: &Bytes32) -> Result<DeliveryStatus, MirrorError> {
        let timeout = Duration::from_millis(self.config.delivery_timeout_ms);
        let interval = Duration::from_millis(self.config.delivery_poll_interval_ms);
        let started = Instant::now();
        loop {
            if self.check_delivered(message_id).await? {
                info!("Message {} delivered", message_id);
                return Ok(DeliveryStatus::Delivered);
            }
            if started.elapsed() + interval > timeout {
                return Ok(DeliveryStatus::Pending);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Soft failure reported when `await_delivery` ends `Pending`.
    pub fn undelivered(&self, message_id: &Bytes32) -> SoftFailure {
        SoftFailure::new(
            SoftFailureKind::NotDelivered,
            format!(
                "message {} not delivered on {} within {} ms",
                message_id, self.topology.hub.name, self.config.delivery_timeout_ms
            ),
        )
    }
}
