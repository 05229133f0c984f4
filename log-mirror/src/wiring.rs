//! Hub/spoke peer wiring
//!
//! The hub trusts a spoke once `peers(spokeDomain)` holds the spoke's peer id,
//! and the spoke trusts the hub once `hubs(hubDomain)` holds the hub's. Both
//! directions must be set before anything is dispatched between them.

use crate::abi::{self, hub, spoke};
use crate::error::MirrorError;
use crate::network::Network;
use chain_clients_common::{from_peer_id, to_peer_id, Bytes32, EvmAddress};
use tracing::{info, warn};

/// Current peer registrations compared to what a correct wiring needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringStatus {
    /// `hub.peers(spokeDomain)`
    pub hub_peer: Bytes32,
    /// `spoke.hubs(hubDomain)`
    pub spoke_hub: Bytes32,
    pub expected_hub_peer: Bytes32,
    pub expected_spoke_hub: Bytes32,
}

impl WiringStatus {
    /// Hub recognises the spoke.
    pub fn hub_to_spoke(&self) -> bool {
        self.hub_peer == self.expected_hub_peer
    }

    /// Spoke recognises the hub.
    pub fn spoke_to_hub(&self) -> bool {
        self.spoke_hub == self.expected_spoke_hub
    }

    pub fn is_complete(&self) -> bool {
        self.hub_to_spoke() && self.spoke_to_hub()
    }

    fn missing(&self) -> String {
        let mut missing = Vec::new();
        if !self.hub_to_spoke() {
            missing.push(format!(
                "hub peer is {} (expected {})",
                self.hub_peer, self.expected_hub_peer
            ));
        }
        if !self.spoke_to_hub() {
            missing.push(format!(
                "spoke hub is {} (expected {})",
                self.spoke_hub, self.expected_spoke_hub
            ));
        }
        missing.join("; ")
    }
}

/// Reads both directions of the hub/spoke wiring.
pub async fn read_wiring(hub_net: &Network, spoke_net: &Network) -> Result<WiringStatus, MirrorError> {
    let peer_call = hub::encode_peers(spoke_net.domain);
    let hub_call = spoke::encode_hubs(hub_net.domain);
    let (peer_raw, hub_raw) = tokio::try_join!(
        hub_net.call_contract(&peer_call),
        spoke_net.call_contract(&hub_call),
    )?;

    Ok(WiringStatus {
        hub_peer: abi::decode_bytes32(&peer_raw, hub::PEERS)?,
        spoke_hub: abi::decode_bytes32(&hub_raw, spoke::HUBS)?,
        expected_hub_peer: to_peer_id(&spoke_net.contract),
        expected_spoke_hub: to_peer_id(&hub_net.contract),
    })
}

/// Fails with `NotWired` unless both directions are registered.
pub async fn ensure_wired(hub_net: &Network, spoke_net: &Network) -> Result<WiringStatus, MirrorError> {
    let status = read_wiring(hub_net, spoke_net).await?;
    if !status.is_complete() {
        return Err(MirrorError::NotWired {
            hub: hub_net.name.clone(),
            spoke: spoke_net.name.clone(),
            missing: status.missing(),
        });
    }
    Ok(status)
}

#[derive(Debug, Clone)]
pub struct WireReport {
    pub before: WiringStatus,
    pub after: WiringStatus,
    /// `setPeer` transaction, absent when the hub was already correct
    pub hub_tx: Option<Bytes32>,
    /// `setHub` transaction, absent when the spoke was already correct
    pub spoke_tx: Option<Bytes32>,
}

/// Registers the hub and spoke with each other and verifies the result.
///
/// Directions that already read back correctly are not resubmitted. A
/// read-back that disagrees with what was written is a `WiringMismatch`.
pub async fn wire_peers(hub_net: &Network, spoke_net: &Network) -> Result<WireReport, MirrorError> {
    let before = read_wiring(hub_net, spoke_net).await?;
    info!(
        "Wiring {} (domain {}) <-> {} (domain {}): hub peer {}, spoke hub {}",
        hub_net.name, hub_net.domain, spoke_net.name, spoke_net.domain, before.hub_peer, before.spoke_hub
    );

    let hub_tx = if before.hub_to_spoke() {
        info!("{}: peer for domain {} already set", hub_net.name, spoke_net.domain);
        None
    } else {
        let data = hub::encode_set_peer(spoke_net.domain, &before.expected_hub_peer);
        let tx = hub_net.submit_to_contract(data, 0).await?;
        info!("{}: setPeer({}) in {}", hub_net.name, spoke_net.domain, tx.tx_hash);
        Some(tx.tx_hash)
    };

    let spoke_tx = if before.spoke_to_hub() {
        info!("{}: hub for domain {} already set", spoke_net.name, hub_net.domain);
        None
    } else {
        let data = spoke::encode_set_hub(hub_net.domain, &before.expected_spoke_hub);
        let tx = spoke_net.submit_to_contract(data, 0).await?;
        info!("{}: setHub({}) in {}", spoke_net.name, hub_net.domain, tx.tx_hash);
        Some(tx.tx_hash)
    };

    let after = read_wiring(hub_net, spoke_net).await?;
    if !after.hub_to_spoke() {
        return Err(MirrorError::WiringMismatch {
            chain: hub_net.name.clone(),
            expected: after.expected_hub_peer,
            actual: after.hub_peer,
        });
    }
    if !after.spoke_to_hub() {
        return Err(MirrorError::WiringMismatch {
            chain: spoke_net.name.clone(),
            expected: after.expected_spoke_hub,
            actual: after.spoke_hub,
        });
    }

    info!(
        "Wired {} <-> {}: hub peer {}, spoke hub {}",
        hub_net.name,
        spoke_net.name,
        from_peer_id(&after.hub_peer)?,
        from_peer_id(&after.spoke_hub)?
    );

    Ok(WireReport {
        before,
        after,
        hub_tx,
        spoke_tx,
    })
}

// ============================================================================
// SPOKE ADMINISTRATION
// ============================================================================

pub async fn ack_fee(spoke_net: &Network) -> Result<u128, MirrorError> {
    let raw = spoke_net.call_contract(&spoke::encode_ack_fee_wei()).await?;
    abi::decode_uint(&raw, spoke::ACK_FEE_WEI)
}

#[derive(Debug, Clone, Copy)]
pub struct AckFeeChange {
    pub before: u128,
    pub after: u128,
    pub tx_hash: Bytes32,
}

/// Sets the native fee the spoke attaches to its acknowledgement message.
pub async fn set_ack_fee(spoke_net: &Network, fee_wei: u128) -> Result<AckFeeChange, MirrorError> {
    let before = ack_fee(spoke_net).await?;
    let tx = spoke_net
        .submit_to_contract(spoke::encode_set_ack_fee_wei(fee_wei), 0)
        .await?;
    let after = ack_fee(spoke_net).await?;
    if after != fee_wei {
        warn!(
            "{}: ackFeeWei reads {} after setting {}",
            spoke_net.name, after, fee_wei
        );
    }
    info!("{}: ackFeeWei {} -> {} in {}", spoke_net.name, before, after, tx.tx_hash);
    Ok(AckFeeChange {
        before,
        after,
        tx_hash: tx.tx_hash,
    })
}

/// Mailbox used by a contract: the configured address, else the contract's `mailbox()`.
pub async fn resolve_mailbox(net: &Network) -> Result<EvmAddress, MirrorError> {
    if let Some(mailbox) = net.mailbox {
        return Ok(mailbox);
    }
    let raw = net.call_contract(&spoke::encode_mailbox()).await?;
    let mailbox = abi::decode_address(&raw, spoke::MAILBOX)?;
    if mailbox.is_zero() {
        return Err(MirrorError::UnresolvedAddress {
            chain: net.name.clone(),
            reason: "no mailbox_addr configured and contract mailbox() is unset".to_string(),
        });
    }
    Ok(mailbox)
}

/// Points the spoke's mailbox transport at the hub: `setHyperlane(mailbox, hubDomain, hub)`.
pub async fn configure_mailbox(hub_net: &Network, spoke_net: &Network) -> Result<Bytes32, MirrorError> {
    let mailbox = spoke_net.mailbox.ok_or_else(|| {
        MirrorError::Config(format!(
            "spoke '{}' has no mailbox_addr configured",
            spoke_net.name
        ))
    })?;
    let data = spoke::encode_set_hyperlane(&mailbox, hub_net.domain, &hub_net.contract);
    let tx = spoke_net.submit_to_contract(data, 0).await?;
    info!(
        "{}: mailbox {} routed to {} on domain {} in {}",
        spoke_net.name, mailbox, hub_net.contract, hub_net.domain, tx.tx_hash
    );
    Ok(tx.tx_hash)
}
