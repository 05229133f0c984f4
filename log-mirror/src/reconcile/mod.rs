//! Reconciliation Worker
//!
//! Scans each spoke for `SpokeLogPushed` events and records every log the hub
//! has not seen yet through `recordReceiptFromOffchain`. Progress is tracked
//! per origin in a [`CheckpointStore`].
//!
//! Invariants:
//! - Chunks of one origin are processed in order; a checkpoint only moves
//!   past a chunk once every log in it is recorded or known to the hub.
//! - A failure inside a chunk leaves the checkpoint where it was, so the
//!   whole chunk is rescanned next pass. Recording is idempotent because the
//!   hub is queried before every write.
//! - Origins are independent: one failing origin does not stop the others.

pub mod checkpoint;

use crate::abi::codec::event_topic;
use crate::abi::spoke::{decode_spoke_event, SpokeEvent, SPOKE_LOG_PUSHED};
use crate::config::ReconcileConfig;
use crate::error::{ChainResultExt, MirrorError, SoftFailure, SoftFailureKind};
use crate::network::{Network, Topology};
use crate::registry::{has_offchain_receipt, record_receipt_from_offchain};
use crate::types::LogRecord;
use chain_clients_common::Bytes32;
use chain_clients_evm::{EvmError, LogFilter};
pub use checkpoint::CheckpointStore;
use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub from: u64,
    pub to: u64,
}

/// Splits `[next, safe_head]` into chunks of at most `chunk_size` blocks.
pub fn plan_chunks(next: u64, safe_head: u64, chunk_size: u64) -> Vec<ChunkRange> {
    let mut chunks = Vec::new();
    let mut from = next;
    while from <= safe_head {
        let to = from.saturating_add(chunk_size.max(1) - 1).min(safe_head);
        chunks.push(ChunkRange { from, to });
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    chunks
}

#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub recorded: Vec<Bytes32>,
    pub duplicates: Vec<Bytes32>,
    pub soft_failures: Vec<SoftFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct OriginReport {
    pub origin: String,
    pub chunks: Vec<ChunkRange>,
    pub recorded: usize,
    pub duplicates: usize,
    pub soft_failures: Vec<SoftFailure>,
    /// Checkpoint after the pass
    pub checkpoint: Option<u64>,
}

#[derive(Debug)]
pub struct OriginFailure {
    pub origin: String,
    pub error: MirrorError,
}

#[derive(Debug, Default)]
pub struct PassReport {
    pub origins: Vec<OriginReport>,
    pub failures: Vec<OriginFailure>,
}

impl PassReport {
    /// First failure that retrying will not clear.
    pub fn into_fatal(self) -> Option<MirrorError> {
        self.failures
            .into_iter()
            .map(|f| f.error)
            .find(|e| !e.is_transient())
    }
}

enum Ingestion {
    Recorded,
    Duplicate,
}

pub struct ReconciliationWorker<'a> {
    topology: &'a Topology,
    checkpoints: CheckpointStore,
    config: ReconcileConfig,
}

impl<'a> ReconciliationWorker<'a> {
    pub fn new(topology: &'a Topology, config: &ReconcileConfig) -> Self {
        Self {
            topology,
            checkpoints: CheckpointStore::new(config.checkpoint_path.clone()),
            config: config.clone(),
        }
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// One pass over every spoke, origins in parallel.
    pub async fn run_once(&self) -> PassReport {
        let results = join_all(
            self.topology
                .spokes
                .iter()
                .map(|origin| async move { (origin.name.clone(), self.reconcile_origin(origin).await) }),
        )
        .await;

        let mut report = PassReport::default();
        for (origin, result) in results {
            match result {
                Ok(origin_report) => {
                    info!(
                        "{}: {} chunk(s), {} recorded, {} already known, checkpoint {:?}",
                        origin,
                        origin_report.chunks.len(),
                        origin_report.recorded,
                        origin_report.duplicates,
                        origin_report.checkpoint
                    );
                    for failure in &origin_report.soft_failures {
                        warn!("{}: {}", origin, failure);
                    }
                    report.origins.push(origin_report);
                }
                Err(error) => {
                    if error.is_transient() {
                        warn!("{}: pass aborted, will retry: {}", origin, error);
                    } else {
                        error!("{}: pass failed: {}", origin, error);
                    }
                    report.failures.push(OriginFailure { origin, error });
                }
            }
        }
        report
    }

    /// Repeats passes until `shutdown` resolves or a non-transient error occurs.
    pub async fn run_continuous<S>(&self, shutdown: S) -> Result<(), MirrorError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = Duration::from_millis(self.config.polling_interval_ms);
        loop {
            let report = self.run_once().await;
            if let Some(fatal) = report.into_fatal() {
                return Err(fatal);
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping reconciliation");
                    return Ok(());
                }
            }
        }
    }

    /// Scans one origin from its checkpoint up to `head - finality_blocks`.
    pub async fn reconcile_origin(&self, origin: &Network) -> Result<OriginReport, MirrorError> {
        let mut report = OriginReport {
            origin: origin.name.clone(),
            ..OriginReport::default()
        };

        let head = origin.client().get_block_number().await.on_chain(&origin.name)?;
        let safe_head = match head.checked_sub(self.config.finality_blocks) {
            Some(safe) => safe,
            None => {
                debug!("{}: head {} has no final blocks yet", origin.name, head);
                report.checkpoint = self.checkpoints.get(&origin.name).await?;
                return Ok(report);
            }
        };

        let next = match self.checkpoints.get(&origin.name).await? {
            Some(next) => next,
            None => {
                let start = safe_head.saturating_sub(self.config.lookback_blocks);
                info!(
                    "{}: no checkpoint, starting {} blocks back at {}",
                    origin.name, self.config.lookback_blocks, start
                );
                start
            }
        };

        for range in plan_chunks(next, safe_head, self.config.chunk_size) {
            let outcome = self.process_chunk(origin, range).await?;
            self.checkpoints.advance(&origin.name, range.to + 1).await?;

            report.chunks.push(range);
            report.recorded += outcome.recorded.len();
            report.duplicates += outcome.duplicates.len();
            report.soft_failures.extend(outcome.soft_failures);
            report.checkpoint = Some(range.to + 1);
        }

        if report.checkpoint.is_none() {
            report.checkpoint = self.checkpoints.get(&origin.name).await?;
        }
        Ok(report)
    }

    /// Records every unknown log in `range`. Any error aborts the chunk.
    pub async fn process_chunk(&self, origin: &Network, range: ChunkRange) -> Result<ChunkOutcome, MirrorError> {
        let mut filter = LogFilter::new(origin.contract, range.from, range.to);
        filter.topic0 = vec![event_topic(SPOKE_LOG_PUSHED)];
        let logs = origin.client().get_logs(&filter).await.on_chain(&origin.name)?;
        debug!(
            "{}: {} log(s) in [{}, {}]",
            origin.name,
            logs.len(),
            range.from,
            range.to
        );

        let mut outcome = ChunkOutcome::default();
        for log in &logs {
            let pushed = match decode_spoke_event(log) {
                Ok(Some(SpokeEvent::SpokeLogPushed(pushed))) => pushed,
                Ok(_) => continue,
                Err(e) => {
                    outcome.soft_failures.push(SoftFailure::new(
                        SoftFailureKind::MalformedLog,
                        format!(
                            "block {:?} tx {:?}: {}",
                            log.block_number(),
                            log.transaction_hash,
                            e
                        ),
                    ));
                    continue;
                }
            };

            let record = LogRecord {
                log_id: pushed.log_id,
                author: pushed.author,
                content_hash: pushed.content_hash,
                metadata: pushed.metadata,
                origin_domain: origin.origin_domain,
            };
            match self.ingest(&record).await? {
                Ingestion::Recorded => outcome.recorded.push(record.log_id),
                Ingestion::Duplicate => outcome.duplicates.push(record.log_id),
            }
        }
        Ok(outcome)
    }

    async fn ingest(&self, record: &LogRecord) -> Result<Ingestion, MirrorError> {
        let hub_net = &self.topology.hub;
        if has_offchain_receipt(hub_net, record.origin_domain, &record.log_id).await? {
            info!(
                "Skipping log {} from origin {}: already on hub",
                record.log_id, record.origin_domain
            );
            return Ok(Ingestion::Duplicate);
        }

        match record_receipt_from_offchain(hub_net, record).await {
            Ok(tx) => {
                info!(
                    "Recorded log {} from origin {} in {}",
                    record.log_id, record.origin_domain, tx.tx_hash
                );
                Ok(Ingestion::Recorded)
            }
            // Another writer may have recorded it between the check and the write.
            Err(MirrorError::Chain {
                source: EvmError::Reverted { tx_hash },
                chain,
            }) => {
                if has_offchain_receipt(hub_net, record.origin_domain, &record.log_id).await? {
                    debug!("Log {} recorded concurrently, {} reverted", record.log_id, tx_hash);
                    Ok(Ingestion::Duplicate)
                } else {
                    Err(MirrorError::Chain {
                        chain,
                        source: EvmError::Reverted { tx_hash },
                    })
                }
            }
            Err(e) => Err(e),
        }
    }
}
