//! Tests for the reconciliation worker and its checkpoint store
//!
//! Chunk planning and the checkpoint file are tested directly; the worker is
//! driven against a hub and spoke fake chain.

use chain_clients_common::to_peer_id;
use futures::future::join_all;
use log_mirror::abi::codec::{encode, event_topic, Token};
use log_mirror::abi::{hub, spoke};
use log_mirror::config::TransportKind;
use log_mirror::dispatch::DispatchEngine;
use log_mirror::error::{ErrorKind, MirrorError, SoftFailureKind};
use log_mirror::network::Topology;
use log_mirror::reconcile::{plan_chunks, CheckpointStore, ChunkRange, ReconciliationWorker};

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{
    addr, build_chain_config, temp_state_path, word, FakeChain, TestEnv, DUMMY_AUTHOR_ADDR,
    DUMMY_SPOKE_CONTRACT_ADDR, DUMMY_SPOKE_MAILBOX_ADDR, TEST_SPOKE_CHAIN_ID, TEST_SPOKE_NAME,
};
use wiremock::MockServer;

const SECOND_SPOKE_NAME: &str = "spoke-b";
const SECOND_SPOKE_CHAIN_ID: u64 = 80_002;
const SECOND_SPOKE_DOMAIN: u32 = 40_267;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn ranges(pairs: &[(u64, u64)]) -> Vec<ChunkRange> {
    pairs.iter().map(|&(from, to)| ChunkRange { from, to }).collect()
}

/// Origin id the hub keys spoke receipts by (chain id, since none is configured).
fn origin_id() -> u32 {
    TEST_SPOKE_CHAIN_ID as u32
}

async fn start_at(env: &TestEnv, head: u64, checkpoint: Option<u64>) {
    env.spoke.state().block_number = head;
    if let Some(next) = checkpoint {
        CheckpointStore::new(env.config.reconcile.checkpoint_path.clone())
            .advance(TEST_SPOKE_NAME, next)
            .await
            .unwrap();
    }
}

fn push_log(env: &TestEnv, block: u64, id: u64) {
    env.spoke.state().push_spoke_log(
        block,
        word(id),
        addr(DUMMY_AUTHOR_ADDR),
        word(id + 0x1000),
        &format!("ipfs://log-{}", id),
    );
}

// ============================================================================
// CHUNK PLANNING
// ============================================================================

/// 1. Test: Chunk Planning
/// Verifies inclusive chunk bounds, a short final chunk and an empty plan.
#[test]
fn test_plan_chunks() {
    assert_eq!(
        plan_chunks(100, 249, 50),
        ranges(&[(100, 149), (150, 199), (200, 249)])
    );
    assert_eq!(plan_chunks(10, 12, 50), ranges(&[(10, 12)]));
    assert_eq!(plan_chunks(5, 5, 1), ranges(&[(5, 5)]));
    assert!(plan_chunks(250, 249, 50).is_empty());
}

// ============================================================================
// WORKER
// ============================================================================

/// 2. Test: Chunked Scan From Checkpoint
/// Verifies that checkpoint 100 with head 250 scans [100,149], [150,199], [200,249]
/// and leaves the checkpoint at 250.
#[tokio::test]
async fn test_scan_from_checkpoint_in_chunks() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    let report = worker.run_once().await;

    assert!(report.failures.is_empty());
    let origin = &report.origins[0];
    assert_eq!(origin.chunks, ranges(&[(100, 149), (150, 199), (200, 249)]));
    assert_eq!(origin.checkpoint, Some(250));
    assert_eq!(
        env.spoke.state().log_ranges,
        vec![(100, 149), (150, 199), (200, 249)]
    );
    assert_eq!(worker.checkpoints().get(TEST_SPOKE_NAME).await.unwrap(), Some(250));
}

/// 3. Test: Record Only Unknown Logs
/// Verifies that logs the hub already knows are skipped and the rest recorded,
/// and that a rerun from scratch records nothing new.
/// Why: Recording must be safe to repeat after a lost checkpoint.
#[tokio::test]
async fn test_records_unknown_logs_once() {
    let _ = tracing_subscriber::fmt::try_init();
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    push_log(&env, 110, 1);
    push_log(&env, 160, 2);
    push_log(&env, 240, 3);
    env.hub.state().recorded.insert((origin_id(), word(2)));
    let topology = Topology::connect(&env.config).await.unwrap();

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    assert_eq!(report.origins[0].recorded, 2);
    assert_eq!(report.origins[0].duplicates, 1);
    {
        let hub_state = env.hub.state();
        let records = hub_state.sent_with(hub::RECORD_RECEIPT_FROM_OFFCHAIN);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].data,
            hub::encode_record_receipt_from_offchain(&log_mirror::types::LogRecord {
                log_id: word(1),
                author: addr(DUMMY_AUTHOR_ADDR),
                content_hash: word(0x1001),
                metadata: "ipfs://log-1".to_string(),
                origin_domain: origin_id(),
            })
        );
        assert!(hub_state.recorded.contains(&(origin_id(), word(3))));
    }

    // Fresh checkpoint file: everything is rescanned from the lookback window
    let mut rerun = env.config.reconcile.clone();
    rerun.checkpoint_path = temp_state_path("rerun");
    rerun.lookback_blocks = 1_000;
    let report = ReconciliationWorker::new(&topology, &rerun).run_once().await;

    assert_eq!(report.origins[0].recorded, 0);
    assert_eq!(report.origins[0].duplicates, 3);
    assert_eq!(env.hub.state().sent_with(hub::RECORD_RECEIPT_FROM_OFFCHAIN).len(), 2);
}

/// 4. Test: Transient Failure Resumes From Last Full Chunk
/// Verifies that a failing getLogs stops the origin after the last completed
/// chunk and that the next pass resumes from there.
#[tokio::test]
async fn test_transient_failure_resumes() {
    let _ = tracing_subscriber::fmt::try_init();
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    env.spoke.state().fail_logs_from = Some(150);
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    let report = worker.run_once().await;
    assert!(report.origins.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error.kind(), ErrorKind::Transient);
    assert_eq!(worker.checkpoints().get(TEST_SPOKE_NAME).await.unwrap(), Some(150));
    assert!(report.into_fatal().is_none());

    env.spoke.state().fail_logs_from = None;
    let report = worker.run_once().await;
    assert_eq!(report.origins[0].chunks, ranges(&[(150, 199), (200, 249)]));
    assert_eq!(worker.checkpoints().get(TEST_SPOKE_NAME).await.unwrap(), Some(250));
}

/// 5. Test: Failed Record Holds Checkpoint
/// Verifies that a chunk whose record submission fails is not checkpointed.
#[tokio::test]
async fn test_failed_record_holds_checkpoint() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    push_log(&env, 120, 1);
    env.hub.state().fail_record_send = true;
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    let report = worker.run_once().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(worker.checkpoints().get(TEST_SPOKE_NAME).await.unwrap(), Some(100));
    assert_eq!(env.spoke.state().log_ranges, vec![(100, 149)]);
}

/// 6. Test: Concurrent Recording
/// Verifies that a record which reverts because another writer got there first
/// counts as a duplicate.
#[tokio::test]
async fn test_concurrent_record_is_duplicate() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    push_log(&env, 120, 1);
    env.hub.state().record_race = true;
    let topology = Topology::connect(&env.config).await.unwrap();

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    assert!(report.failures.is_empty());
    assert_eq!(report.origins[0].recorded, 0);
    assert_eq!(report.origins[0].duplicates, 1);
    assert_eq!(report.origins[0].checkpoint, Some(250));
}

/// 7. Test: Malformed Log Skipped
/// Verifies that an undecodable SpokeLogPushed is a soft failure and the
/// rest of the chunk is still recorded.
#[tokio::test]
async fn test_malformed_log_is_soft_failure() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    {
        let mut spoke_state = env.spoke.state();
        // Missing the indexed author topic
        let data = encode(&[Token::Bytes32(word(9)), Token::String("bad".to_string())]);
        let log = spoke_state.log_json(&[event_topic(spoke::SPOKE_LOG_PUSHED), word(8)], &data, 105, &word(0xbad));
        spoke_state.logs.push(log);
    }
    push_log(&env, 130, 1);
    let topology = Topology::connect(&env.config).await.unwrap();

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    let origin = &report.origins[0];
    assert_eq!(origin.recorded, 1);
    assert_eq!(origin.soft_failures.len(), 1);
    assert_eq!(origin.soft_failures[0].kind, SoftFailureKind::MalformedLog);
    assert_eq!(origin.checkpoint, Some(250));
}

/// 8. Test: Live Dispatch Then Scan
/// Verifies that a log already delivered through the mailbox is seen by the
/// scan and skipped, leaving exactly one hub entry.
#[tokio::test]
async fn test_dispatched_log_is_skipped_by_scan() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    env.wire();
    env.spoke.state().quote_fee = 10;
    let topology = Topology::connect(&env.config).await.unwrap();
    let record = log_mirror::types::LogRecord {
        log_id: word(0xaa),
        author: addr(DUMMY_AUTHOR_ADDR),
        content_hash: word(0xab),
        metadata: "ipfs://live".to_string(),
        origin_domain: origin_id(),
    };
    DispatchEngine::new(&topology, &env.config.dispatch)
        .push_log(TEST_SPOKE_NAME, &record)
        .await
        .unwrap();

    // Relayer delivers the message and the hub records it
    env.hub.state().recorded.insert((origin_id(), record.log_id));
    env.spoke.state().block_number = 1_001;

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    assert_eq!(report.origins[0].recorded, 0);
    assert_eq!(report.origins[0].duplicates, 1);
    assert!(env.hub.state().sent_with(hub::RECORD_RECEIPT_FROM_OFFCHAIN).is_empty());
    assert_eq!(env.hub.state().recorded.len(), 1);

    // The skipped entry is the dispatched log itself
    let outcome = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .process_chunk(
            topology.spoke(TEST_SPOKE_NAME).unwrap(),
            ChunkRange { from: 1_000, to: 1_000 },
        )
        .await
        .unwrap();
    assert_eq!(outcome.duplicates, vec![record.log_id]);
    assert!(outcome.recorded.is_empty());
}

/// 9. Test: First Run Uses Lookback
/// Verifies that an origin without a checkpoint starts lookback_blocks behind
/// the last final block.
#[tokio::test]
async fn test_first_run_starts_from_lookback() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    let report = worker.run_once().await;

    // head 1000, finality 1, lookback 100
    assert_eq!(
        report.origins[0].chunks,
        ranges(&[(899, 948), (949, 998), (999, 999)])
    );
    assert_eq!(report.origins[0].checkpoint, Some(1_000));
}

/// 10. Test: Nothing Final Yet
/// Verifies that a head below the finality depth scans nothing.
#[tokio::test]
async fn test_head_below_finality() {
    let mut env = TestEnv::start(TransportKind::Mailbox).await;
    env.config.reconcile.finality_blocks = 5;
    start_at(&env, 3, None).await;
    let topology = Topology::connect(&env.config).await.unwrap();

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    assert!(report.origins[0].chunks.is_empty());
    assert_eq!(report.origins[0].checkpoint, None);
    assert!(env.spoke.state().log_ranges.is_empty());
}

/// 11. Test: Continuous Mode Stops On Shutdown
/// Verifies that continuous mode completes a pass and returns once shutdown resolves.
#[tokio::test]
async fn test_continuous_stops_on_shutdown() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    push_log(&env, 950, 1);
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    worker.run_continuous(async {}).await.unwrap();

    assert!(env.hub.state().recorded.contains(&(origin_id(), word(1))));
}

/// 12. Test: Continuous Mode Stops On Fatal Error
/// Verifies that a corrupted checkpoint file ends continuous mode with a
/// configuration error instead of looping.
#[tokio::test]
async fn test_continuous_stops_on_fatal_error() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    std::fs::write(&env.config.reconcile.checkpoint_path, "{ not json").unwrap();
    let topology = Topology::connect(&env.config).await.unwrap();
    let worker = ReconciliationWorker::new(&topology, &env.config.reconcile);

    let err = worker
        .run_continuous(std::future::pending::<()>())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("corrupted"), "got: {}", err);
}

/// 13. Test: Recorded Author
/// Verifies that the author recorded on the hub comes from the event's indexed topic.
#[tokio::test]
async fn test_recorded_author_from_topic() {
    let env = TestEnv::start(TransportKind::Mailbox).await;
    start_at(&env, 250, Some(100)).await;
    push_log(&env, 200, 5);
    let topology = Topology::connect(&env.config).await.unwrap();

    ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    let hub_state = env.hub.state();
    let recorded = hub_state
        .logs
        .iter()
        .find(|log| log["topics"][0] == event_topic(hub::OFFCHAIN_RECEIPT_RECORDED).to_string())
        .expect("OffchainReceiptRecorded emitted");
    assert_eq!(
        recorded["data"].as_str().unwrap(),
        format!("0x{}", hex::encode(to_peer_id(&addr(DUMMY_AUTHOR_ADDR)).as_bytes()))
    );
    assert_eq!(hub_state.sent[0].to, hub_state.contract);
}

// ============================================================================
// CHECKPOINT STORE
// ============================================================================

/// 14. Test: Missing Checkpoint File
/// Verifies that an absent file reads as no checkpoints.
#[tokio::test]
async fn test_missing_checkpoint_file() {
    let store = CheckpointStore::new(temp_state_path("missing"));
    assert!(store.load_all().await.unwrap().is_empty());
    assert_eq!(store.get("spoke-a").await.unwrap(), None);
}

/// 15. Test: Checkpoints Never Move Back
/// Verifies that advancing to an older block leaves the checkpoint unchanged.
#[tokio::test]
async fn test_checkpoint_is_monotonic() {
    let store = CheckpointStore::new(temp_state_path("monotonic"));
    store.advance("spoke-a", 200).await.unwrap();
    store.advance("spoke-a", 150).await.unwrap();
    assert_eq!(store.get("spoke-a").await.unwrap(), Some(200));

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({ "spoke-a": 200 }));

    std::fs::remove_file(store.path()).unwrap();
}

/// 16. Test: Corrupted Checkpoint File
/// Verifies that unparsable content is an error rather than a silent reset.
#[tokio::test]
async fn test_corrupted_checkpoint_file() {
    let path = temp_state_path("corrupted");
    std::fs::write(&path, "[1, 2").unwrap();
    let store = CheckpointStore::new(path.clone());

    let err = store.get("spoke-a").await.unwrap_err();
    assert!(matches!(err, MirrorError::Config(_)), "got: {:?}", err);

    std::fs::remove_file(path).unwrap();
}

/// 17. Test: Concurrent Origins
/// Verifies that concurrent advances for different origins all persist and
/// leave no temp files behind.
#[tokio::test]
async fn test_concurrent_advances_persist() {
    let dir = std::env::temp_dir().join(format!("log-mirror-ckpt-{}", rand_suffix()));
    let store = CheckpointStore::new(dir.join("state.json"));

    join_all((0..8u64).map(|i| {
        let store = &store;
        async move { store.advance(&format!("origin-{}", i), 100 + i).await }
    }))
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()
    .unwrap();

    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), 8);
    assert_eq!(all.get("origin-7"), Some(&107));

    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(dir).unwrap();
}

/// 18. Test: Origins Share The Hub Signer
/// Verifies that two origins recording in the same pass submit hub
/// transactions with consecutive nonces and all of them land.
/// Why: Both origins sign with the one hub key; a reused nonce is rejected.
#[tokio::test]
async fn test_two_origins_share_hub_nonces() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut env = TestEnv::start(TransportKind::Mailbox).await;
    let second_server = MockServer::start().await;
    let second = FakeChain::new(
        SECOND_SPOKE_CHAIN_ID,
        DUMMY_SPOKE_CONTRACT_ADDR,
        DUMMY_SPOKE_MAILBOX_ADDR,
    );
    second.mount(&second_server).await;
    env.config.spokes.push(build_chain_config(
        SECOND_SPOKE_NAME,
        &second_server.uri(),
        SECOND_SPOKE_CHAIN_ID,
        SECOND_SPOKE_DOMAIN,
        DUMMY_SPOKE_CONTRACT_ADDR,
        DUMMY_SPOKE_MAILBOX_ADDR,
    ));

    env.spoke.state().block_number = 250;
    second.state().block_number = 250;
    for i in 0..10u64 {
        push_log(&env, 150 + i, i + 1);
        second.state().push_spoke_log(
            150 + i,
            word(0x100 + i),
            addr(DUMMY_AUTHOR_ADDR),
            word(0x2000 + i),
            &format!("ipfs://b-{}", i),
        );
    }
    let topology = Topology::connect(&env.config).await.unwrap();

    let report = ReconciliationWorker::new(&topology, &env.config.reconcile)
        .run_once()
        .await;

    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
    assert_eq!(report.origins.len(), 2);
    assert!(report.origins.iter().all(|o| o.recorded == 10));

    let hub_state = env.hub.state();
    let nonces: Vec<u64> = hub_state.sent.iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, (0..20).collect::<Vec<u64>>());
    assert_eq!(hub_state.recorded.len(), 20);
    assert!(hub_state.recorded.contains(&(SECOND_SPOKE_CHAIN_ID as u32, word(0x109))));
}

fn rand_suffix() -> u64 {
    use rand::Rng;
    rand::thread_rng().gen()
}
