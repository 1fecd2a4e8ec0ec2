//! End-to-end subscriber scenarios against mock sources.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use algosub_core::arc28::{selector, Arc28ArgType, Arc28EventArg, Arc28EventGroup, Arc28EventSpec};
use algosub_core::config::SyncBehaviour;
use algosub_core::dispatcher::{BusEvent, BusHandler};
use algosub_core::error::{SourceError, SubscriberError};
use algosub_core::filter::{NamedFilter, TransactionFilter};
use algosub_core::types::{BalanceChangeRole, TxType};
use algosub_core::watermark::{MemoryWatermarkStore, WatermarkStore};
use algosub_engine::SubscriberBuilder;
use algosub_source::algod::{BlockSource, NodeStatus};
use algosub_source::block::RawBlock;
use algosub_source::indexer::{HistorySource, SearchParams, TransactionPage};

// ─── Mocks ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockBlockSource {
    blocks: Mutex<HashMap<u64, RawBlock>>,
    tip: AtomicU64,
    failing_rounds: Mutex<HashSet<u64>>,
    wait_calls: AtomicU64,
}

impl MockBlockSource {
    fn with_tip(tip: u64) -> Arc<Self> {
        let source = Self::default();
        source.tip.store(tip, Ordering::SeqCst);
        Arc::new(source)
    }

    fn insert_block(&self, block: RawBlock) {
        self.blocks.lock().unwrap().insert(block.rnd, block);
    }

    fn insert_empty_blocks(&self, from: u64, to: u64) {
        for round in from..=to {
            self.insert_block(block(round, json!([])));
        }
    }

    fn set_tip(&self, tip: u64) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    fn fail_round(&self, round: u64) {
        self.failing_rounds.lock().unwrap().insert(round);
    }
}

#[async_trait]
impl BlockSource for MockBlockSource {
    async fn status(&self) -> Result<NodeStatus, SourceError> {
        Ok(NodeStatus {
            last_round: self.tip.load(Ordering::SeqCst),
            ..Default::default()
        })
    }

    async fn block(&self, round: u64) -> Result<RawBlock, SourceError> {
        if round == 0 {
            return Err(SourceError::InvalidRound(0));
        }
        if self.failing_rounds.lock().unwrap().contains(&round) {
            return Err(SourceError::Api {
                status: 400,
                body: "injected failure".into(),
            });
        }
        self.blocks
            .lock()
            .unwrap()
            .get(&round)
            .cloned()
            .ok_or(SourceError::InvalidRound(round))
    }

    async fn status_after_block(&self, _round: u64) -> Result<NodeStatus, SourceError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        // Simulate an upstream long-poll that never resolves in the test.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        self.status().await
    }
}

#[derive(Default)]
struct MockHistorySource {
    pages: Mutex<VecDeque<TransactionPage>>,
    seen_params: Mutex<Vec<serde_json::Value>>,
}

impl MockHistorySource {
    fn with_pages(pages: Vec<TransactionPage>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            seen_params: Mutex::new(vec![]),
        })
    }
}

#[async_trait]
impl HistorySource for MockHistorySource {
    async fn search_transactions(
        &self,
        params: &SearchParams,
    ) -> Result<TransactionPage, SourceError> {
        self.seen_params
            .lock()
            .unwrap()
            .push(serde_json::to_value(params).unwrap());
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

struct Collector {
    events: Mutex<Vec<BusEvent>>,
}

impl Collector {
    fn arc() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(vec![]),
        })
    }

    fn events(&self) -> Vec<BusEvent> {
        self.events.lock().unwrap().clone()
    }

    fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl BusHandler for Collector {
    async fn handle(&self, event: BusEvent) -> Result<(), SubscriberError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingStore {
    value: Mutex<u64>,
    saves: Mutex<Vec<u64>>,
}

impl RecordingStore {
    fn starting_at(watermark: u64) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(watermark),
            saves: Mutex::new(vec![]),
        })
    }

    fn saved(&self) -> Vec<u64> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl WatermarkStore for RecordingStore {
    async fn load(&self) -> Result<u64, SubscriberError> {
        Ok(*self.value.lock().unwrap())
    }

    async fn save(&self, watermark: u64) -> Result<(), SubscriberError> {
        *self.value.lock().unwrap() = watermark;
        self.saves.lock().unwrap().push(watermark);
        Ok(())
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

fn block(round: u64, txns: serde_json::Value) -> RawBlock {
    serde_json::from_value(json!({
        "rnd": round,
        "ts": 1_700_000_000,
        "gen": "testnet-v1.0",
        "txns": txns,
    }))
    .unwrap()
}

fn pay_txn(sender: &str, receiver: &str, amount: u64, fee: u64) -> serde_json::Value {
    json!({
        "txn": {
            "type": "pay",
            "snd": sender,
            "rcv": receiver,
            "amt": amount,
            "fee": fee,
            "fv": 1,
            "lv": 2000
        }
    })
}

fn payments_filter() -> NamedFilter {
    NamedFilter::new(
        "payments",
        TransactionFilter {
            tx_type: Some(TxType::Payment),
            min_amount: Some(1000),
            ..Default::default()
        },
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(80)).await;
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn s1_one_round_pay_match() {
    let algod = MockBlockSource::with_tip(1001);
    algod.insert_block(block(1001, json!([pay_txn("SENDER", "RECEIVER", 5000, 1000)])));
    let store = Arc::new(MemoryWatermarkStore::starting_at(1000));

    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .block_source(algod)
        .watermark_store(store.clone())
        .build()
        .unwrap();
    let collected = Collector::arc();
    subscriber.on_transaction("payments", collected.clone());

    let result = subscriber.poll_once().await.unwrap();

    assert_eq!(result.starting_watermark, 1000);
    assert_eq!(result.new_watermark, 1001);
    assert_eq!(result.synced_round_range, Some((1001, 1001)));
    assert_eq!(result.current_round, 1001);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].filter_name, "payments");
    assert_eq!(result.matches[0].records.len(), 1);

    let txn = result.matches[0].records[0].transaction().unwrap();
    assert_eq!(txn.tx_type, TxType::Payment);
    assert_eq!(txn.confirmed_round, 1001);
    assert_eq!(txn.genesis_id.as_deref(), Some("testnet-v1.0"));

    let sender = txn
        .balance_changes
        .iter()
        .find(|c| c.address == "SENDER" && c.asset_id == 0)
        .unwrap();
    assert_eq!(sender.amount, -6000);
    assert_eq!(sender.roles, vec![BalanceChangeRole::Sender]);
    let receiver = txn
        .balance_changes
        .iter()
        .find(|c| c.address == "RECEIVER" && c.asset_id == 0)
        .unwrap();
    assert_eq!(receiver.amount, 5000);
    assert_eq!(receiver.roles, vec![BalanceChangeRole::Receiver]);

    assert_eq!(store.current(), 1001);
    settle().await;
    assert_eq!(collected.len(), 1);
}

#[tokio::test]
async fn s2_history_catchup_uses_prefilter() {
    let algod = MockBlockSource::with_tip(1000);
    let history = MockHistorySource::with_pages(vec![serde_json::from_value(json!({
        "current-round": 1000,
        "transactions": [{
            "id": "HIST1",
            "tx-type": "pay",
            "sender": "SENDER",
            "fee": 1000,
            "confirmed-round": 950,
            "round-time": 1_700_000_000,
            "first-valid": 900,
            "last-valid": 1900,
            "payment-transaction": { "receiver": "RECEIVER", "amount": 5000 }
        }]
    }))
    .unwrap()]);
    let store = Arc::new(MemoryWatermarkStore::starting_at(900));

    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .sync_behaviour(SyncBehaviour::CatchupWithHistory)
        .max_rounds_to_sync(10)
        .max_history_rounds_to_sync(100)
        .block_source(algod)
        .history_source(history.clone())
        .watermark_store(store.clone())
        .build()
        .unwrap();

    let result = subscriber.poll_once().await.unwrap();

    assert_eq!(result.synced_round_range, Some((901, 1000)));
    assert_eq!(result.new_watermark, 1000);
    assert_eq!(result.matches[0].records.len(), 1);
    assert_eq!(
        result.matches[0].records[0].transaction().unwrap().id,
        "HIST1"
    );

    let params = history.seen_params.lock().unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0]["min-round"], 901);
    assert_eq!(params[0]["max-round"], 1000);
    assert_eq!(params[0]["tx-type"], "pay");
    assert_eq!(params[0]["currency-greater-than"], 1000);
    assert_eq!(store.current(), 1000);
}

#[tokio::test]
async fn s3_inner_transaction_routing() {
    let algod = MockBlockSource::with_tip(1001);
    algod.insert_block(block(
        1001,
        json!([{
            "txn": { "type": "appl", "snd": "CALLER", "apid": 42, "fee": 1000 },
            "dt": {
                "itx": [{
                    "txid": "INNER_PAY1",
                    "txn": {
                        "type": "pay",
                        "snd": "INNER_SENDER",
                        "rcv": "INNER_RECEIVER",
                        "amt": 500_000,
                        "fee": 0
                    }
                }]
            }
        }]),
    ));

    let subscriber = SubscriberBuilder::new()
        .filter(NamedFilter::new(
            "payments",
            TransactionFilter {
                tx_type: Some(TxType::Payment),
                ..Default::default()
            },
        ))
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
        .build()
        .unwrap();
    let collected = Collector::arc();
    subscriber.on_transaction("payments", collected.clone());

    let result = subscriber.poll_once().await.unwrap();

    assert_eq!(result.matches[0].records.len(), 1);
    let inner = result.matches[0].records[0].transaction().unwrap();
    assert_eq!(inner.id, "INNER_PAY1");
    assert_eq!(inner.intra_round_offset, 1); // parent offset 0 + 1
    assert_eq!(inner.sender, "INNER_SENDER");

    settle().await;
    assert_eq!(collected.len(), 1);
}

#[tokio::test]
async fn s4_selector_decoding() {
    let group = Arc28EventGroup {
        group_name: "TestEvents".into(),
        events: vec![Arc28EventSpec {
            name: "Transfer".into(),
            args: vec![
                Arc28EventArg {
                    name: "from".into(),
                    ty: Arc28ArgType::Address,
                },
                Arc28EventArg {
                    name: "to".into(),
                    ty: Arc28ArgType::Address,
                },
                Arc28EventArg {
                    name: "amount".into(),
                    ty: Arc28ArgType::Uint64,
                },
            ],
        }],
    };
    let mut log = selector("Transfer(address,address,uint64)").to_vec();
    log.extend_from_slice(&[b'A'; 32]);
    log.extend_from_slice(&[b'B'; 32]);
    log.extend_from_slice(&1000u64.to_be_bytes());

    let algod = MockBlockSource::with_tip(1001);
    algod.insert_block(block(
        1001,
        json!([{
            "txn": { "type": "appl", "snd": "CALLER", "apid": 42, "fee": 1000 },
            "dt": { "lg": [BASE64.encode(&log)] }
        }]),
    ));

    let subscriber = SubscriberBuilder::new()
        .filter(NamedFilter::new(
            "apps",
            TransactionFilter {
                tx_type: Some(TxType::AppCall),
                ..Default::default()
            },
        ))
        .event_group(group)
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
        .build()
        .unwrap();

    let result = subscriber.poll_once().await.unwrap();
    let txn = result.matches[0].records[0].transaction().unwrap();
    assert_eq!(txn.arc28_events.len(), 1);
    let event = &txn.arc28_events[0];
    assert_eq!(event.group_name, "TestEvents");
    assert_eq!(event.event_name, "Transfer");
    assert_eq!(event.args["from"], BASE64.encode([b'A'; 32]));
    assert_eq!(event.args["to"], BASE64.encode([b'B'; 32]));
    assert_eq!(event.args["amount"], 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s5_stop_interrupts_the_inter_poll_sleep() {
    let algod = MockBlockSource::with_tip(1001);
    algod.insert_block(block(1001, json!([])));

    let subscriber = Arc::new(
        SubscriberBuilder::new()
            .filter(payments_filter())
            .frequency(Duration::from_secs(30))
            .block_source(algod)
            .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&subscriber);
    let handle = tokio::spawn(async move { runner.start().await });

    // Let the first poll finish and the loop enter its sleep.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(subscriber.is_running());

    let stopped_at = std::time::Instant::now();
    subscriber.stop("test shutdown");
    handle.await.unwrap().unwrap();
    assert!(
        stopped_at.elapsed() < Duration::from_secs(1),
        "stop took {:?}",
        stopped_at.elapsed()
    );
    assert!(!subscriber.is_running());
}

#[tokio::test]
async fn s6_watermark_persistence_and_no_advance_on_failure() {
    let algod = MockBlockSource::with_tip(1005);
    algod.insert_empty_blocks(1001, 1005);
    let store = RecordingStore::starting_at(1000);

    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .max_rounds_to_sync(5)
        .block_source(algod.clone())
        .watermark_store(store.clone())
        .build()
        .unwrap();

    subscriber.poll_once().await.unwrap();
    algod.set_tip(1010);
    algod.insert_empty_blocks(1006, 1010);
    subscriber.poll_once().await.unwrap();
    assert_eq!(store.saved(), vec![1005, 1010]);

    // Third poll fails mid-batch; nothing further may be saved.
    algod.set_tip(1012);
    algod.insert_empty_blocks(1011, 1012);
    algod.fail_round(1012);
    let err = subscriber.poll_once().await.unwrap_err();
    assert!(matches!(err, SubscriberError::Source(_)));
    assert_eq!(store.saved(), vec![1005, 1010]);
    assert_eq!(subscriber.watermark(), 1010);
}

#[tokio::test]
async fn history_pagination_follows_every_token() {
    fn history_pay(id: &str, round: u64) -> serde_json::Value {
        json!({
            "id": id,
            "tx-type": "pay",
            "sender": "SENDER",
            "fee": 1000,
            "confirmed-round": round,
            "round-time": 1_700_000_000,
            "first-valid": 1,
            "last-valid": 2000,
            "payment-transaction": { "receiver": "RECEIVER", "amount": 2000 }
        })
    }
    let pages = vec![
        serde_json::from_value(json!({
            "current-round": 1000,
            "next-token": "p2",
            "transactions": [history_pay("PAGE1", 901)]
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "current-round": 1000,
            "next-token": "p3",
            "transactions": [history_pay("PAGE2", 902)]
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "current-round": 1000,
            "transactions": [history_pay("PAGE3", 903)]
        }))
        .unwrap(),
    ];
    let algod = MockBlockSource::with_tip(1000);
    let history = MockHistorySource::with_pages(pages);

    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .sync_behaviour(SyncBehaviour::CatchupWithHistory)
        .max_rounds_to_sync(10)
        .max_history_rounds_to_sync(1000)
        .block_source(algod)
        .history_source(history.clone())
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(900)))
        .build()
        .unwrap();

    let result = subscriber.poll_once().await.unwrap();
    let ids: Vec<&str> = result.matches[0]
        .records
        .iter()
        .map(|r| r.transaction().unwrap().id.as_str())
        .collect();
    assert_eq!(ids, vec!["PAGE1", "PAGE2", "PAGE3"]);

    let params = history.seen_params.lock().unwrap();
    assert_eq!(params.len(), 3);
    assert!(params[0].get("next").is_none());
    assert_eq!(params[1]["next"], "p2");
    assert_eq!(params[2]["next"], "p3");
}

#[tokio::test]
async fn empty_poll_emits_only_lifecycle_events() {
    let algod = MockBlockSource::with_tip(1000);
    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
        .build()
        .unwrap();

    let before_polls = Collector::arc();
    let polls = Collector::arc();
    let transactions = Collector::arc();
    let batches = Collector::arc();
    subscriber.on_before_poll(before_polls.clone());
    subscriber.on_poll(polls.clone());
    subscriber.on_transaction("payments", transactions.clone());
    subscriber.on_batch("payments", batches.clone());

    let result = subscriber.poll_once().await.unwrap();
    assert!(result.is_empty_sync());
    assert_eq!(result.new_watermark, 1000);

    settle().await;
    assert_eq!(before_polls.len(), 1);
    assert_eq!(polls.len(), 1);
    assert_eq!(transactions.len(), 0);
    assert_eq!(batches.len(), 0);

    match &before_polls.events()[0] {
        BusEvent::BeforePoll { watermark, tip } => {
            assert_eq!(*watermark, 1000);
            assert_eq!(*tip, 1000);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn start_now_first_poll_jumps_to_tip() {
    let algod = MockBlockSource::with_tip(5000);
    let store = RecordingStore::starting_at(0);
    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .sync_behaviour(SyncBehaviour::SyncOldestStartNow)
        .block_source(algod)
        .watermark_store(store.clone())
        .build()
        .unwrap();

    let result = subscriber.poll_once().await.unwrap();
    assert_eq!(result.new_watermark, 5000);
    assert!(result.is_empty_sync());
    assert_eq!(result.matched_count(), 0);
    assert_eq!(store.saved(), vec![5000]);
}

#[tokio::test]
async fn behind_tip_failure_reaches_error_topic() {
    let algod = MockBlockSource::with_tip(5000);
    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .sync_behaviour(SyncBehaviour::Fail)
        .max_rounds_to_sync(10)
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(100)))
        .build()
        .unwrap();
    let errors = Collector::arc();
    subscriber.on_error(errors.clone());

    let err = subscriber.poll_once().await.unwrap_err();
    assert!(matches!(err, SubscriberError::BehindTip { .. }));
    assert_eq!(subscriber.watermark(), 100);

    settle().await;
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn batch_carries_the_whole_poll() {
    let algod = MockBlockSource::with_tip(1002);
    algod.insert_block(block(1001, json!([pay_txn("A", "B", 2000, 1000)])));
    algod.insert_block(block(
        1002,
        json!([pay_txn("C", "D", 3000, 1000), pay_txn("E", "F", 4000, 1000)]),
    ));

    let subscriber = SubscriberBuilder::new()
        .filter(payments_filter())
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
        .build()
        .unwrap();
    let batches = Collector::arc();
    let transactions = Collector::arc();
    subscriber.on_batch("payments", batches.clone());
    subscriber.on_transaction("payments", transactions.clone());

    let result = subscriber.poll_once().await.unwrap();
    assert_eq!(result.matches[0].records.len(), 3);

    settle().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(transactions.len(), 3);
    match &batches.events()[0] {
        BusEvent::Batch { records, .. } => assert_eq!(records.len(), 3),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn mapper_output_replaces_the_transaction() {
    let algod = MockBlockSource::with_tip(1001);
    algod.insert_block(block(1001, json!([pay_txn("SENDER", "RECEIVER", 5000, 1000)])));

    let mut filter = payments_filter();
    filter.mapper = Some(Arc::new(|txn: &algosub_core::types::Transaction| {
        json!({ "id": txn.id.clone(), "amount": txn.amount() })
    }));

    let subscriber = SubscriberBuilder::new()
        .filter(filter)
        .block_source(algod)
        .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
        .build()
        .unwrap();

    let result = subscriber.poll_once().await.unwrap();
    let record = &result.matches[0].records[0];
    assert!(record.transaction().is_none());
    match record {
        algosub_core::poll::MatchedRecord::Mapped(v) => assert_eq!(v["amount"], 5000),
        other => panic!("expected mapped record, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_start_is_rejected() {
    let algod = MockBlockSource::with_tip(1000);
    let subscriber = Arc::new(
        SubscriberBuilder::new()
            .filter(payments_filter())
            .frequency(Duration::from_secs(30))
            .block_source(algod)
            .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&subscriber);
    let handle = tokio::spawn(async move { runner.start().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = subscriber.start().await;
    assert!(matches!(second, Err(SubscriberError::AlreadyRunning)));

    subscriber.stop("done");
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn at_tip_long_polls_when_configured() {
    let algod = MockBlockSource::with_tip(1000);
    let subscriber = Arc::new(
        SubscriberBuilder::new()
            .filter(payments_filter())
            .wait_for_block_when_at_tip(true)
            .frequency(Duration::from_secs(30))
            .block_source(algod.clone())
            .watermark_store(Arc::new(MemoryWatermarkStore::starting_at(1000)))
            .build()
            .unwrap(),
    );

    let runner = Arc::clone(&subscriber);
    let handle = tokio::spawn(async move { runner.start().await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(algod.wait_calls.load(Ordering::SeqCst) >= 1);

    // Cancellation interrupts the in-flight long-poll promptly.
    let stopped_at = std::time::Instant::now();
    subscriber.stop("done");
    handle.await.unwrap().unwrap();
    assert!(stopped_at.elapsed() < Duration::from_secs(1));
}
