//! The subscriber loop — drives the system end-to-end.
//!
//! Each `poll_once` either advances the watermark by exactly the planned
//! amount and persists it, or fails and leaves the watermark untouched;
//! there is no partial commit. In continuous mode the loop absorbs errors
//! (emits on the error topic, backs off, retries) until cancelled.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use algosub_core::arc28::CompiledEventGroups;
use algosub_core::config::SubscriberConfig;
use algosub_core::dispatcher::{
    batch_topic, transaction_topic, BusEvent, BusHandler, Dispatcher, BEFORE_POLL, ERROR, POLL,
};
use algosub_core::error::SubscriberError;
use algosub_core::poll::{FilterMatches, PollResult};
use algosub_core::watermark::WatermarkStore;
use algosub_source::algod::BlockSource;
use algosub_source::indexer::HistorySource;

use crate::fetcher::{self, FetchContext};
use crate::planner::{self, PlanSource};

/// Bound on the wait-for-next-round long-poll.
const WAIT_FOR_ROUND_TIMEOUT: Duration = Duration::from_secs(60);
/// Backoff after a failed poll in continuous mode.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

struct LoopState {
    running: bool,
    /// Loaded lazily from the store on the first poll.
    watermark: Option<u64>,
}

/// A subscription over the ledger: polls for new rounds, filters canonical
/// transactions, and routes matches through the event bus.
pub struct Subscriber {
    config: SubscriberConfig,
    block_source: Arc<dyn BlockSource>,
    history_source: Option<Arc<dyn HistorySource>>,
    store: Option<Arc<dyn WatermarkStore>>,
    dispatcher: Dispatcher,
    compiled_events: CompiledEventGroups,
    state: Mutex<LoopState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").finish_non_exhaustive()
    }
}

impl Subscriber {
    /// Create a subscriber. Fails on invalid configuration. Must be called
    /// inside a tokio runtime (the dispatcher spawns background tasks).
    pub fn new(
        config: SubscriberConfig,
        block_source: Arc<dyn BlockSource>,
        history_source: Option<Arc<dyn HistorySource>>,
        store: Option<Arc<dyn WatermarkStore>>,
    ) -> Result<Self, SubscriberError> {
        config.validate()?;
        let compiled_events = CompiledEventGroups::compile(&config.event_groups);
        Ok(Self {
            config,
            block_source,
            history_source,
            store,
            dispatcher: Dispatcher::new(),
            compiled_events,
            state: Mutex::new(LoopState {
                running: false,
                watermark: None,
            }),
            cancel: CancellationToken::new(),
        })
    }

    /// The event bus, for registrations beyond the convenience methods.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register a handler for single matched records of a named filter.
    pub fn on_transaction(&self, filter_name: &str, handler: Arc<dyn BusHandler>) {
        self.dispatcher.on(transaction_topic(filter_name), handler);
    }

    /// Register a handler for the per-poll batch of a named filter.
    pub fn on_batch(&self, filter_name: &str, handler: Arc<dyn BusHandler>) {
        self.dispatcher.on(batch_topic(filter_name), handler);
    }

    pub fn on_before_poll(&self, handler: Arc<dyn BusHandler>) {
        self.dispatcher.on(BEFORE_POLL, handler);
    }

    pub fn on_poll(&self, handler: Arc<dyn BusHandler>) {
        self.dispatcher.on(POLL, handler);
    }

    pub fn on_error(&self, handler: Arc<dyn BusHandler>) {
        self.dispatcher.on(ERROR, handler);
    }

    /// The current in-memory watermark (0 before the first poll).
    pub fn watermark(&self) -> u64 {
        self.state.lock().unwrap().watermark.unwrap_or(0)
    }

    /// Returns `true` while `start` is running.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Signal the subscriber to stop. Idempotent; interrupts any sleep or
    /// wait-for-round promptly.
    pub fn stop(&self, reason: &str) {
        tracing::info!(reason, "stopping subscriber");
        self.cancel.cancel();
    }

    async fn load_watermark(&self) -> Result<u64, SubscriberError> {
        if let Some(watermark) = self.state.lock().unwrap().watermark {
            return Ok(watermark);
        }
        let loaded = match &self.store {
            Some(store) => store.load().await?,
            None => 0,
        };
        let mut state = self.state.lock().unwrap();
        Ok(*state.watermark.get_or_insert(loaded))
    }

    /// Run a single poll cycle.
    ///
    /// On success the in-memory watermark is advanced and written through to
    /// the store (when the value changed); on failure the error is emitted
    /// on the error topic and the watermark — in memory and in the store —
    /// is left untouched.
    pub async fn poll_once(&self) -> Result<PollResult, SubscriberError> {
        match self.poll_inner().await {
            Ok(result) => {
                self.dispatcher
                    .emit(POLL, BusEvent::Poll(Arc::new(result.clone())));
                Ok(result)
            }
            Err(e) => {
                // A poll interrupted by stop is not an error condition.
                if !matches!(e, SubscriberError::Cancelled(_)) {
                    self.dispatcher.emit_error(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn poll_inner(&self) -> Result<PollResult, SubscriberError> {
        let starting_watermark = self.load_watermark().await?;
        let status = self.block_source.status().await?;
        let tip = status.last_round;

        self.dispatcher.emit(
            BEFORE_POLL,
            BusEvent::BeforePoll {
                watermark: starting_watermark,
                tip,
            },
        );

        let plan = planner::plan(
            starting_watermark,
            tip,
            &self.config,
            self.history_source.is_some(),
        )?;
        tracing::debug!(
            watermark = starting_watermark,
            tip,
            source = ?plan.source,
            range = ?plan.range,
            "planned poll"
        );

        let ctx = FetchContext {
            config: &self.config,
            compiled_events: &self.compiled_events,
            cancel: &self.cancel,
        };
        let matches: Vec<FilterMatches> = match (plan.source, plan.range) {
            (PlanSource::Block, Some((from, to))) => {
                fetcher::run_block_plan(self.block_source.as_ref(), from, to, &ctx).await?
            }
            (PlanSource::History, Some((from, to))) => {
                let Some(source) = &self.history_source else {
                    return Err(SubscriberError::Other(
                        "history plan without a history source".into(),
                    ));
                };
                fetcher::run_history_plan(source.as_ref(), from, to, &ctx).await?
            }
            _ => empty_groups(&self.config),
        };

        // Batch first when non-empty, then the individual emissions in order.
        for group in &matches {
            if group.records.is_empty() {
                continue;
            }
            self.dispatcher.emit(
                &batch_topic(&group.filter_name),
                BusEvent::Batch {
                    filter_name: group.filter_name.clone(),
                    records: Arc::new(group.records.clone()),
                },
            );
            for record in &group.records {
                self.dispatcher.emit(
                    &transaction_topic(&group.filter_name),
                    BusEvent::Transaction {
                        filter_name: group.filter_name.clone(),
                        record: Arc::new(record.clone()),
                    },
                );
            }
        }

        // Write-through: persist first, then advance the in-memory value, so
        // a store failure leaves both sides at the old watermark.
        if plan.new_watermark != starting_watermark {
            if let Some(store) = &self.store {
                store.save(plan.new_watermark).await?;
            }
            self.state.lock().unwrap().watermark = Some(plan.new_watermark);
        }

        Ok(PollResult {
            starting_watermark,
            new_watermark: plan.new_watermark,
            synced_round_range: plan.range,
            current_round: tip,
            matches,
        })
    }

    /// Run continuously until [`stop`](Self::stop) is called.
    ///
    /// Concurrent `start` calls are rejected. An error does not end the
    /// loop by itself — it is emitted on the error topic and retried after
    /// a short backoff; cancel from an error handler to bail out.
    pub async fn start(&self) -> Result<(), SubscriberError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.running {
                return Err(SubscriberError::AlreadyRunning);
            }
            state.running = true;
        }
        let result = self.run_loop().await;
        self.state.lock().unwrap().running = false;
        result
    }

    async fn run_loop(&self) -> Result<(), SubscriberError> {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.poll_once().await {
                Ok(result) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    let at_tip = result.new_watermark >= result.current_round;
                    if result.is_empty_sync()
                        && at_tip
                        && self.config.wait_for_block_when_at_tip
                    {
                        self.wait_for_next_round(result.new_watermark).await;
                    } else {
                        self.interruptible_sleep(self.config.frequency).await;
                    }
                }
                Err(SubscriberError::Cancelled(_)) => break,
                Err(e) => {
                    tracing::error!(error = %e, "poll failed");
                    self.interruptible_sleep(ERROR_BACKOFF).await;
                }
            }
        }
        Ok(())
    }

    async fn wait_for_next_round(&self, round: u64) {
        let wait = self.block_source.status_after_block(round);
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            outcome = tokio::time::timeout(WAIT_FOR_ROUND_TIMEOUT, wait) => {
                match outcome {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "wait-for-round failed"),
                    Err(_) => tracing::debug!("wait-for-round timed out"),
                }
            }
        }
    }

    async fn interruptible_sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

fn empty_groups(config: &SubscriberConfig) -> Vec<FilterMatches> {
    config
        .filters
        .iter()
        .map(|f| FilterMatches {
            filter_name: f.name.clone(),
            records: vec![],
        })
        .collect()
}
