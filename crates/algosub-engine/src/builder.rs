//! Fluent builder API for assembling a subscriber.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use algosub_core::config::SyncBehaviour;
//! use algosub_core::filter::{NamedFilter, TransactionFilter};
//! use algosub_core::types::TxType;
//! use algosub_engine::SubscriberBuilder;
//!
//! # fn sources() -> (Arc<dyn algosub_source::BlockSource>, Arc<dyn algosub_core::WatermarkStore>) { unimplemented!() }
//! # async fn example() -> Result<(), algosub_core::SubscriberError> {
//! let (algod, store) = sources();
//! let subscriber = SubscriberBuilder::new()
//!     .filter(NamedFilter::new(
//!         "payments",
//!         TransactionFilter {
//!             tx_type: Some(TxType::Payment),
//!             min_amount: Some(1000),
//!             ..Default::default()
//!         },
//!     ))
//!     .sync_behaviour(SyncBehaviour::SyncOldest)
//!     .frequency(Duration::from_secs(5))
//!     .block_source(algod)
//!     .watermark_store(store)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use algosub_core::arc28::Arc28EventGroup;
use algosub_core::config::{SubscriberConfig, SyncBehaviour};
use algosub_core::error::SubscriberError;
use algosub_core::filter::NamedFilter;
use algosub_core::watermark::WatermarkStore;
use algosub_source::algod::BlockSource;
use algosub_source::indexer::HistorySource;

use crate::subscriber::Subscriber;

/// Fluent builder for [`Subscriber`].
#[derive(Default)]
pub struct SubscriberBuilder {
    config: SubscriberConfig,
    block_source: Option<Arc<dyn BlockSource>>,
    history_source: Option<Arc<dyn HistorySource>>,
    store: Option<Arc<dyn WatermarkStore>>,
}

impl SubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a named filter (declaration order is dispatch-grouping order).
    pub fn filter(mut self, filter: NamedFilter) -> Self {
        self.config.filters.push(filter);
        self
    }

    /// Declare an event vocabulary used by the subscription's filters.
    pub fn event_group(mut self, group: Arc28EventGroup) -> Self {
        self.config.event_groups.push(group);
        self
    }

    pub fn sync_behaviour(mut self, behaviour: SyncBehaviour) -> Self {
        self.config.sync_behaviour = behaviour;
        self
    }

    pub fn max_rounds_to_sync(mut self, rounds: u64) -> Self {
        self.config.max_rounds_to_sync = rounds;
        self
    }

    pub fn max_history_rounds_to_sync(mut self, rounds: u64) -> Self {
        self.config.max_history_rounds_to_sync = rounds;
        self
    }

    /// Inter-poll sleep in continuous mode.
    pub fn frequency(mut self, frequency: Duration) -> Self {
        self.config.frequency = frequency;
        self
    }

    /// Long-poll for the next round instead of sleeping when at tip.
    pub fn wait_for_block_when_at_tip(mut self, wait: bool) -> Self {
        self.config.wait_for_block_when_at_tip = wait;
        self
    }

    /// Fan-out width for parallel block retrieval.
    pub fn fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.config.fetch_concurrency = concurrency;
        self
    }

    pub fn block_source(mut self, source: Arc<dyn BlockSource>) -> Self {
        self.block_source = Some(source);
        self
    }

    pub fn history_source(mut self, source: Arc<dyn HistorySource>) -> Self {
        self.history_source = Some(source);
        self
    }

    pub fn watermark_store(mut self, store: Arc<dyn WatermarkStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the subscriber. Fails when no block source was provided or the
    /// configuration is invalid.
    pub fn build(self) -> Result<Subscriber, SubscriberError> {
        let block_source = self.block_source.ok_or_else(|| {
            SubscriberError::Configuration("a block source is required".into())
        })?;
        Subscriber::new(
            self.config,
            block_source,
            self.history_source,
            self.store,
        )
    }
}
