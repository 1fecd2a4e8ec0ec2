//! Subscription configuration and validation.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arc28::Arc28EventGroup;
use crate::error::SubscriberError;
use crate::filter::NamedFilter;

/// Catch-up policy, with the config strings preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncBehaviour {
    /// Catch up through the history source when the gap exceeds
    /// `max_rounds_to_sync`, otherwise sync from the block source.
    #[serde(rename = "catchup-with-indexer")]
    CatchupWithHistory,
    /// Always sync the oldest unprocessed rounds from the block source.
    #[serde(rename = "sync-oldest")]
    SyncOldest,
    /// Like `sync-oldest`, but a first-ever run (watermark 0) jumps straight
    /// to the tip instead of replaying history.
    #[serde(rename = "sync-oldest-start-now")]
    SyncOldestStartNow,
    /// Skip any backlog every poll: move the watermark to the tip without
    /// processing the skipped rounds.
    #[serde(rename = "skip-sync-newest")]
    SkipSyncNewest,
    /// Fail the poll when the backlog exceeds `max_rounds_to_sync`.
    #[serde(rename = "fail")]
    Fail,
}

impl SyncBehaviour {
    pub fn as_config_str(&self) -> &'static str {
        match self {
            Self::CatchupWithHistory => "catchup-with-indexer",
            Self::SyncOldest => "sync-oldest",
            Self::SyncOldestStartNow => "sync-oldest-start-now",
            Self::SkipSyncNewest => "skip-sync-newest",
            Self::Fail => "fail",
        }
    }
}

impl std::fmt::Display for SyncBehaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_config_str())
    }
}

impl std::str::FromStr for SyncBehaviour {
    type Err = SubscriberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catchup-with-indexer" => Ok(Self::CatchupWithHistory),
            "sync-oldest" => Ok(Self::SyncOldest),
            "sync-oldest-start-now" => Ok(Self::SyncOldestStartNow),
            "skip-sync-newest" => Ok(Self::SkipSyncNewest),
            "fail" => Ok(Self::Fail),
            other => Err(SubscriberError::Configuration(format!(
                "unrecognized sync behaviour: {other}"
            ))),
        }
    }
}

/// Configuration for a subscription.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Named filters, in declaration (and therefore dispatch-grouping) order.
    pub filters: Vec<NamedFilter>,
    /// Declared event vocabularies — the union used by all filters.
    pub event_groups: Vec<Arc28EventGroup>,
    /// Maximum rounds per block-source plan.
    pub max_rounds_to_sync: u64,
    /// Maximum rounds per history-source plan.
    pub max_history_rounds_to_sync: u64,
    pub sync_behaviour: SyncBehaviour,
    /// Inter-poll sleep in continuous mode.
    pub frequency: Duration,
    /// Long-poll the block source for the next round when already at tip,
    /// instead of sleeping `frequency`.
    pub wait_for_block_when_at_tip: bool,
    /// Fan-out width for parallel block retrieval.
    pub fetch_concurrency: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            filters: vec![],
            event_groups: vec![],
            max_rounds_to_sync: 500,
            max_history_rounds_to_sync: 1000,
            sync_behaviour: SyncBehaviour::SyncOldest,
            frequency: Duration::from_secs(1),
            wait_for_block_when_at_tip: false,
            fetch_concurrency: 30,
        }
    }
}

impl SubscriberConfig {
    /// Validate the configuration. Rejects zero limits, a zero frequency,
    /// zero fetch concurrency, and duplicate filter names (a duplicate
    /// routing key would silently merge two bus topics).
    pub fn validate(&self) -> Result<(), SubscriberError> {
        if self.max_rounds_to_sync == 0 {
            return Err(SubscriberError::Configuration(
                "max_rounds_to_sync must be positive".into(),
            ));
        }
        if self.max_history_rounds_to_sync == 0 {
            return Err(SubscriberError::Configuration(
                "max_history_rounds_to_sync must be positive".into(),
            ));
        }
        if self.frequency.is_zero() {
            return Err(SubscriberError::Configuration(
                "frequency must be positive".into(),
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(SubscriberError::Configuration(
                "fetch_concurrency must be positive".into(),
            ));
        }
        let mut seen = HashSet::new();
        for filter in &self.filters {
            if filter.name.is_empty() {
                return Err(SubscriberError::Configuration(
                    "filter names must be non-empty".into(),
                ));
            }
            if !seen.insert(filter.name.as_str()) {
                return Err(SubscriberError::Configuration(format!(
                    "duplicate filter name: {}",
                    filter.name
                )));
            }
        }
        Ok(())
    }
}
