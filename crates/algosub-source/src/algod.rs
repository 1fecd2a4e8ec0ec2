//! The block source — the node-facing injected interface.
//!
//! Used for recent rounds and tip following. The HTTP transport behind an
//! implementation is out of scope here; the engine only relies on the three
//! operations below and the [`SourceError`] failure model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use algosub_core::error::SourceError;

use crate::block::RawBlock;

/// Node status as reported by the block source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    /// The largest round the node knows about — the tip.
    #[serde(rename = "last-round")]
    pub last_round: u64,
    /// Nanoseconds since the last round was committed.
    #[serde(rename = "time-since-last-round")]
    pub time_since_last_round: u64,
    #[serde(rename = "catchup-time")]
    pub catchup_time: u64,
    #[serde(rename = "last-version", skip_serializing_if = "Option::is_none")]
    pub last_version: Option<String>,
    #[serde(rename = "next-version", skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,
    #[serde(rename = "next-version-round", skip_serializing_if = "Option::is_none")]
    pub next_version_round: Option<u64>,
    #[serde(
        rename = "next-version-supported",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_version_supported: Option<bool>,
    #[serde(
        rename = "stopped-at-unsupported-round",
        skip_serializing_if = "Option::is_none"
    )]
    pub stopped_at_unsupported_round: Option<bool>,
}

/// Injected interface over a node's block API.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Current node status; `status().last_round` is the tip.
    async fn status(&self) -> Result<NodeStatus, SourceError>;

    /// Retrieve a single block. `round` must be positive; implementations
    /// fail with [`SourceError::InvalidRound`] for zero or unknown rounds.
    async fn block(&self, round: u64) -> Result<RawBlock, SourceError>;

    /// Long-poll until a round strictly greater than `round` is available,
    /// then return the status. The wire-level wait is bounded upstream
    /// (typically tens of seconds); callers apply their own timeout.
    async fn status_after_block(&self, round: u64) -> Result<NodeStatus, SourceError>;
}
