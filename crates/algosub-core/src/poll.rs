//! Poll output types.

use serde::Serialize;

use crate::types::Transaction;

/// A matched record routed to handlers: either the canonical transaction or,
/// when the owning filter declared a mapper, the mapper's output.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MatchedRecord {
    Transaction(Transaction),
    Mapped(serde_json::Value),
}

impl MatchedRecord {
    /// The canonical transaction, if this record was not mapped.
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(t) => Some(t),
            Self::Mapped(_) => None,
        }
    }
}

/// The records matched by one named filter during a poll, in round /
/// intra-round order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterMatches {
    #[serde(rename = "filter-name")]
    pub filter_name: String,
    pub records: Vec<MatchedRecord>,
}

/// The outcome of a single successful poll.
#[derive(Debug, Clone, Serialize)]
pub struct PollResult {
    #[serde(rename = "starting-watermark")]
    pub starting_watermark: u64,
    #[serde(rename = "new-watermark")]
    pub new_watermark: u64,
    /// The contiguous closed round interval actually covered; `None` when
    /// the poll synced nothing.
    #[serde(rename = "synced-round-range")]
    pub synced_round_range: Option<(u64, u64)>,
    /// The tip the block source reported at the start of the poll.
    #[serde(rename = "current-round")]
    pub current_round: u64,
    /// Per-filter matches, in config declaration order.
    pub matches: Vec<FilterMatches>,
}

impl PollResult {
    /// Total matched records across all filters.
    pub fn matched_count(&self) -> usize {
        self.matches.iter().map(|m| m.records.len()).sum()
    }

    /// Returns `true` if the poll covered no rounds.
    pub fn is_empty_sync(&self) -> bool {
        self.synced_round_range.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_count_sums_filters() {
        let result = PollResult {
            starting_watermark: 1000,
            new_watermark: 1001,
            synced_round_range: Some((1001, 1001)),
            current_round: 1001,
            matches: vec![
                FilterMatches {
                    filter_name: "payments".into(),
                    records: vec![MatchedRecord::Mapped(serde_json::json!({"n": 1}))],
                },
                FilterMatches {
                    filter_name: "apps".into(),
                    records: vec![],
                },
            ],
        };
        assert_eq!(result.matched_count(), 1);
        assert!(!result.is_empty_sync());
    }
}
