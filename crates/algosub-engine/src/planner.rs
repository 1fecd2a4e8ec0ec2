//! The sync planner — decides what to fetch next.
//!
//! Given the persisted watermark, the current tip, and the catch-up policy,
//! the planner produces a [`Plan`]: which source to use, the inclusive round
//! range to cover, and the watermark to adopt on success. The planner is
//! memoryless across polls — when a range is shortened by a limit, the
//! remainder is picked up on the next poll purely from the watermark.

use algosub_core::config::{SubscriberConfig, SyncBehaviour};
use algosub_core::error::SubscriberError;

/// Which upstream a plan draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Block,
    History,
    /// Nothing to fetch: already at tip, or the behaviour jumps the
    /// watermark without processing.
    Skip,
}

/// The planner's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub source: PlanSource,
    /// Inclusive round range to cover; `None` for skip plans.
    pub range: Option<(u64, u64)>,
    /// The watermark to adopt once the plan succeeds.
    pub new_watermark: u64,
}

impl Plan {
    fn skip(new_watermark: u64) -> Self {
        Self {
            source: PlanSource::Skip,
            range: None,
            new_watermark,
        }
    }
}

/// Produce the plan for one poll.
pub fn plan(
    watermark: u64,
    tip: u64,
    config: &SubscriberConfig,
    has_history_source: bool,
) -> Result<Plan, SubscriberError> {
    if watermark >= tip {
        return Ok(Plan::skip(watermark));
    }

    match config.sync_behaviour {
        SyncBehaviour::SkipSyncNewest => return Ok(Plan::skip(tip)),
        // A first-ever run jumps straight to the tip without replaying.
        SyncBehaviour::SyncOldestStartNow if watermark == 0 => return Ok(Plan::skip(tip)),
        SyncBehaviour::Fail if tip > watermark + config.max_rounds_to_sync => {
            return Err(SubscriberError::BehindTip {
                watermark,
                tip,
                max_rounds_to_sync: config.max_rounds_to_sync,
            });
        }
        _ => {}
    }

    let from = watermark + 1;
    let behind_by = tip - watermark;

    if config.sync_behaviour == SyncBehaviour::CatchupWithHistory
        && has_history_source
        && behind_by > config.max_rounds_to_sync
    {
        let to = (watermark + config.max_history_rounds_to_sync).min(tip);
        return Ok(Plan {
            source: PlanSource::History,
            range: Some((from, to)),
            new_watermark: to,
        });
    }

    let to = (watermark + config.max_rounds_to_sync).min(tip);
    Ok(Plan {
        source: PlanSource::Block,
        range: Some((from, to)),
        new_watermark: to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(behaviour: SyncBehaviour) -> SubscriberConfig {
        SubscriberConfig {
            sync_behaviour: behaviour,
            max_rounds_to_sync: 10,
            max_history_rounds_to_sync: 100,
            ..Default::default()
        }
    }

    #[test]
    fn at_tip_is_a_noop() {
        let p = plan(1000, 1000, &config(SyncBehaviour::SyncOldest), false).unwrap();
        assert_eq!(p.source, PlanSource::Skip);
        assert_eq!(p.range, None);
        assert_eq!(p.new_watermark, 1000);
    }

    #[test]
    fn ahead_of_tip_is_a_noop() {
        let p = plan(1005, 1000, &config(SyncBehaviour::SyncOldest), false).unwrap();
        assert_eq!(p.new_watermark, 1005);
    }

    #[test]
    fn block_range_is_limited() {
        let p = plan(1000, 2000, &config(SyncBehaviour::SyncOldest), false).unwrap();
        assert_eq!(p.source, PlanSource::Block);
        assert_eq!(p.range, Some((1001, 1010)));
        assert_eq!(p.new_watermark, 1010);
    }

    #[test]
    fn block_range_clamps_to_tip() {
        let p = plan(1000, 1003, &config(SyncBehaviour::SyncOldest), false).unwrap();
        assert_eq!(p.range, Some((1001, 1003)));
    }

    #[test]
    fn catchup_uses_history_when_far_behind() {
        let p = plan(900, 1000, &config(SyncBehaviour::CatchupWithHistory), true).unwrap();
        assert_eq!(p.source, PlanSource::History);
        assert_eq!(p.range, Some((901, 1000)));
        assert_eq!(p.new_watermark, 1000);
    }

    #[test]
    fn catchup_without_history_source_falls_back_to_blocks() {
        let p = plan(900, 1000, &config(SyncBehaviour::CatchupWithHistory), false).unwrap();
        assert_eq!(p.source, PlanSource::Block);
        assert_eq!(p.range, Some((901, 910)));
    }

    #[test]
    fn catchup_within_limit_stays_on_blocks() {
        let p = plan(995, 1000, &config(SyncBehaviour::CatchupWithHistory), true).unwrap();
        assert_eq!(p.source, PlanSource::Block);
        assert_eq!(p.range, Some((996, 1000)));
    }

    #[test]
    fn history_range_is_limited() {
        let p = plan(0, 10_000, &config(SyncBehaviour::CatchupWithHistory), true).unwrap();
        assert_eq!(p.source, PlanSource::History);
        assert_eq!(p.range, Some((1, 100)));
    }

    #[test]
    fn start_now_first_run_jumps_to_tip() {
        let p = plan(0, 5000, &config(SyncBehaviour::SyncOldestStartNow), false).unwrap();
        assert_eq!(p.source, PlanSource::Skip);
        assert_eq!(p.range, None);
        assert_eq!(p.new_watermark, 5000);
    }

    #[test]
    fn start_now_later_runs_sync_oldest() {
        let p = plan(4990, 5000, &config(SyncBehaviour::SyncOldestStartNow), false).unwrap();
        assert_eq!(p.source, PlanSource::Block);
        assert_eq!(p.range, Some((4991, 5000)));
    }

    #[test]
    fn skip_sync_newest_jumps_every_poll() {
        let p = plan(100, 5000, &config(SyncBehaviour::SkipSyncNewest), false).unwrap();
        assert_eq!(p.source, PlanSource::Skip);
        assert_eq!(p.new_watermark, 5000);
    }

    #[test]
    fn fail_raises_when_too_far_behind() {
        let err = plan(100, 5000, &config(SyncBehaviour::Fail), false).unwrap_err();
        assert!(matches!(err, SubscriberError::BehindTip { .. }));
    }

    #[test]
    fn fail_within_limit_behaves_as_sync_oldest() {
        let p = plan(995, 1000, &config(SyncBehaviour::Fail), false).unwrap();
        assert_eq!(p.source, PlanSource::Block);
        assert_eq!(p.range, Some((996, 1000)));
    }
}
