//! Plan execution — retrieves, normalizes, enriches, and filters.
//!
//! The block path fans out to bounded-parallel block retrieval; a round that
//! still fails after retries fails the whole batch, so the watermark never
//! advances past lost data. The history path drives cursor-based pagination
//! per named filter with the coarsest pre-filter the source supports.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use algosub_core::arc28::CompiledEventGroups;
use algosub_core::balance::compute_balance_changes;
use algosub_core::config::SubscriberConfig;
use algosub_core::error::SubscriberError;
use algosub_core::filter::{NamedFilter, TransactionFilter};
use algosub_core::poll::{FilterMatches, MatchedRecord};
use algosub_core::types::Transaction;
use algosub_source::algod::BlockSource;
use algosub_source::block::RawBlock;
use algosub_source::indexer::{AddressRole, HistorySource, SearchParams, DEFAULT_SEARCH_LIMIT};
use algosub_source::normalize::{from_history, normalize_block};

/// Retries per round fetch, beyond the first attempt.
const ROUND_FETCH_RETRIES: u32 = 3;
const ROUND_RETRY_BASE: Duration = Duration::from_millis(500);
const ROUND_RETRY_CAP: Duration = Duration::from_secs(10);

/// Shared per-poll context.
pub(crate) struct FetchContext<'a> {
    pub config: &'a SubscriberConfig,
    pub compiled_events: &'a CompiledEventGroups,
    pub cancel: &'a CancellationToken,
}

impl FetchContext<'_> {
    fn empty_groups(&self) -> Vec<FilterMatches> {
        self.config
            .filters
            .iter()
            .map(|f| FilterMatches {
                filter_name: f.name.clone(),
                records: vec![],
            })
            .collect()
    }
}

/// Synthesize balance changes and decoded events for a transaction and its
/// whole inner subtree.
fn enrich(txn: &mut Transaction, events: &CompiledEventGroups) {
    txn.balance_changes = compute_balance_changes(txn);
    txn.arc28_events = events.decode_logs(&txn.id, txn.logs());
    for inner in &mut txn.inner_txns {
        enrich(inner, events);
    }
}

/// Evaluate every named filter against a transaction tree (parent first,
/// then children in order) and append matches to the per-filter groups.
fn collect_matches(txn: &Transaction, filters: &[NamedFilter], groups: &mut [FilterMatches]) {
    for (filter, group) in filters.iter().zip(groups.iter_mut()) {
        if filter.filter.matches(txn) {
            let record = match &filter.mapper {
                Some(mapper) => MatchedRecord::Mapped(mapper(txn)),
                None => MatchedRecord::Transaction(txn.clone()),
            };
            group.records.push(record);
        }
    }
    for inner in &txn.inner_txns {
        collect_matches(inner, filters, groups);
    }
}

// ─── Block path ───────────────────────────────────────────────────────────────

/// Backoff before the `attempt`-th retry (1-based) of a round fetch.
///
/// Doubles from the base up to the cap, with a per-round stagger so workers
/// in the same fan-out that fail together do not retry in lockstep.
fn round_retry_delay(round: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(8);
    let backoff = ROUND_RETRY_BASE
        .saturating_mul(1 << exponent)
        .min(ROUND_RETRY_CAP);
    backoff + Duration::from_millis(round % 250)
}

async fn fetch_block_with_retry(
    source: &dyn BlockSource,
    round: u64,
    ctx: &FetchContext<'_>,
) -> Result<RawBlock, SubscriberError> {
    let mut attempt = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return Err(SubscriberError::Cancelled("block fetch".into()));
        }
        match source.block(round).await {
            Ok(block) => return Ok(block),
            Err(e) if e.is_retryable() && attempt < ROUND_FETCH_RETRIES => {
                attempt += 1;
                let delay = round_retry_delay(round, attempt);
                tracing::warn!(round, attempt, error = %e, "block fetch failed, retrying");
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {
                        return Err(SubscriberError::Cancelled("block fetch".into()));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Fetch `[from, to]` from the block source with bounded parallelism, then
/// normalize, enrich, and filter in round order.
pub(crate) async fn run_block_plan(
    source: &dyn BlockSource,
    from: u64,
    to: u64,
    ctx: &FetchContext<'_>,
) -> Result<Vec<FilterMatches>, SubscriberError> {
    let mut blocks: Vec<RawBlock> = stream::iter(from..=to)
        .map(|round| fetch_block_with_retry(source, round, ctx))
        .buffer_unordered(ctx.config.fetch_concurrency)
        .try_collect()
        .await?;
    // The fan-out completes out of order.
    blocks.sort_by_key(|b| b.rnd);

    tracing::debug!(from, to, blocks = blocks.len(), "fetched block range");

    let mut groups = ctx.empty_groups();
    for block in &blocks {
        for mut txn in normalize_block(block) {
            enrich(&mut txn, ctx.compiled_events);
            collect_matches(&txn, &ctx.config.filters, &mut groups);
        }
    }
    Ok(groups)
}

// ─── History path ─────────────────────────────────────────────────────────────

/// Translate a filter into the coarsest pre-filter the history source
/// supports. The result is a necessary condition only — never stricter than
/// the filter itself; the full predicate pass runs afterwards.
pub(crate) fn prefilter_params(
    filter: &TransactionFilter,
    from: u64,
    to: u64,
) -> SearchParams {
    // Only one address can be pushed down; sender wins and receiver stays a
    // post-filter constraint.
    let (address, address_role) = match (&filter.sender, &filter.receiver) {
        (Some(sender), _) => (Some(sender.clone()), Some(AddressRole::Sender)),
        (None, Some(receiver)) => (Some(receiver.clone()), Some(AddressRole::Receiver)),
        (None, None) => (None, None),
    };
    SearchParams {
        min_round: Some(from),
        max_round: Some(to),
        address,
        address_role,
        tx_type: filter.tx_type.map(|t| t.as_wire_str().to_string()),
        asset_id: filter.asset_id,
        application_id: filter.app_id,
        note_prefix: filter.note_prefix.as_ref().map(|p| BASE64.encode(p)),
        currency_greater_than: filter.min_amount,
        currency_less_than: filter.max_amount,
        limit: Some(DEFAULT_SEARCH_LIMIT),
        next: None,
    }
}

/// For each named filter, paginate `[from, to]` through the history source
/// until the continuation token is exhausted, then post-filter.
pub(crate) async fn run_history_plan(
    source: &dyn HistorySource,
    from: u64,
    to: u64,
    ctx: &FetchContext<'_>,
) -> Result<Vec<FilterMatches>, SubscriberError> {
    let mut groups = ctx.empty_groups();
    for (index, filter) in ctx.config.filters.iter().enumerate() {
        let mut params = prefilter_params(&filter.filter, from, to);
        let mut position = 0u64;
        loop {
            if ctx.cancel.is_cancelled() {
                return Err(SubscriberError::Cancelled("history search".into()));
            }
            let page = source.search_transactions(&params).await?;
            tracing::debug!(
                filter = %filter.name,
                transactions = page.transactions.len(),
                has_next = page.next_token.is_some(),
                "history page"
            );
            for history_txn in &page.transactions {
                if let Some(mut txn) = from_history(history_txn, position) {
                    position += 1;
                    enrich(&mut txn, ctx.compiled_events);
                    collect_matches(&txn, &ctx.config.filters[index..=index], &mut groups[index..=index]);
                }
            }
            match page.next_token {
                Some(token) => params.next = Some(token),
                None => break,
            }
        }
    }
    Ok(groups)
}
