//! Compound transaction filters and the predicate engine.
//!
//! A [`TransactionFilter`] is a conjunction of independently optional
//! constraints; one with no constraints matches every transaction. Filters
//! are evaluated against fully enriched canonical transactions, so the
//! balance-change and event constraints see synthesized data.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arc28::selector;
use crate::types::{
    BalanceChange, BalanceChangeRole, OnComplete, Transaction, TxType,
};

/// User-supplied final predicate, invoked after every built-in constraint.
pub type CustomFilter = Arc<dyn Fn(&Transaction) -> bool + Send + Sync>;

/// User-supplied projection applied to each matched transaction before
/// dispatch. The output is opaque to the engine.
pub type Mapper = Arc<dyn Fn(&Transaction) -> serde_json::Value + Send + Sync>;

/// Constraint over a transaction's synthesized balance changes.
///
/// Matches when at least one balance-change record satisfies all present
/// constraints.
#[derive(Debug, Clone, Default)]
pub struct BalanceChangeFilter {
    pub address: Option<String>,
    pub asset_id: Option<u64>,
    pub min_amount: Option<i128>,
    pub max_amount: Option<i128>,
    /// Empty means any role; otherwise the record's role set must intersect.
    pub roles: Vec<BalanceChangeRole>,
}

impl BalanceChangeFilter {
    fn matches(&self, change: &BalanceChange) -> bool {
        if let Some(address) = &self.address {
            if change.address != *address {
                return false;
            }
        }
        if let Some(asset_id) = self.asset_id {
            if change.asset_id != asset_id {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if change.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if change.amount > max {
                return false;
            }
        }
        if !self.roles.is_empty() && !self.roles.iter().any(|r| change.roles.contains(r)) {
            return false;
        }
        true
    }
}

/// Constraint over a transaction's decoded application events.
#[derive(Debug, Clone, Default)]
pub struct Arc28EventFilter {
    pub group_name: Option<String>,
    pub event_name: Option<String>,
    /// Each entry requires the decoded argument of that name to equal the
    /// given value.
    pub args: HashMap<String, serde_json::Value>,
}

impl Arc28EventFilter {
    fn matches(&self, event: &crate::types::Arc28Event) -> bool {
        if let Some(group) = &self.group_name {
            if event.group_name != *group {
                return false;
            }
        }
        if let Some(name) = &self.event_name {
            if event.event_name != *name {
                return false;
            }
        }
        self.args
            .iter()
            .all(|(name, required)| event.args.get(name) == Some(required))
    }
}

/// A compound predicate over canonical transactions.
#[derive(Clone, Default)]
pub struct TransactionFilter {
    pub tx_type: Option<TxType>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    /// Byte prefix test against the raw (decoded) note.
    pub note_prefix: Option<Vec<u8>>,
    pub app_id: Option<u64>,
    pub asset_id: Option<u64>,
    pub min_amount: Option<u64>,
    pub max_amount: Option<u64>,
    /// Whether the transaction must (or must not) have created an application.
    pub app_create: Option<bool>,
    /// Whether the transaction must (or must not) have created an asset.
    pub asset_create: Option<bool>,
    pub app_on_complete: Option<OnComplete>,
    /// Matches when the first application argument's leading 4 bytes equal
    /// the selector derived from this signature.
    pub method_signature: Option<String>,
    pub balance_changes: Vec<BalanceChangeFilter>,
    pub arc28_events: Vec<Arc28EventFilter>,
    pub custom_filter: Option<CustomFilter>,
}

impl std::fmt::Debug for TransactionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionFilter")
            .field("tx_type", &self.tx_type)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("note_prefix", &self.note_prefix)
            .field("app_id", &self.app_id)
            .field("asset_id", &self.asset_id)
            .field("min_amount", &self.min_amount)
            .field("max_amount", &self.max_amount)
            .field("app_create", &self.app_create)
            .field("asset_create", &self.asset_create)
            .field("app_on_complete", &self.app_on_complete)
            .field("method_signature", &self.method_signature)
            .field("balance_changes", &self.balance_changes)
            .field("arc28_events", &self.arc28_events)
            .field("custom_filter", &self.custom_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the filter. Constraints are checked in a fixed order and
    /// short-circuit on the first failure; a field the transaction does not
    /// carry simply fails the corresponding constraint.
    pub fn matches(&self, txn: &Transaction) -> bool {
        if let Some(ty) = self.tx_type {
            if txn.tx_type != ty {
                return false;
            }
        }
        if let Some(sender) = &self.sender {
            if txn.sender != *sender {
                return false;
            }
        }
        if let Some(receiver) = &self.receiver {
            if txn.receiver() != Some(receiver.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.note_prefix {
            match txn.note_bytes() {
                Some(note) if note.starts_with(prefix) => {}
                _ => return false,
            }
        }
        if let Some(app_id) = self.app_id {
            if txn.app_id() != Some(app_id) {
                return false;
            }
        }
        if let Some(asset_id) = self.asset_id {
            if txn.asset_id() != Some(asset_id) {
                return false;
            }
        }
        if self.min_amount.is_some() || self.max_amount.is_some() {
            let Some(amount) = txn.amount() else {
                return false;
            };
            if let Some(min) = self.min_amount {
                if amount < min {
                    return false;
                }
            }
            if let Some(max) = self.max_amount {
                if amount > max {
                    return false;
                }
            }
        }
        if let Some(expected) = self.app_create {
            if txn.created_app_index().is_some() != expected {
                return false;
            }
        }
        if let Some(expected) = self.asset_create {
            if txn.created_asset_index().is_some() != expected {
                return false;
            }
        }
        if let Some(oc) = self.app_on_complete {
            if txn.on_complete() != Some(oc) {
                return false;
            }
        }
        if let Some(signature) = &self.method_signature {
            let sel = selector(signature);
            match txn.first_app_arg() {
                Some(arg) if arg.len() >= 4 && arg[..4] == sel => {}
                _ => return false,
            }
        }
        if !self.balance_changes.is_empty() {
            let any = self.balance_changes.iter().any(|f| {
                txn.balance_changes.iter().any(|c| f.matches(c))
            });
            if !any {
                return false;
            }
        }
        if !self.arc28_events.is_empty() {
            let any = self.arc28_events.iter().any(|f| {
                txn.arc28_events.iter().any(|e| f.matches(e))
            });
            if !any {
                return false;
            }
        }
        if let Some(custom) = &self.custom_filter {
            if !custom(txn) {
                return false;
            }
        }
        true
    }
}

/// A labelled filter; the name is the routing key on the event bus.
#[derive(Clone)]
pub struct NamedFilter {
    pub name: String,
    pub filter: TransactionFilter,
    pub mapper: Option<Mapper>,
}

impl std::fmt::Debug for NamedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedFilter")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("mapper", &self.mapper.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl NamedFilter {
    pub fn new(name: impl Into<String>, filter: TransactionFilter) -> Self {
        Self {
            name: name.into(),
            filter,
            mapper: None,
        }
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = Some(mapper);
        self
    }
}
