//! The history source — the query-oriented injected interface.
//!
//! Unlike the block source, the history source is paginated and takes coarse
//! pre-filter hints. It returns transactions in a long-form shape with
//! kebab-case field names and creation indices / logs hoisted to the top
//! level — a different geometry from blocks, reconciled by the normalizer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use algosub_core::error::SourceError;
use algosub_core::types::{
    AppCallFields, AssetConfigFields, AssetFreezeFields, AssetTransferFields, KeyRegFields,
    PaymentFields,
};

/// Default and maximum page size for `search_transactions`.
pub const DEFAULT_SEARCH_LIMIT: u64 = 1000;

/// The role an address plays when used as a search pre-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressRole {
    #[serde(rename = "sender")]
    Sender,
    #[serde(rename = "receiver")]
    Receiver,
    #[serde(rename = "freeze-target")]
    FreezeTarget,
}

/// Query parameters for a history search. Every field is optional; absent
/// fields place no constraint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchParams {
    #[serde(rename = "min-round", skip_serializing_if = "Option::is_none")]
    pub min_round: Option<u64>,
    #[serde(rename = "max-round", skip_serializing_if = "Option::is_none")]
    pub max_round: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "address-role", skip_serializing_if = "Option::is_none")]
    pub address_role: Option<AddressRole>,
    /// Transaction type, as a wire string (`"pay"`, `"axfer"`, …).
    #[serde(rename = "tx-type", skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<String>,
    #[serde(rename = "asset-id", skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
    #[serde(rename = "application-id", skip_serializing_if = "Option::is_none")]
    pub application_id: Option<u64>,
    /// Base64-encoded note prefix.
    #[serde(rename = "note-prefix", skip_serializing_if = "Option::is_none")]
    pub note_prefix: Option<String>,
    #[serde(
        rename = "currency-greater-than",
        skip_serializing_if = "Option::is_none"
    )]
    pub currency_greater_than: Option<u64>,
    #[serde(rename = "currency-less-than", skip_serializing_if = "Option::is_none")]
    pub currency_less_than: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Continuation token from the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionPage {
    #[serde(rename = "current-round")]
    pub current_round: u64,
    pub transactions: Vec<HistoryTransaction>,
    #[serde(rename = "next-token")]
    pub next_token: Option<String>,
}

/// A historical transaction in the history source's long-form shape.
///
/// Creation indices, logs, and state deltas sit at the top level rather than
/// inside the type-qualified payload, and inner transactions may omit round
/// metadata (it is inherited from the parent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "tx-type")]
    pub tx_type: String,
    pub sender: String,
    pub fee: u64,
    #[serde(rename = "confirmed-round", skip_serializing_if = "Option::is_none")]
    pub confirmed_round: Option<u64>,
    #[serde(rename = "round-time", skip_serializing_if = "Option::is_none")]
    pub round_time: Option<i64>,
    #[serde(rename = "first-valid")]
    pub first_valid: u64,
    #[serde(rename = "last-valid")]
    pub last_valid: u64,
    #[serde(rename = "genesis-id", skip_serializing_if = "Option::is_none")]
    pub genesis_id: Option<String>,
    #[serde(rename = "genesis-hash", skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<String>,
    #[serde(rename = "intra-round-offset", skip_serializing_if = "Option::is_none")]
    pub intra_round_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(rename = "rekey-to", skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<String>,

    #[serde(rename = "payment-transaction", skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentFields>,
    #[serde(
        rename = "asset-transfer-transaction",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_transfer: Option<AssetTransferFields>,
    #[serde(
        rename = "asset-config-transaction",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_config: Option<AssetConfigFields>,
    #[serde(
        rename = "application-transaction",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_call: Option<AppCallFields>,
    #[serde(rename = "keyreg-transaction", skip_serializing_if = "Option::is_none")]
    pub keyreg: Option<KeyRegFields>,
    #[serde(
        rename = "asset-freeze-transaction",
        skip_serializing_if = "Option::is_none"
    )]
    pub asset_freeze: Option<AssetFreezeFields>,

    #[serde(
        rename = "created-application-index",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_app_index: Option<u64>,
    #[serde(rename = "created-asset-index", skip_serializing_if = "Option::is_none")]
    pub created_asset_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
    #[serde(rename = "global-state-delta", skip_serializing_if = "Option::is_none")]
    pub global_state_delta: Option<serde_json::Value>,
    #[serde(rename = "local-state-delta", skip_serializing_if = "Option::is_none")]
    pub local_state_delta: Option<serde_json::Value>,
    #[serde(rename = "inner-txns", skip_serializing_if = "Option::is_none")]
    pub inner_txns: Option<Vec<HistoryTransaction>>,
}

/// Injected interface over a historical transaction index.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Paginated search; follow `next_token` until it comes back `None`.
    async fn search_transactions(
        &self,
        params: &SearchParams,
    ) -> Result<TransactionPage, SourceError>;
}
