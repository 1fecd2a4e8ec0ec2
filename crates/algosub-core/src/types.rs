//! The canonical transaction model — the unit the engine produces, enriches,
//! and filters on.
//!
//! Every transaction pulled from either upstream source is normalized into
//! [`Transaction`] before any filter sees it. Opaque byte fields (notes,
//! leases, logs, application arguments, programs) are carried base64-encoded
//! exactly as the upstream APIs surface them.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

// ─── TxType ───────────────────────────────────────────────────────────────────

/// Transaction type, with the wire values preserved verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "pay")]
    Payment,
    #[serde(rename = "axfer")]
    AssetTransfer,
    #[serde(rename = "acfg")]
    AssetConfig,
    #[serde(rename = "appl")]
    AppCall,
    #[serde(rename = "keyreg")]
    KeyReg,
    #[serde(rename = "afrz")]
    AssetFreeze,
}

impl TxType {
    /// The wire string for this type (`"pay"`, `"axfer"`, …).
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Payment => "pay",
            Self::AssetTransfer => "axfer",
            Self::AssetConfig => "acfg",
            Self::AppCall => "appl",
            Self::KeyReg => "keyreg",
            Self::AssetFreeze => "afrz",
        }
    }

    /// Parse a wire string; returns `None` for unrecognized values.
    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "pay" => Some(Self::Payment),
            "axfer" => Some(Self::AssetTransfer),
            "acfg" => Some(Self::AssetConfig),
            "appl" => Some(Self::AppCall),
            "keyreg" => Some(Self::KeyReg),
            "afrz" => Some(Self::AssetFreeze),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

// ─── On-completion ────────────────────────────────────────────────────────────

/// Application call on-completion action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnComplete {
    #[default]
    #[serde(rename = "noop")]
    NoOp,
    #[serde(rename = "optin")]
    OptIn,
    #[serde(rename = "closeout")]
    CloseOut,
    #[serde(rename = "clear")]
    ClearState,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
}

impl OnComplete {
    /// Map the numeric `apan` wire code; out-of-range codes fall back to noop.
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::OptIn,
            2 => Self::CloseOut,
            3 => Self::ClearState,
            4 => Self::Update,
            5 => Self::Delete,
            _ => Self::NoOp,
        }
    }
}

// ─── Payload variants ─────────────────────────────────────────────────────────

/// Payment-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentFields {
    pub receiver: String,
    pub amount: u64,
    #[serde(rename = "close-remainder-to", skip_serializing_if = "Option::is_none")]
    pub close_remainder_to: Option<String>,
    #[serde(rename = "close-amount", skip_serializing_if = "Option::is_none")]
    pub close_amount: Option<u64>,
}

/// Asset transfer fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTransferFields {
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
    pub amount: u64,
    pub receiver: String,
    /// Clawback sender — the account debited instead of `sender` when set.
    #[serde(rename = "asset-sender", skip_serializing_if = "Option::is_none")]
    pub asset_sender: Option<String>,
    #[serde(rename = "close-to", skip_serializing_if = "Option::is_none")]
    pub close_to: Option<String>,
    #[serde(rename = "close-amount", skip_serializing_if = "Option::is_none")]
    pub close_amount: Option<u64>,
}

/// Asset parameters carried by a create/reconfigure transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetParams {
    pub total: u64,
    pub decimals: u32,
    #[serde(rename = "default-frozen")]
    pub default_frozen: bool,
    #[serde(rename = "unit-name", skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64-encoded 32-byte commitment.
    #[serde(rename = "metadata-hash", skip_serializing_if = "Option::is_none")]
    pub metadata_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserve: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clawback: Option<String>,
}

/// Asset create / reconfigure / destroy fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfigFields {
    /// Absent on creation; present on reconfigure and destroy.
    #[serde(rename = "asset-id", skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<u64>,
    /// Absent on destroy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<AssetParams>,
    /// Set by the ledger when this transaction created the asset.
    #[serde(rename = "created-asset-index", skip_serializing_if = "Option::is_none")]
    pub created_asset_index: Option<u64>,
}

/// Application state schema (number of value slots).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSchema {
    #[serde(rename = "num-uint")]
    pub num_uints: u64,
    #[serde(rename = "num-byte-slice")]
    pub num_byte_slices: u64,
}

/// Application call fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppCallFields {
    /// Zero when the call creates the application.
    #[serde(rename = "application-id")]
    pub app_id: u64,
    #[serde(rename = "on-completion")]
    pub on_complete: OnComplete,
    /// Base64-encoded argument blobs, in call order.
    #[serde(rename = "application-args")]
    pub app_args: Vec<String>,
    pub accounts: Vec<String>,
    #[serde(rename = "foreign-apps")]
    pub foreign_apps: Vec<u64>,
    #[serde(rename = "foreign-assets")]
    pub foreign_assets: Vec<u64>,
    #[serde(rename = "approval-program", skip_serializing_if = "Option::is_none")]
    pub approval_program: Option<String>,
    #[serde(rename = "clear-state-program", skip_serializing_if = "Option::is_none")]
    pub clear_state_program: Option<String>,
    #[serde(rename = "global-state-schema", skip_serializing_if = "Option::is_none")]
    pub global_schema: Option<StateSchema>,
    #[serde(rename = "local-state-schema", skip_serializing_if = "Option::is_none")]
    pub local_schema: Option<StateSchema>,
    #[serde(rename = "extra-program-pages", skip_serializing_if = "Option::is_none")]
    pub extra_pages: Option<u64>,
    /// Set by the ledger when this call created the application.
    #[serde(
        rename = "created-application-index",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_app_index: Option<u64>,
    /// Base64-encoded log blobs emitted by the program.
    pub logs: Vec<String>,
    #[serde(rename = "global-state-delta", skip_serializing_if = "Option::is_none")]
    pub global_state_delta: Option<serde_json::Value>,
    #[serde(rename = "local-state-delta", skip_serializing_if = "Option::is_none")]
    pub local_state_delta: Option<serde_json::Value>,
}

/// Key registration fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRegFields {
    #[serde(rename = "vote-participation-key", skip_serializing_if = "Option::is_none")]
    pub vote_key: Option<String>,
    #[serde(
        rename = "selection-participation-key",
        skip_serializing_if = "Option::is_none"
    )]
    pub selection_key: Option<String>,
    #[serde(rename = "vote-first-valid", skip_serializing_if = "Option::is_none")]
    pub vote_first: Option<u64>,
    #[serde(rename = "vote-last-valid", skip_serializing_if = "Option::is_none")]
    pub vote_last: Option<u64>,
    #[serde(rename = "vote-key-dilution", skip_serializing_if = "Option::is_none")]
    pub vote_key_dilution: Option<u64>,
    #[serde(rename = "non-participation")]
    pub non_participation: bool,
}

/// Asset freeze fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetFreezeFields {
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
    /// The account whose holding is being frozen or unfrozen.
    pub address: String,
    #[serde(rename = "new-freeze-status")]
    pub frozen: bool,
}

/// Type-qualified transaction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxPayload {
    #[serde(rename = "payment-transaction")]
    Payment(PaymentFields),
    #[serde(rename = "asset-transfer-transaction")]
    AssetTransfer(AssetTransferFields),
    #[serde(rename = "asset-config-transaction")]
    AssetConfig(AssetConfigFields),
    #[serde(rename = "application-transaction")]
    AppCall(AppCallFields),
    #[serde(rename = "keyreg-transaction")]
    KeyReg(KeyRegFields),
    #[serde(rename = "asset-freeze-transaction")]
    AssetFreeze(AssetFreezeFields),
}

// ─── Balance changes ──────────────────────────────────────────────────────────

/// Role an address plays in a balance movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BalanceChangeRole {
    Sender,
    Receiver,
    CloseTo,
    AssetCreator,
    AssetDestroyer,
}

/// A synthesized signed delta for one `(address, asset)` pair.
///
/// `asset_id == 0` denotes the native asset; for it, `amount` includes fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub address: String,
    #[serde(rename = "asset-id")]
    pub asset_id: u64,
    pub amount: i128,
    pub roles: Vec<BalanceChangeRole>,
}

// ─── ARC-28 events ────────────────────────────────────────────────────────────

/// A decoded application event, synthesized from a transaction's logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc28Event {
    #[serde(rename = "group-name")]
    pub group_name: String,
    #[serde(rename = "event-name")]
    pub event_name: String,
    /// The canonical signature the selector was derived from.
    pub signature: String,
    /// Decoded arguments keyed by declared name. Integers surface as JSON
    /// numbers; addresses and fixed byte blobs surface base64-encoded.
    pub args: std::collections::HashMap<String, serde_json::Value>,
}

// ─── Canonical transaction ────────────────────────────────────────────────────

/// The canonical per-transaction record.
///
/// Inner transactions are attached recursively and participate in filtering
/// and balance accounting exactly like top-level transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "tx-type")]
    pub tx_type: TxType,
    pub sender: String,
    #[serde(rename = "confirmed-round")]
    pub confirmed_round: u64,
    #[serde(rename = "round-time")]
    pub round_time: i64,
    pub fee: u64,
    #[serde(rename = "first-valid")]
    pub first_valid: u64,
    #[serde(rename = "last-valid")]
    pub last_valid: u64,
    #[serde(rename = "genesis-id", skip_serializing_if = "Option::is_none")]
    pub genesis_id: Option<String>,
    #[serde(rename = "genesis-hash", skip_serializing_if = "Option::is_none")]
    pub genesis_hash: Option<String>,
    /// Position within the round's flattened order: parents precede their
    /// children, children are numbered consecutively after the parent.
    #[serde(rename = "intra-round-offset")]
    pub intra_round_offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<String>,
    #[serde(rename = "rekey-to", skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<String>,
    /// Opaque note bytes, base64-encoded identically to upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub payload: TxPayload,
    #[serde(rename = "inner-txns", skip_serializing_if = "Vec::is_empty", default)]
    pub inner_txns: Vec<Transaction>,
    /// Synthesized; never received from upstream.
    #[serde(rename = "balance-changes", default)]
    pub balance_changes: Vec<BalanceChange>,
    /// Synthesized from `logs`.
    #[serde(rename = "arc28-events", default)]
    pub arc28_events: Vec<Arc28Event>,
}

impl Transaction {
    /// The amount moved by a payment or asset transfer; `None` otherwise.
    pub fn amount(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::Payment(p) => Some(p.amount),
            TxPayload::AssetTransfer(a) => Some(a.amount),
            _ => None,
        }
    }

    /// The receiving address of a payment or asset transfer.
    pub fn receiver(&self) -> Option<&str> {
        match &self.payload {
            TxPayload::Payment(p) => Some(p.receiver.as_str()),
            TxPayload::AssetTransfer(a) => Some(a.receiver.as_str()),
            _ => None,
        }
    }

    /// The application id an app call targets. For a create call (id zero)
    /// this falls through to the created application index.
    pub fn app_id(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::AppCall(a) if a.app_id != 0 => Some(a.app_id),
            TxPayload::AppCall(a) => a.created_app_index,
            _ => None,
        }
    }

    /// The asset id referenced by a transfer, config, or freeze; config
    /// creates fall through to the created asset index.
    pub fn asset_id(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::AssetTransfer(a) => Some(a.asset_id),
            TxPayload::AssetConfig(c) => c.asset_id.or(c.created_asset_index),
            TxPayload::AssetFreeze(f) => Some(f.asset_id),
            _ => None,
        }
    }

    pub fn created_app_index(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::AppCall(a) => a.created_app_index,
            _ => None,
        }
    }

    pub fn created_asset_index(&self) -> Option<u64> {
        match &self.payload {
            TxPayload::AssetConfig(c) => c.created_asset_index,
            _ => None,
        }
    }

    pub fn on_complete(&self) -> Option<OnComplete> {
        match &self.payload {
            TxPayload::AppCall(a) => Some(a.on_complete),
            _ => None,
        }
    }

    /// The application's log blobs, base64-encoded; empty for non-app calls.
    pub fn logs(&self) -> &[String] {
        match &self.payload {
            TxPayload::AppCall(a) => &a.logs,
            _ => &[],
        }
    }

    /// The first application argument, base64-decoded.
    pub fn first_app_arg(&self) -> Option<Vec<u8>> {
        match &self.payload {
            TxPayload::AppCall(a) => a.app_args.first().and_then(|s| BASE64.decode(s).ok()),
            _ => None,
        }
    }

    /// The raw note bytes, base64-decoded.
    pub fn note_bytes(&self) -> Option<Vec<u8>> {
        self.note.as_ref().and_then(|n| BASE64.decode(n).ok())
    }
}
