//! Raw block-shaped data as produced by the block source.
//!
//! The node API uses compact, type-qualified field names (`snd`, `rcv`,
//! `xaid`, …); these structs mirror that wire shape verbatim so a block can
//! be deserialized without any intermediate mapping. The normalizer owns the
//! translation into the canonical long-form model.

use serde::{Deserialize, Serialize};

/// A raw block: round metadata plus the signed-transaction list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawBlock {
    /// Round.
    pub rnd: u64,
    /// Unix timestamp of the round.
    pub ts: i64,
    /// Genesis id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen: Option<String>,
    /// Genesis hash, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    /// Signed transactions in ledger order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub txns: Vec<RawSignedTxn>,
}

/// A signed transaction in a block, with its apply data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSignedTxn {
    pub txn: RawTxn,
    /// Some sources precompute the transaction id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Application index created by this transaction (signed-txn level).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apid: Option<u64>,
    /// Asset index created by this transaction (signed-txn level).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caid: Option<u64>,
    /// Apply data: inner transactions, logs, state deltas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dt: Option<RawApplyData>,
}

/// Per-transaction apply data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawApplyData {
    /// Inner transactions, in execution order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub itx: Vec<RawSignedTxn>,
    /// Application logs, base64-encoded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lg: Vec<String>,
    /// Global state delta.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gd: Option<serde_json::Value>,
    /// Local state delta.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ld: Option<serde_json::Value>,
}

/// The transaction body with compact wire field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTxn {
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Sender address.
    pub snd: String,
    pub fee: u64,
    /// First valid round.
    pub fv: u64,
    /// Last valid round.
    pub lv: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gh: Option<String>,
    /// Group id, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grp: Option<String>,
    /// Lease, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lx: Option<String>,
    /// Note, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Rekey-to address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rekey: Option<String>,

    // Payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rcv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amt: Option<u64>,
    /// Close-remainder-to address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
    /// Close amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camt: Option<u64>,

    // Asset transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aamt: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arcv: Option<String>,
    /// Clawback source address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asnd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aclose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aca: Option<u64>,

    // Asset config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apar: Option<RawAssetParams>,

    // Application call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apid: Option<u64>,
    /// On-completion code; absent means noop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apan: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apaa: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apat: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apfa: Vec<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apas: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apsu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apgs: Option<RawStateSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apls: Option<RawStateSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apep: Option<u64>,

    // Key registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votekey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votefst: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votelst: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votekd: Option<u64>,
    pub nonpart: bool,

    // Asset freeze.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fadd: Option<String>,
    pub afrz: bool,
}

/// Compact asset parameters (`apar`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAssetParams {
    /// Total supply.
    pub t: u64,
    /// Decimals.
    pub dc: u32,
    /// Default frozen.
    pub df: bool,
    /// Unit name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub un: Option<String>,
    /// Asset name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub an: Option<String>,
    /// URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub au: Option<String>,
    /// Metadata hash, base64-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub am: Option<String>,
    /// Manager address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<String>,
    /// Reserve address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    /// Freeze address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
    /// Clawback address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
}

/// Compact state schema (`apgs` / `apls`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawStateSchema {
    /// Number of uint slots.
    pub nui: u64,
    /// Number of byte-slice slots.
    pub nbs: u64,
}
