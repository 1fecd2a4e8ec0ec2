//! Normalization — converts upstream-shaped data into the canonical model.
//!
//! Two upstream geometries feed this module: compact block-shaped data from
//! the block source ([`normalize_block`]) and long-form history records from
//! the history source ([`from_history`]). Both produce the same canonical
//! [`Transaction`], with inner transactions flattened recursively and
//! intra-round offsets assigned parent-first.

use sha2::{Digest, Sha512_256};

use algosub_core::types::{
    AppCallFields, AssetConfigFields, AssetFreezeFields, AssetParams, AssetTransferFields,
    KeyRegFields, OnComplete, PaymentFields, StateSchema, Transaction, TxPayload, TxType,
};

use crate::block::{RawAssetParams, RawBlock, RawSignedTxn, RawStateSchema};
use crate::indexer::HistoryTransaction;

/// Round-level metadata shared by every transaction in a block.
#[derive(Debug, Clone)]
pub struct BlockMetadata {
    pub round: u64,
    pub timestamp: i64,
    pub genesis_id: Option<String>,
    pub genesis_hash: Option<String>,
}

impl BlockMetadata {
    pub fn from_block(block: &RawBlock) -> Self {
        Self {
            round: block.rnd,
            timestamp: block.ts,
            genesis_id: block.gen.clone(),
            genesis_hash: block.gh.clone(),
        }
    }
}

/// Convert a raw block into its ordered top-level canonical transactions,
/// inner transactions attached. Transactions with an unrecognized type are
/// skipped with a diagnostic.
///
/// Normalizing the same block twice yields structurally equal results.
pub fn normalize_block(block: &RawBlock) -> Vec<Transaction> {
    let meta = BlockMetadata::from_block(block);
    block
        .txns
        .iter()
        .enumerate()
        .filter_map(|(i, stxn)| normalize_signed(stxn, &meta, i as u64))
        .collect()
}

fn normalize_signed(stxn: &RawSignedTxn, meta: &BlockMetadata, offset: u64) -> Option<Transaction> {
    let raw = &stxn.txn;
    let Some(tx_type) = TxType::from_wire_str(&raw.tx_type) else {
        tracing::warn!(round = meta.round, tx_type = %raw.tx_type, "skipping transaction of unknown type");
        return None;
    };

    let id = stxn
        .txid
        .clone()
        .unwrap_or_else(|| derive_txn_id(stxn, meta.round, offset));

    // Children are numbered consecutively after the parent.
    let inner_txns: Vec<Transaction> = stxn
        .dt
        .iter()
        .flat_map(|dt| dt.itx.iter())
        .enumerate()
        .filter_map(|(i, child)| normalize_signed(child, meta, offset + 1 + i as u64))
        .collect();

    Some(Transaction {
        id,
        tx_type,
        sender: raw.snd.clone(),
        confirmed_round: meta.round,
        round_time: meta.timestamp,
        fee: raw.fee,
        first_valid: raw.fv,
        last_valid: raw.lv,
        genesis_id: raw.gen.clone().or_else(|| meta.genesis_id.clone()),
        genesis_hash: raw.gh.clone().or_else(|| meta.genesis_hash.clone()),
        intra_round_offset: offset,
        group: raw.grp.clone(),
        lease: raw.lx.clone(),
        rekey_to: raw.rekey.clone(),
        note: raw.note.clone(),
        payload: payload_from_raw(stxn, tx_type),
        inner_txns,
        balance_changes: vec![],
        arc28_events: vec![],
    })
}

fn payload_from_raw(stxn: &RawSignedTxn, tx_type: TxType) -> TxPayload {
    let raw = &stxn.txn;
    match tx_type {
        TxType::Payment => TxPayload::Payment(PaymentFields {
            receiver: raw.rcv.clone().unwrap_or_default(),
            amount: raw.amt.unwrap_or(0),
            close_remainder_to: raw.close.clone(),
            close_amount: raw.camt,
        }),
        TxType::AssetTransfer => TxPayload::AssetTransfer(AssetTransferFields {
            asset_id: raw.xaid.unwrap_or(0),
            amount: raw.aamt.unwrap_or(0),
            receiver: raw.arcv.clone().unwrap_or_default(),
            asset_sender: raw.asnd.clone(),
            close_to: raw.aclose.clone(),
            close_amount: raw.aca,
        }),
        TxType::AssetConfig => TxPayload::AssetConfig(AssetConfigFields {
            asset_id: raw.caid,
            params: raw.apar.as_ref().map(asset_params_from_raw),
            // The created index lives at the signed-transaction level.
            created_asset_index: stxn.caid,
        }),
        TxType::AppCall => {
            let (logs, global_state_delta, local_state_delta) = match &stxn.dt {
                Some(dt) => (dt.lg.clone(), dt.gd.clone(), dt.ld.clone()),
                None => (vec![], None, None),
            };
            TxPayload::AppCall(AppCallFields {
                app_id: raw.apid.unwrap_or(0),
                on_complete: OnComplete::from_code(raw.apan.unwrap_or(0)),
                app_args: raw.apaa.clone(),
                accounts: raw.apat.clone(),
                foreign_apps: raw.apfa.clone(),
                foreign_assets: raw.apas.clone(),
                approval_program: raw.apap.clone(),
                clear_state_program: raw.apsu.clone(),
                global_schema: raw.apgs.map(schema_from_raw),
                local_schema: raw.apls.map(schema_from_raw),
                extra_pages: raw.apep,
                created_app_index: stxn.apid,
                logs,
                global_state_delta,
                local_state_delta,
            })
        }
        TxType::KeyReg => TxPayload::KeyReg(KeyRegFields {
            vote_key: raw.votekey.clone(),
            selection_key: raw.selkey.clone(),
            vote_first: raw.votefst,
            vote_last: raw.votelst,
            vote_key_dilution: raw.votekd,
            non_participation: raw.nonpart,
        }),
        TxType::AssetFreeze => TxPayload::AssetFreeze(AssetFreezeFields {
            asset_id: raw.faid.unwrap_or(0),
            address: raw.fadd.clone().unwrap_or_default(),
            frozen: raw.afrz,
        }),
    }
}

fn asset_params_from_raw(raw: &RawAssetParams) -> AssetParams {
    AssetParams {
        total: raw.t,
        decimals: raw.dc,
        default_frozen: raw.df,
        unit_name: raw.un.clone(),
        name: raw.an.clone(),
        url: raw.au.clone(),
        metadata_hash: raw.am.clone(),
        manager: raw.m.clone(),
        reserve: raw.r.clone(),
        freeze: raw.f.clone(),
        clawback: raw.c.clone(),
    }
}

fn schema_from_raw(raw: RawStateSchema) -> StateSchema {
    StateSchema {
        num_uints: raw.nui,
        num_byte_slices: raw.nbs,
    }
}

/// Deterministic id for a transaction the source did not name: `TX` plus the
/// first 26 uppercase-hex characters of the SHA-512/256 digest over the
/// round, the flattened position, and the stable JSON form of the body.
fn derive_txn_id(stxn: &RawSignedTxn, round: u64, offset: u64) -> String {
    let body = serde_json::to_string(&stxn.txn).unwrap_or_default();
    let digest = Sha512_256::digest(format!("{round}:{offset}:{body}").as_bytes());
    format!("TX{}", hex::encode_upper(&digest[..13]))
}

// ─── History path ─────────────────────────────────────────────────────────────

/// Convert a long-form history record into the canonical model.
///
/// `fallback_offset` is used when the record carries no intra-round offset
/// (the caller's position counter). Inner transactions inherit round
/// metadata from their parent and are numbered parent-first.
pub fn from_history(h: &HistoryTransaction, fallback_offset: u64) -> Option<Transaction> {
    let offset = h.intra_round_offset.unwrap_or(fallback_offset);
    from_history_at(h, None, offset)
}

fn from_history_at(
    h: &HistoryTransaction,
    parent: Option<&Transaction>,
    offset: u64,
) -> Option<Transaction> {
    let Some(tx_type) = TxType::from_wire_str(&h.tx_type) else {
        tracing::warn!(tx_type = %h.tx_type, "skipping history transaction of unknown type");
        return None;
    };

    let confirmed_round = h
        .confirmed_round
        .or(parent.map(|p| p.confirmed_round))
        .unwrap_or(0);
    let round_time = h.round_time.or(parent.map(|p| p.round_time)).unwrap_or(0);
    let genesis_id = h
        .genesis_id
        .clone()
        .or_else(|| parent.and_then(|p| p.genesis_id.clone()));
    let genesis_hash = h
        .genesis_hash
        .clone()
        .or_else(|| parent.and_then(|p| p.genesis_hash.clone()));

    let id = h
        .id
        .clone()
        .unwrap_or_else(|| derive_history_id(h, confirmed_round, offset));

    let mut txn = Transaction {
        id,
        tx_type,
        sender: h.sender.clone(),
        confirmed_round,
        round_time,
        fee: h.fee,
        first_valid: h.first_valid,
        last_valid: h.last_valid,
        genesis_id,
        genesis_hash,
        intra_round_offset: offset,
        group: h.group.clone(),
        lease: h.lease.clone(),
        rekey_to: h.rekey_to.clone(),
        note: h.note.clone(),
        payload: payload_from_history(h, tx_type),
        inner_txns: vec![],
        balance_changes: vec![],
        arc28_events: vec![],
    };

    if let Some(inner) = &h.inner_txns {
        txn.inner_txns = inner
            .iter()
            .enumerate()
            .filter_map(|(i, child)| from_history_at(child, Some(&txn), offset + 1 + i as u64))
            .collect();
    }
    Some(txn)
}

fn payload_from_history(h: &HistoryTransaction, tx_type: TxType) -> TxPayload {
    match tx_type {
        TxType::Payment => TxPayload::Payment(h.payment.clone().unwrap_or_default()),
        TxType::AssetTransfer => {
            TxPayload::AssetTransfer(h.asset_transfer.clone().unwrap_or_default())
        }
        TxType::AssetConfig => {
            let mut fields = h.asset_config.clone().unwrap_or_default();
            // The history source hoists the created index to the top level.
            fields.created_asset_index = fields.created_asset_index.or(h.created_asset_index);
            TxPayload::AssetConfig(fields)
        }
        TxType::AppCall => {
            let mut fields = h.app_call.clone().unwrap_or_default();
            fields.created_app_index = fields.created_app_index.or(h.created_app_index);
            if fields.logs.is_empty() {
                if let Some(logs) = &h.logs {
                    fields.logs = logs.clone();
                }
            }
            fields.global_state_delta = fields
                .global_state_delta
                .take()
                .or_else(|| h.global_state_delta.clone());
            fields.local_state_delta = fields
                .local_state_delta
                .take()
                .or_else(|| h.local_state_delta.clone());
            TxPayload::AppCall(fields)
        }
        TxType::KeyReg => TxPayload::KeyReg(h.keyreg.clone().unwrap_or_default()),
        TxType::AssetFreeze => TxPayload::AssetFreeze(h.asset_freeze.clone().unwrap_or_default()),
    }
}

fn derive_history_id(h: &HistoryTransaction, round: u64, offset: u64) -> String {
    // Hash a reduced form so nested inner transactions don't perturb the id.
    let body = serde_json::json!({
        "tx-type": h.tx_type,
        "sender": h.sender,
        "fee": h.fee,
        "first-valid": h.first_valid,
        "last-valid": h.last_valid,
        "note": h.note,
    });
    let digest = Sha512_256::digest(format!("{round}:{offset}:{body}").as_bytes());
    format!("TX{}", hex::encode_upper(&digest[..13]))
}
