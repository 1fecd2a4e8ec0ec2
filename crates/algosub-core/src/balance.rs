//! Balance-delta synthesis.
//!
//! Derives the per-`(address, asset)` signed deltas a transaction causes,
//! including its entire inner-transaction subtree. For the native asset
//! (id 0) the deltas include fees, so the per-asset sum over all entries
//! equals the net ledger movement of the whole tree.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{BalanceChange, BalanceChangeRole, Transaction, TxPayload};

type Accumulator = BTreeMap<(String, u64), (i128, BTreeSet<BalanceChangeRole>)>;

/// Compute the coalesced balance changes for `txn` and its inner subtree.
///
/// Entries are keyed by `(address, asset_id)` — repeated movements against
/// the same pair are summed and their role sets unioned. Zero-amount entries
/// survive only when they carry the `AssetDestroyer` role. Output order is
/// sorted by `(address, asset_id)` so repeated computation is stable.
pub fn compute_balance_changes(txn: &Transaction) -> Vec<BalanceChange> {
    let mut acc = Accumulator::new();
    accumulate(txn, &mut acc);

    acc.into_iter()
        .filter(|(_, (amount, roles))| {
            *amount != 0 || roles.contains(&BalanceChangeRole::AssetDestroyer)
        })
        .map(|((address, asset_id), (amount, roles))| BalanceChange {
            address,
            asset_id,
            amount,
            roles: roles.into_iter().collect(),
        })
        .collect()
}

fn add(
    acc: &mut Accumulator,
    address: &str,
    asset_id: u64,
    amount: i128,
    role: BalanceChangeRole,
) {
    let entry = acc
        .entry((address.to_string(), asset_id))
        .or_insert_with(|| (0, BTreeSet::new()));
    entry.0 += amount;
    entry.1.insert(role);
}

fn accumulate(txn: &Transaction, acc: &mut Accumulator) {
    // The fee is always debited from the sender on the native asset.
    add(
        acc,
        &txn.sender,
        0,
        -(txn.fee as i128),
        BalanceChangeRole::Sender,
    );

    match &txn.payload {
        TxPayload::Payment(p) => {
            add(
                acc,
                &txn.sender,
                0,
                -(p.amount as i128),
                BalanceChangeRole::Sender,
            );
            add(
                acc,
                &p.receiver,
                0,
                p.amount as i128,
                BalanceChangeRole::Receiver,
            );
            if let (Some(close_to), Some(close_amount)) =
                (&p.close_remainder_to, p.close_amount)
            {
                if close_amount > 0 {
                    add(
                        acc,
                        &txn.sender,
                        0,
                        -(close_amount as i128),
                        BalanceChangeRole::Sender,
                    );
                    add(
                        acc,
                        close_to,
                        0,
                        close_amount as i128,
                        BalanceChangeRole::CloseTo,
                    );
                }
            }
        }
        TxPayload::AssetTransfer(a) => {
            // Clawback transfers debit the asset sender, not the signer.
            let actual_sender = a.asset_sender.as_deref().unwrap_or(&txn.sender);
            add(
                acc,
                actual_sender,
                a.asset_id,
                -(a.amount as i128),
                BalanceChangeRole::Sender,
            );
            add(
                acc,
                &a.receiver,
                a.asset_id,
                a.amount as i128,
                BalanceChangeRole::Receiver,
            );
            if let (Some(close_to), Some(close_amount)) = (&a.close_to, a.close_amount) {
                if close_amount > 0 {
                    add(
                        acc,
                        actual_sender,
                        a.asset_id,
                        -(close_amount as i128),
                        BalanceChangeRole::Sender,
                    );
                    add(
                        acc,
                        close_to,
                        a.asset_id,
                        close_amount as i128,
                        BalanceChangeRole::CloseTo,
                    );
                }
            }
        }
        TxPayload::AssetConfig(c) => {
            if let (Some(created), Some(params)) = (c.created_asset_index, &c.params) {
                // Creation mints the full supply to the creator.
                add(
                    acc,
                    &txn.sender,
                    created,
                    params.total as i128,
                    BalanceChangeRole::AssetCreator,
                );
            } else if let (Some(asset_id), None) = (c.asset_id, c.params.as_ref()) {
                // Destroy: zero-amount marker entry.
                add(acc, &txn.sender, asset_id, 0, BalanceChangeRole::AssetDestroyer);
            }
        }
        // App calls, key registrations, and freezes move no balances of
        // their own; only their fee entry applies.
        TxPayload::AppCall(_) | TxPayload::KeyReg(_) | TxPayload::AssetFreeze(_) => {}
    }

    for inner in &txn.inner_txns {
        accumulate(inner, acc);
    }
}
