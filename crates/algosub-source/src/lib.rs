//! algosub-source — upstream source traits, raw wire models, and
//! normalization into the canonical transaction shape.
//!
//! Two heterogeneous upstreams feed the engine:
//!
//! - the **block source** ([`BlockSource`]) — block-oriented, compact wire
//!   field names, used for recent rounds and tip following;
//! - the **history source** ([`HistorySource`]) — query-oriented and
//!   paginated, long-form field names, used for deep catch-up.
//!
//! [`normalize_block`] and [`from_history`] reconcile both shapes into
//! [`algosub_core::types::Transaction`].

pub mod algod;
pub mod block;
pub mod indexer;
pub mod normalize;

pub use algod::{BlockSource, NodeStatus};
pub use block::{RawApplyData, RawAssetParams, RawBlock, RawSignedTxn, RawStateSchema, RawTxn};
pub use indexer::{
    AddressRole, HistorySource, HistoryTransaction, SearchParams, TransactionPage,
    DEFAULT_SEARCH_LIMIT,
};
pub use normalize::{from_history, normalize_block, BlockMetadata};
