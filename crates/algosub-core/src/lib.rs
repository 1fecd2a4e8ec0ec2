//! algosub-core — data model, filters, enrichment, and event bus for the
//! algosub subscription engine.
//!
//! # Architecture
//!
//! ```text
//! Subscriber (algosub-engine)
//!     ├── TransactionFilter / NamedFilter   (predicate engine)
//!     ├── compute_balance_changes           (per-address deltas, inner txns included)
//!     ├── CompiledEventGroups               (selector-indexed ARC-28 log decoding)
//!     ├── Dispatcher                        (named async event bus)
//!     └── WatermarkStore                    (crash-recoverable position)
//! ```

pub mod arc28;
pub mod balance;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod poll;
pub mod types;
pub mod watermark;

pub use arc28::{selector, Arc28ArgType, Arc28EventArg, Arc28EventGroup, Arc28EventSpec, CompiledEventGroups};
pub use balance::compute_balance_changes;
pub use config::{SubscriberConfig, SyncBehaviour};
pub use dispatcher::{BusEvent, BusHandler, Dispatcher, ErrorEvent};
pub use error::{DecodeError, SourceError, SubscriberError};
pub use filter::{Arc28EventFilter, BalanceChangeFilter, NamedFilter, TransactionFilter};
pub use poll::{FilterMatches, MatchedRecord, PollResult};
pub use types::{
    Arc28Event, BalanceChange, BalanceChangeRole, OnComplete, Transaction, TxPayload, TxType,
};
pub use watermark::{MemoryWatermarkStore, WatermarkStore};
