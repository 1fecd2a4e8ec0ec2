//! algosub-engine — the subscriber loop and its supporting machinery.
//!
//! # Architecture
//!
//! ```text
//! SubscriberBuilder → Subscriber
//!                         ├── planner   (watermark + tip + policy → Plan)
//!                         ├── fetcher   (parallel blocks / paginated history)
//!                         ├── normalize (algosub-source; raw → canonical)
//!                         ├── enrich    (balance deltas + decoded events)
//!                         ├── filter    (predicate engine, per named filter)
//!                         ├── Dispatcher (batch + transaction + lifecycle topics)
//!                         └── WatermarkStore (write-through persistence)
//! ```
//!
//! Delivery is at-least-once: a poll either advances and persists the
//! watermark or fails without touching it, so a crash replays at most one
//! poll's worth of rounds.

pub mod builder;
pub mod fetcher;
pub mod planner;
pub mod subscriber;

pub use builder::SubscriberBuilder;
pub use planner::{plan, Plan, PlanSource};
pub use subscriber::Subscriber;
