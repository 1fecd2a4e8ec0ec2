//! Watermark persistence — the subscription's crash-recoverable position.
//!
//! The watermark is the largest round fully processed and durably recorded.
//! On restart the subscriber resumes from the persisted value rather than
//! re-processing from scratch. The store determines its own persistence
//! format; only the two methods below are required.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SubscriberError;

/// Trait for persisting the watermark.
///
/// Both methods are expected to be idempotent. A `save` failure is surfaced
/// on the error topic and blocks the in-memory watermark from advancing.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load the current watermark; a store with no prior value returns 0.
    async fn load(&self) -> Result<u64, SubscriberError>;

    /// Persist a new watermark.
    async fn save(&self, watermark: u64) -> Result<(), SubscriberError>;
}

/// In-memory watermark store for tests and ephemeral subscriptions.
///
/// All state is lost when the process exits.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    value: Mutex<u64>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a specific round (e.g. to skip known history).
    pub fn starting_at(watermark: u64) -> Self {
        Self {
            value: Mutex::new(watermark),
        }
    }

    /// The currently stored value, without going through the async trait.
    pub fn current(&self) -> u64 {
        *self.value.lock().unwrap()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn load(&self) -> Result<u64, SubscriberError> {
        Ok(*self.value.lock().unwrap())
    }

    async fn save(&self, watermark: u64) -> Result<(), SubscriberError> {
        *self.value.lock().unwrap() = watermark;
        Ok(())
    }
}
