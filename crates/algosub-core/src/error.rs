//! Error types for the subscription pipeline.

use thiserror::Error;

/// Errors produced by the injected block and history sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connection refused, timeout, DNS, etc.).
    #[error("network error: {0}")]
    Network(String),

    /// The upstream returned a non-2xx HTTP response.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// A round was requested that the source cannot serve (zero or 404).
    #[error("invalid round: {0}")]
    InvalidRound(u64),
}

impl SourceError {
    /// Returns `true` if the error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidRound(_) => false,
        }
    }
}

/// Errors that can occur while decoding an application log into an event.
///
/// These never halt processing — the affected log is skipped with a
/// diagnostic and produces no event entry.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("log is not valid base64: {0}")]
    InvalidBase64(String),

    /// An argument decoder ran past the end of the log payload.
    #[error("event '{event}': argument '{arg}' runs past end of data")]
    UnexpectedEnd { event: String, arg: String },
}

/// Errors surfaced by the subscriber itself.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("watermark store error: {0}")]
    Store(String),

    /// Only raised in `fail` sync mode: the tip has moved further ahead of
    /// the watermark than `max_rounds_to_sync` allows.
    #[error("behind tip: watermark {watermark}, tip {tip}, limit {max_rounds_to_sync}")]
    BehindTip {
        watermark: u64,
        tip: u64,
        max_rounds_to_sync: u64,
    },

    /// `start` was called while the subscriber was already running.
    #[error("subscriber is already running")]
    AlreadyRunning,

    /// The poll was interrupted by the stop signal before completing.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A registered handler returned a failure.
    #[error("handler error on '{topic}': {reason}")]
    Handler { topic: String, reason: String },

    #[error("{0}")]
    Other(String),
}
