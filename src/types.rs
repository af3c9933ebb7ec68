//! Shared error types
//!
//! One error enum for the whole gateway. Relay misses (unknown target peer)
//! are deliberately NOT errors — signaling is best-effort and a dropped
//! message is an expected outcome, not a failure.

use thiserror::Error;

/// Errors surfaced by switchboard services
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// The node registry is empty after discovery — selection cannot proceed
    #[error("no nodes available")]
    NoNodesAvailable,

    /// The on-chain consensus read rejected (or could not confirm) a selection
    #[error("consensus validation failed for {endpoint}")]
    ConsensusValidationFailed { endpoint: String },

    /// The failover controller ran out of attempts
    #[error("max failover attempts reached ({attempts})")]
    MaxFailoverAttemptsExceeded { attempts: u32 },

    /// A stream validation read failed (logged, mapped to `valid: false` at
    /// the HTTP boundary rather than thrown to the client)
    #[error("stream validation error: {0}")]
    StreamValidation(String),

    /// An on-chain directory read failed (transport, RPC error, or decode)
    #[error("directory error: {0}")]
    Directory(String),

    /// Invalid configuration detected at startup
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SwitchboardError>;
