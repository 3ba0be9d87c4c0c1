//! Error taxonomy for the arbitrage engine.
//! Mission: every caller can tell "retry", "drop", or "halt" apart at a glance.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::Venue;

/// Startup-fatal configuration problems. The process must not proceed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-message normalization failures. Recoverable: drop and count.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("not a tick-bearing message")]
    NotATick,
    #[error("sentinel no-data value in field {field}")]
    SentinelValue { field: &'static str },
    #[error("no symbol mapping for venue ticker {ticker}")]
    UnknownSymbol { ticker: String },
    #[error("malformed numeric field {field}: {raw}")]
    Malformed { field: &'static str, raw: String },
}

/// Transient transport failures. Recover via bounded backoff reconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{venue:?} connection lost: {reason}")]
    ConnectionLost { venue: Venue, reason: String },
    #[error("{venue:?} receive timed out")]
    ReceiveTimeout { venue: Venue },
    #[error("{venue:?} request failed: {source}")]
    Request {
        venue: Venue,
        #[source]
        source: anyhow::Error,
    },
}

/// The top-level domain error type threaded through gate/ledger/executor.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Rejected silently: not counted as a failure.
    #[error("insufficient capital on {venue:?}: need {needed}, have {available}")]
    InsufficientCapital {
        venue: Venue,
        needed: Decimal,
        available: Decimal,
    },

    /// A leg's submit call returned a non-fill terminal state.
    #[error("order submit failed on {venue:?}: {reason}")]
    OrderSubmit { venue: Venue, reason: String },

    /// Leg-B failed after leg-A filled and the hedge could not be confirmed.
    #[error("rollback on {venue:?} requires manual intervention: {detail}")]
    RollbackFailure { venue: Venue, detail: String },

    /// A broken invariant. Never continue trading on the affected symbol.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
