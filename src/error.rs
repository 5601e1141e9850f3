//! RAPI error types.
//!
//! # Error Classification
//!
//! - **Negotiation errors**: invalid or incompatible property fusion and
//!   derivation. Always returned synchronously from the algebra call as
//!   [`RapiError::Property`], never resolved silently.
//! - **Connection-broken errors**: `write`/`read` on a connection that is not
//!   connected and has no buffered data left.
//! - **Asynchronous faults**: failures detected by a layer on another thread.
//!   These travel as [`Event::Error`](crate::event::Event::Error), never as a
//!   returned error.
//! - **Listener faults**: contained by the event dispatcher and only logged.
//!
//! The `Property` variant preserves the algebra error via `#[from]`, so
//! `anyhow` and friends can display the complete chain.

use thiserror::Error;

use crate::property::PropertyKind;

/// Requirement algebra errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// Operation was given a property of another kind.
    #[error("{expected} property expected, got {found}")]
    KindMismatch {
        /// Kind of the receiving property.
        expected: PropertyKind,
        /// Kind of the argument.
        found: PropertyKind,
    },

    /// The kind does not support fusing.
    #[error("Fuse not allowed for {0}")]
    FuseNotAllowed(PropertyKind),

    /// Fusing would produce an invalid interval.
    #[error("Fuse of {kind} leads to invalid values: {detail}")]
    InvalidFuse {
        /// Kind being fused.
        kind: PropertyKind,
        /// Human-readable explanation.
        detail: String,
    },

    /// Capability and requirement cannot be reconciled.
    #[error("Incompatible {kind}: {detail}")]
    Incompatible {
        /// Kind being negotiated.
        kind: PropertyKind,
        /// Human-readable explanation.
        detail: String,
    },

    /// A value lies outside the domain of its kind.
    #[error("{kind} value {value} is not in range [{lower}, {upper}]")]
    OutOfRange {
        /// Kind being constructed.
        kind: PropertyKind,
        /// Offending value.
        value: u32,
        /// Inclusive lower bound.
        lower: u32,
        /// Inclusive upper bound.
        upper: u32,
    },

    /// Interval with min above max.
    #[error("{kind} interval [{min}, {max}] has min above max")]
    InvertedInterval {
        /// Kind being constructed.
        kind: PropertyKind,
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },

    /// The kind is functional and takes no part in requirement algebra.
    #[error("{0} is not a negotiable property")]
    NotNegotiable(PropertyKind),
}

/// RAPI errors.
#[derive(Error, Debug)]
pub enum RapiError {
    /// Requirement algebra failed.
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// Connection is not connected and nothing is left to read.
    #[error("Connection is broken")]
    ConnectionBroken,

    /// Discrete read requested while the connection delivers via stream.
    #[error("Wrong read mode: {0}")]
    WrongReadMode(String),

    /// Failure reported by a layer or peer.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RAPI operations
pub type Result<T> = std::result::Result<T, RapiError>;

impl From<toml::de::Error> for RapiError {
    fn from(err: toml::de::Error) -> Self {
        RapiError::Config(format!("Failed to parse config: {err}"))
    }
}

impl From<RapiError> for std::io::Error {
    fn from(err: RapiError) -> Self {
        match err {
            RapiError::Io(io) => io,
            RapiError::ConnectionBroken => {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, err)
            },
            other => std::io::Error::other(other),
        }
    }
}
