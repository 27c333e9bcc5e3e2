//! Unified error handling for Cluck.
//!
//! Only programming-contract violations (duplicate names, bad configuration)
//! surface as errors. Topology and protocol problems seen while routing are
//! logged and dropped so the router loop can never be torn down by a bad
//! message.

use thiserror::Error;

/// Main error type for Cluck operations
#[derive(Debug, Error)]
pub enum CluckError {
    /// A link with this name is already attached to the node
    #[error("link name '{0}' already in use")]
    LinkNameInUse(String),

    /// An alias with this name is already registered on the node
    #[error("alias '{0}' already in use")]
    AliasInUse(String),

    /// Configuration parsing or validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload did not decode as a Cluck message
    #[error("wire error: {0}")]
    Wire(#[from] crate::communication::wire::WireError),

    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type used throughout the crate
pub type CluckResult<T> = Result<T, CluckError>;
