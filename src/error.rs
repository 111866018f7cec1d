//! Error types for Mimic

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Mimic operations
pub type Result<T> = std::result::Result<T, MimicError>;

/// Errors that can occur in Mimic
#[derive(Debug, Error)]
pub enum MimicError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Index file exists but cannot be parsed
    #[error("Invalid request index {}: {source}", path.display())]
    InvalidIndex {
        /// Path of the offending index file
        path: PathBuf,
        /// Parser error
        source: serde_json::Error,
    },

    /// Tried to record a request that has no response attached
    #[error("Could not record the {method} request to {uri} because the request has not been executed")]
    NotExecuted {
        /// Request method
        method: String,
        /// Request URI
        uri: String,
    },

    /// A stored definition matched but updating is turned off
    #[error("Mimic updating is disabled - could not update entry {position} in {}", path.display())]
    UpdatingDisabled {
        /// Position of the matched definition
        position: usize,
        /// Directory holding the index file
        path: PathBuf,
    },

    /// No definition matched and recording is turned off
    #[error("Mimic recording is not enabled, so the {method} request to {uri} was not executed")]
    RecordingDisabled {
        /// Request method
        method: String,
        /// Request URI
        uri: String,
    },

    /// Request history lookup outside the logged range
    #[error("Request {index} is out of range: {len} requests logged")]
    OutOfRange {
        /// Requested position
        index: usize,
        /// Current history length
        len: usize,
    },

    /// Configuration passed to an already existing shared instance
    #[error("Cannot pass configuration to an existing Mimic instance")]
    AlreadyInitialised,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request URI cannot be mapped to a storage path
    #[error("Invalid request URI: {0}")]
    InvalidUri(String),

    /// Invalid scenario name
    #[error("Invalid scenario name: {0}")]
    InvalidScenario(String),

    /// The external executor failed to run a request
    #[error("External request failed: {0}")]
    Executor(String),
}
