//! KVST - Custom Error Types
//! Defines the error hierarchy for the store and server.

use thiserror::Error;

/// Custom Result type for the store.
pub type Result<T> = std::result::Result<T, KvError>;

/// Error types for the key-value store.
#[derive(Error, Debug)]
pub enum KvError {
    /// I/O errors from file or socket operations (AOL, TCP).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request header failed validation (bad magic or malformed framing).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request header named a command outside {GET, SET, DELETE, PING},
    /// or supplied key/value lengths inconsistent with the command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// AOL recovery found a truncated or corrupted record.
    #[error("AOL recovery failed: {0}")]
    RecoveryFailed(String),

    /// Invalid configuration (e.g. non-power-of-two shard count).
    #[error("configuration error: {0}")]
    Config(String),
}
