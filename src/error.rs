//! Error types for sqbot
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using QueryError
pub type Result<T> = std::result::Result<T, QueryError>;

/// Unified error type for sqbot operations
#[derive(Debug, Error)]
pub enum QueryError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Connection terminated")]
    Terminated,

    #[error("Timed out: {0}")]
    Timeout(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid request command: {0:?}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Application Errors
    // -------------------------------------------------------------------------
    /// The server answered with a non-zero error id
    #[error("Command '{command}' failed: id={id} msg={message}")]
    Command {
        command: String,
        id: u32,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
