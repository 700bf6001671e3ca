//! Error types for client operations.

use thiserror::Error;

/// Errors from launching and talking to a document server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server executable could not be started.
    #[error("Failed to launch server '{name}': {source}")]
    Launch {
        name: String,
        source: std::io::Error,
    },

    /// The server never completed the handshake, or greeted us with
    /// something malformed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// An operation was attempted before `connect` or after `cleanup`.
    #[error("Client is not connected")]
    NotConnected,

    /// A lifecycle transition that the state machine forbids.
    #[error("Invalid client state: {0}")]
    IllegalState(&'static str),

    /// The session was closed and can issue no further requests.
    #[error("Session is closed")]
    Closed,

    /// The server has no tool with this name.
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// The tool handler itself failed; carries the server's message.
    #[error("Tool '{name}' failed: {message}")]
    ToolFailed { name: String, message: String },

    /// A JSON-RPC error response that maps to nothing more specific.
    #[error("Server error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// A well-formed transport stream carrying a nonsensical message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response arrived in time.
    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The underlying stream closed or errored mid-call.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
