//! Error types for the document store and tool dispatch.

use thiserror::Error;

/// Errors from document store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document {id} not found.")]
    NotFound { id: String },
}

/// Errors from tool dispatch and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    Unknown { name: String },

    #[error("Invalid input for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
