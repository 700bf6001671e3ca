//! Server side of the Docket peer pair.
//!
//! An in-memory document store exposed over stdio as an MCP server:
//! newline-delimited JSON-RPC 2.0 on stdin/stdout, logs on stderr. Tools
//! mutate the store, resources expose it read-only, and one prompt renders
//! a formatting instruction for an external model.

pub mod error;
pub mod registry;
pub mod server;
pub mod store;
pub mod tools;
pub mod transport;

pub use error::{StoreError, ToolError};
pub use registry::ToolRegistry;
pub use server::DocServer;
pub use store::DocumentStore;
