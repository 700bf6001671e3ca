//! Client side of the Docket peer pair.
//!
//! A document server is spawned as a child process and spoken to over its
//! stdin/stdout with newline-delimited JSON-RPC 2.0 messages. The layers,
//! bottom up: [`StdioTransport`] owns the child process and the byte
//! streams, [`Session`] owns one transport after a successful handshake,
//! and [`DocketClient`] owns at most one session and enforces the
//! connect/cleanup lifecycle.

pub mod client;
pub mod config;
pub mod error;
pub mod session;
mod transport;

pub use client::DocketClient;
pub use config::ServerConfig;
pub use error::ClientError;
pub use session::Session;
pub use transport::StdioTransport;
