//! Shared protocol types for Docket.
//!
//! Both peers speak newline-delimited JSON-RPC 2.0 over a child process's
//! stdin/stdout. This crate holds the JSON-RPC envelope types and the
//! MCP-level payloads (tools, resources, prompts) so the client and server
//! agree on one set of definitions.

pub mod jsonrpc;
pub mod mcp;

pub use jsonrpc::{
    ErrorCode, IncomingMessage, RequestId, RpcErrorData, RpcNotification, RpcRequest, RpcResponse,
    parse_message,
};
pub use mcp::{
    Content, GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, PeerInfo,
    PromptArgument, PromptDescriptor, PromptMessage, PromptsCapability, ReadResourceParams,
    ResourceContents, ResourceDescriptor, ResourcesCapability, ServerCapabilities, ToolCallParams,
    ToolCallResult, ToolDescriptor, ToolsCapability, PROTOCOL_VERSION,
};
