//! Session — one initialized conversation with a document server.
//!
//! A `Session` can only be obtained through a successful handshake, so no
//! operation can ever be issued on an un-initialized transport. After
//! [`Session::close`] every operation fails with [`ClientError::Closed`].

use crate::error::ClientError;
use crate::transport::StdioTransport;
use docket_proto::jsonrpc::ErrorCode;
use docket_proto::{
    Content, GetPromptResult, InitializeResult, PeerInfo, PromptDescriptor, ResourceContents,
    ResourceDescriptor, RpcResponse, ServerCapabilities, ToolCallResult, ToolDescriptor,
    PROTOCOL_VERSION,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

#[derive(Deserialize)]
struct ResourcesListResult {
    #[serde(default)]
    resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceResult {
    contents: Vec<ResourceContents>,
}

#[derive(Debug, Deserialize)]
struct PromptsListResult {
    #[serde(default)]
    prompts: Vec<PromptDescriptor>,
}

/// An initialized session over one exclusively-owned transport.
pub struct Session {
    transport: Option<StdioTransport>,
    server_info: PeerInfo,
    capabilities: ServerCapabilities,
}

impl Session {
    /// Perform the handshake over a freshly spawned transport.
    ///
    /// Sends `initialize`, records the negotiated capabilities, then sends
    /// `notifications/initialized`. On any failure the transport is shut
    /// down before the error propagates, so no child process leaks.
    pub async fn initialize(transport: StdioTransport) -> Result<Self, ClientError> {
        match Self::handshake(&transport).await {
            Ok(init) => {
                tracing::debug!(
                    server = %init.server_info.name,
                    "Handshake complete"
                );
                Ok(Self {
                    transport: Some(transport),
                    server_info: init.server_info,
                    capabilities: init.capabilities,
                })
            }
            Err(e) => {
                transport.shutdown().await;
                Err(e)
            }
        }
    }

    async fn handshake(transport: &StdioTransport) -> Result<InitializeResult, ClientError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "docket",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let resp = transport
            .send_request("initialize", Some(params))
            .await
            .map_err(|e| ClientError::Handshake(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(ClientError::Handshake(format!(
                "server rejected initialize (code {}): {}",
                err.code, err.message
            )));
        }

        let result = resp
            .result
            .ok_or_else(|| ClientError::Handshake("empty initialize response".to_string()))?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| ClientError::Handshake(format!("malformed initialize response: {e}")))?;

        transport
            .send_notification("notifications/initialized", None)
            .await
            .map_err(|e| ClientError::Handshake(e.to_string()))?;

        Ok(init)
    }

    fn transport(&self) -> Result<&StdioTransport, ClientError> {
        self.transport.as_ref().ok_or(ClientError::Closed)
    }

    /// Server name and version from the handshake.
    pub fn server_info(&self) -> &PeerInfo {
        &self.server_info
    }

    /// Capabilities negotiated during the handshake.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// List the tools the server exposes.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        let resp = self.transport()?.send_request("tools/list", None).await?;
        let result: ToolsListResult = expect_result(resp, "tools/list")?;
        Ok(result.tools)
    }

    /// Call a tool and wait for its result.
    ///
    /// A handler-level failure (`isError` result) becomes
    /// [`ClientError::ToolFailed`] carrying the server's message; a missing
    /// tool becomes [`ClientError::UnknownTool`].
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, ClientError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let resp = self
            .transport()?
            .send_request("tools/call", Some(params))
            .await?;

        if let Some(err) = resp.error {
            if err.code == ErrorCode::InvalidParams.code() && err.message.contains("Unknown tool") {
                return Err(ClientError::UnknownTool {
                    name: name.to_string(),
                });
            }
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = resp.result.ok_or_else(|| {
            ClientError::Protocol("tools/call response has neither result nor error".to_string())
        })?;
        let call_result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("failed to parse tools/call result: {e}")))?;

        if call_result.is_error {
            let message = call_result
                .content
                .iter()
                .map(Content::as_text)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ClientError::ToolFailed {
                name: name.to_string(),
                message,
            });
        }

        Ok(call_result)
    }

    /// List the resources the server exposes.
    ///
    /// A server without a resource catalog is a valid peer: method-not-found
    /// yields an empty list rather than an error.
    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ClientError> {
        let resp = self
            .transport()?
            .send_request("resources/list", None)
            .await?;
        Ok(optional_result::<ResourcesListResult>(resp, "resources/list")?
            .map(|r| r.resources)
            .unwrap_or_default())
    }

    /// Read one resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ClientError> {
        let params = serde_json::json!({ "uri": uri });
        let resp = self
            .transport()?
            .send_request("resources/read", Some(params))
            .await?;
        let result: ReadResourceResult = expect_result(resp, "resources/read")?;
        Ok(result.contents)
    }

    /// List the prompts the server exposes; empty for a promptless server.
    pub async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, ClientError> {
        let resp = self.transport()?.send_request("prompts/list", None).await?;
        Ok(optional_result::<PromptsListResult>(resp, "prompts/list")?
            .map(|r| r.prompts)
            .unwrap_or_default())
    }

    /// Fetch a rendered prompt by name.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult, ClientError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let resp = self
            .transport()?
            .send_request("prompts/get", Some(params))
            .await?;
        expect_result(resp, "prompts/get")
    }

    /// Close the session, shutting down the transport and the child
    /// process. Idempotent; never fails.
    pub async fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
    }
}

/// Unwraps a response that must carry a result, deserializing it.
fn expect_result<T: serde::de::DeserializeOwned>(
    resp: RpcResponse,
    method: &str,
) -> Result<T, ClientError> {
    if let Some(err) = resp.error {
        return Err(ClientError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    let result = resp.result.ok_or_else(|| {
        ClientError::Protocol(format!("{method} response has neither result nor error"))
    })?;
    serde_json::from_value(result)
        .map_err(|e| ClientError::Protocol(format!("failed to parse {method} result: {e}")))
}

/// Like [`expect_result`], but treats method-not-found as "capability
/// absent" and returns `None`.
fn optional_result<T: serde::de::DeserializeOwned>(
    resp: RpcResponse,
    method: &str,
) -> Result<Option<T>, ClientError> {
    if let Some(err) = resp.error {
        if err.code == ErrorCode::MethodNotFound.code() {
            return Ok(None);
        }
        return Err(ClientError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    let result = resp.result.ok_or_else(|| {
        ClientError::Protocol(format!("{method} response has neither result nor error"))
    })?;
    serde_json::from_value(result)
        .map(Some)
        .map_err(|e| ClientError::Protocol(format!("failed to parse {method} result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(result: serde_json::Value) -> RpcResponse {
        RpcResponse::success(docket_proto::RequestId::Number(1), result)
    }

    #[test]
    fn expect_result_deserializes_tools() {
        let resp = success(serde_json::json!({
            "tools": [
                {"name": "read_doc_contents", "inputSchema": {"type": "object"}},
                {"name": "edit_document", "inputSchema": {"type": "object"}}
            ]
        }));
        let list: ToolsListResult = expect_result(resp, "tools/list").unwrap();
        assert_eq!(list.tools.len(), 2);
        assert_eq!(list.tools[0].name, "read_doc_contents");
    }

    #[test]
    fn expect_result_maps_rpc_error() {
        let resp = RpcResponse::invalid_params(docket_proto::RequestId::Number(1), "bad uri");
        let err = expect_result::<ReadResourceResult>(resp, "resources/read").unwrap_err();
        match err {
            ClientError::Rpc { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "bad uri");
            }
            other => panic!("Expected Rpc, got: {other:?}"),
        }
    }

    #[test]
    fn optional_result_treats_method_not_found_as_absent() {
        let resp =
            RpcResponse::method_not_found(docket_proto::RequestId::Number(1), "prompts/list");
        let result = optional_result::<PromptsListResult>(resp, "prompts/list").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn optional_result_propagates_other_errors() {
        let resp = RpcResponse::internal_error(docket_proto::RequestId::Number(1), "boom");
        let err = optional_result::<PromptsListResult>(resp, "prompts/list").unwrap_err();
        assert!(matches!(err, ClientError::Rpc { code: -32603, .. }));
    }

    #[test]
    fn missing_result_is_protocol_error() {
        let resp = RpcResponse {
            jsonrpc: "2.0".to_string(),
            id: Some(docket_proto::RequestId::Number(1)),
            result: None,
            error: None,
        };
        let err = expect_result::<ToolsListResult>(resp, "tools/list").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
