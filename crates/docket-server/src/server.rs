//! MCP server lifecycle and request dispatch.
//!
//! Lifecycle: `initialize` (capability negotiation) -> `notifications/
//! initialized` -> normal operation -> shutdown on EOF or signal. Every
//! request other than `initialize` and `ping` requires the `Running`
//! state. Dispatch is a single-threaded loop, so store mutations are
//! serialized by construction.

use serde_json::json;

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::store::DocumentStore;
use crate::transport::StdioTransport;
use docket_proto::{
    Content, ErrorCode, IncomingMessage, InitializeParams, PromptArgument, PromptDescriptor,
    PromptMessage, ReadResourceParams, RequestId, ResourceContents, ResourceDescriptor,
    RpcErrorData, RpcNotification, RpcRequest, RpcResponse, ServerCapabilities, ToolCallParams,
    ToolCallResult, parse_message, PROTOCOL_VERSION,
};

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "docket-server";

/// URI of the document index resource.
pub const DOC_INDEX_URI: &str = "docs://documents";

/// URI prefix for individual document resources.
pub const DOC_URI_PREFIX: &str = "docs://document/";

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for the initialize request.
    AwaitingInit,
    /// Initialize received, waiting for the initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// The document MCP server.
pub struct DocServer {
    state: ServerState,
    transport: StdioTransport,
    registry: ToolRegistry,
    store: DocumentStore,
    protocol_version: Option<String>,
}

impl DocServer {
    /// Creates a server over the given store with the built-in tools.
    pub fn new(store: DocumentStore) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport: StdioTransport::new(),
            registry: ToolRegistry::with_builtins(),
            store,
            protocol_version: None,
        }
    }

    /// Returns the current server state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the server main loop until EOF or a termination signal.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            // EOF: the client closed our stdin.
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        match parse_message(&line) {
            Ok(IncomingMessage::Request(req)) => {
                let response = self.handle_request(&req);
                self.transport.write_response(&response).await?;
            }
            Ok(IncomingMessage::Notification(notif)) => {
                self.handle_notification(&notif);
            }
            Err(error) => {
                self.transport.write_response(&error).await?;
            }
        }

        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Dispatches a request by method name.
    pub fn handle_request(&mut self, req: &RpcRequest) -> RpcResponse {
        tracing::debug!(method = %req.method, id = %req.id, "Handling request");
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => RpcResponse::success(req.id.clone(), json!({})),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req),
            "resources/list" => self.handle_resources_list(req),
            "resources/read" => self.handle_resources_read(req),
            "prompts/list" => self.handle_prompts_list(req),
            "prompts/get" => self.handle_prompts_get(req),
            _ => RpcResponse::method_not_found(req.id.clone(), &req.method),
        }
    }

    /// Handles an incoming notification.
    pub fn handle_notification(&mut self, notif: &RpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            tracing::info!("Client initialized, entering normal operation");
            self.state = ServerState::Running;
        }
    }

    fn handle_initialize(&mut self, req: &RpcRequest) -> RpcResponse {
        if self.state != ServerState::AwaitingInit {
            return RpcResponse::invalid_params(req.id.clone(), "Server already initialised");
        }

        let params: InitializeParams = match parse_params(req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };

        tracing::info!(
            client = params
                .client_info
                .as_ref()
                .map(|c| c.name.as_str())
                .unwrap_or("unknown"),
            requested_version = %params.protocol_version,
            "Initialize request"
        );

        self.protocol_version = Some(PROTOCOL_VERSION.to_string());
        self.state = ServerState::Initialising;

        let capabilities = ServerCapabilities {
            tools: Some(Default::default()),
            resources: Some(Default::default()),
            prompts: Some(Default::default()),
        };

        RpcResponse::success(
            req.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
    }

    fn handle_tools_list(&self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }
        RpcResponse::success(req.id.clone(), json!({ "tools": self.registry.descriptors() }))
    }

    fn handle_tools_call(&mut self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }

        let params: ToolCallParams = match parse_params(req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };

        let result = match self
            .registry
            .dispatch(&params.name, &mut self.store, &params.arguments)
        {
            Ok(text) => ToolCallResult::text(text),
            Err(ToolError::Unknown { name }) => {
                return RpcResponse::invalid_params(req.id.clone(), format!("Unknown tool: {name}"));
            }
            // Handler-level failures cross the wire as structured results,
            // never as a bare crash.
            Err(e) => ToolCallResult::error(e.to_string()),
        };

        success_value(req.id.clone(), &result)
    }

    fn handle_resources_list(&self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }

        let mut resources = vec![ResourceDescriptor {
            uri: DOC_INDEX_URI.to_string(),
            name: "documents".to_string(),
            description: Some("All current document ids.".to_string()),
            mime_type: Some("application/json".to_string()),
        }];

        let mut ids = self.store.list();
        ids.sort_unstable();
        for id in ids {
            resources.push(ResourceDescriptor {
                uri: format!("{DOC_URI_PREFIX}{id}"),
                name: id.to_string(),
                description: None,
                mime_type: Some("text/plain".to_string()),
            });
        }

        RpcResponse::success(req.id.clone(), json!({ "resources": resources }))
    }

    fn handle_resources_read(&self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }

        let params: ReadResourceParams = match parse_params(req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };

        let contents = if params.uri == DOC_INDEX_URI {
            let mut ids = self.store.list();
            ids.sort_unstable();
            ResourceContents {
                uri: params.uri.clone(),
                mime_type: Some("application/json".to_string()),
                text: json!(ids).to_string(),
            }
        } else if let Some(id) = params.uri.strip_prefix(DOC_URI_PREFIX) {
            match self.store.read(id) {
                Ok(text) => ResourceContents {
                    uri: params.uri.clone(),
                    mime_type: Some("text/plain".to_string()),
                    text: text.to_string(),
                },
                Err(e) => {
                    return RpcResponse::invalid_params(req.id.clone(), e.to_string());
                }
            }
        } else {
            return RpcResponse::invalid_params(
                req.id.clone(),
                format!("Unknown resource URI: {}", params.uri),
            );
        };

        RpcResponse::success(req.id.clone(), json!({ "contents": [contents] }))
    }

    fn handle_prompts_list(&self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }

        let prompts = vec![PromptDescriptor {
            name: "format".to_string(),
            description: Some("Rewrites a document in Markdown.".to_string()),
            arguments: vec![PromptArgument {
                name: "doc_id".to_string(),
                description: Some("The id of the document to reformat.".to_string()),
                required: true,
            }],
        }];

        RpcResponse::success(req.id.clone(), json!({ "prompts": prompts }))
    }

    fn handle_prompts_get(&self, req: &RpcRequest) -> RpcResponse {
        if let Err(resp) = self.require_running(&req.id) {
            return resp;
        }

        let params: docket_proto::GetPromptParams = match parse_params(req) {
            Ok(p) => p,
            Err(resp) => return resp,
        };

        if params.name != "format" {
            return RpcResponse::invalid_params(
                req.id.clone(),
                format!("Unknown prompt: {}", params.name),
            );
        }

        let Some(doc_id) = params.arguments.get("doc_id") else {
            return RpcResponse::invalid_params(req.id.clone(), "Missing argument: doc_id");
        };

        let message = PromptMessage {
            role: "user".to_string(),
            content: Content::Text {
                text: format_prompt_text(doc_id),
            },
        };

        RpcResponse::success(
            req.id.clone(),
            json!({
                "description": "Instruction to rewrite a document in Markdown.",
                "messages": [message],
            }),
        )
    }

    // A request outside the Running state is invalid as a request, not a
    // params problem.
    fn require_running(&self, id: &RequestId) -> Result<(), RpcResponse> {
        if self.state != ServerState::Running {
            return Err(RpcResponse::failure(
                Some(id.clone()),
                RpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

/// The templated instruction behind the `format` prompt. The server only
/// transports this text; an external model interprets it.
fn format_prompt_text(doc_id: &str) -> String {
    format!(
        "Your goal is to reformat a document to be written with markdown syntax.\n\n\
         The id of the document you need to reformat is:\n\
         <document_id>{doc_id}</document_id>\n\n\
         Add in headers, bullet points, tables, or any other markdown features \
         that are appropriate. Keep the meaning of the document unchanged, and \
         use the edit_document tool to apply the rewrite."
    )
}

fn parse_params<T: serde::de::DeserializeOwned>(req: &RpcRequest) -> Result<T, RpcResponse> {
    let params = req
        .params
        .clone()
        .ok_or_else(|| RpcResponse::invalid_params(req.id.clone(), "Missing params"))?;
    serde_json::from_value(params)
        .map_err(|e| RpcResponse::invalid_params(req.id.clone(), format!("Invalid params: {e}")))
}

fn success_value<T: serde::Serialize>(id: RequestId, value: &T) -> RpcResponse {
    match serde_json::to_value(value) {
        Ok(v) => RpcResponse::success(id, v),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialise result");
            RpcResponse::internal_error(id, "Internal error: failed to serialise result")
        }
    }
}
