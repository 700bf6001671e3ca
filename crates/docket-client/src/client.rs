//! Client facade — owns one session and enforces the lifecycle.
//!
//! The state machine is `Unconnected -> Connected -> Closed`, one way.
//! `connect` from `Connected` or `Closed` is an [`ClientError::IllegalState`];
//! operations outside `Connected` are [`ClientError::NotConnected`];
//! `cleanup` is idempotent and infallible. [`DocketClient::scoped`] is the
//! guard form: cleanup runs on every exit path, success or failure.

use crate::config::ServerConfig;
use crate::error::ClientError;
use crate::session::Session;
use crate::transport::StdioTransport;
use docket_proto::{
    GetPromptResult, PromptDescriptor, ResourceContents, ResourceDescriptor, ServerCapabilities,
    ToolCallResult, ToolDescriptor,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Client for a single document server.
pub struct DocketClient {
    config: ServerConfig,
    session: Option<Session>,
    closed: bool,
}

impl DocketClient {
    /// Create an unconnected client. No process is spawned yet.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session: None,
            closed: false,
        }
    }

    /// Spawn the server, perform the handshake, and enter `Connected`.
    ///
    /// If the handshake fails the spawned process and its pipes are
    /// released before the error propagates.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::IllegalState(
                "cannot connect a client that was cleaned up",
            ));
        }
        if self.session.is_some() {
            return Err(ClientError::IllegalState("client is already connected"));
        }

        let transport = StdioTransport::spawn(
            &self.config.command,
            &self.config.args,
            &self.config.env,
            self.config.timeout_ms,
        )?;

        // Session::initialize shuts the transport down on handshake failure.
        let session = Session::initialize(transport).await?;
        tracing::info!(
            server = %session.server_info().name,
            "Connected to document server"
        );
        self.session = Some(session);
        Ok(())
    }

    /// True once `connect` has succeeded and `cleanup` has not yet run.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&Session, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotConnected)
    }

    /// Capabilities negotiated during the handshake.
    pub fn capabilities(&self) -> Result<&ServerCapabilities, ClientError> {
        Ok(self.session()?.capabilities())
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        self.session()?.list_tools().await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, ClientError> {
        self.session()?.call_tool(name, arguments).await
    }

    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, ClientError> {
        self.session()?.list_resources().await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ClientError> {
        self.session()?.read_resource(uri).await
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, ClientError> {
        self.session()?.list_prompts().await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<GetPromptResult, ClientError> {
        self.session()?.get_prompt(name, arguments).await
    }

    /// Release everything: close the session, which shuts down the
    /// transport and the child process. Transitions to `Closed`
    /// unconditionally; safe to call twice and from error paths.
    pub async fn cleanup(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.closed = true;
    }

    /// Scoped connect/run/cleanup: the async-Rust equivalent of a guard
    /// block. `cleanup` runs whether the body succeeded or failed.
    pub async fn scoped<T, F>(config: ServerConfig, f: F) -> Result<T, ClientError>
    where
        F: for<'a> FnOnce(
            &'a DocketClient,
        )
            -> Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>,
    {
        let mut client = Self::new(config);
        client.connect().await?;
        let result = f(&client).await;
        client.cleanup().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ServerConfig {
        ServerConfig::new("this_command_does_not_exist_xyz123").timeout_ms(1000)
    }

    #[tokio::test]
    async fn call_before_connect_fails_fast() {
        let client = DocketClient::new(unreachable_config());
        let err = client
            .call_tool("read_doc_contents", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn list_tools_before_connect_fails_fast() {
        let client = DocketClient::new(unreachable_config());
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn connect_with_bad_command_is_launch_error() {
        let mut client = DocketClient::new(unreachable_config());
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Launch { .. }));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let mut client = DocketClient::new(unreachable_config());
        client.cleanup().await;
        client.cleanup().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn connect_after_cleanup_is_illegal() {
        let mut client = DocketClient::new(unreachable_config());
        client.cleanup().await;
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::IllegalState(_)));
    }

    #[tokio::test]
    async fn handshake_hang_times_out() {
        // `sleep` never answers the initialize request
        let config = ServerConfig::new("sleep").args(["10"]).timeout_ms(100);
        let mut client = DocketClient::new(config);
        let start = std::time::Instant::now();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Handshake(_)));
        assert!(start.elapsed() < std::time::Duration::from_secs(6));
    }

    #[tokio::test]
    async fn scoped_runs_cleanup_on_connect_failure_path() {
        let result: Result<(), _> = DocketClient::scoped(unreachable_config(), |_c: &DocketClient| {
            Box::pin(async { Ok(()) })
        })
        .await;
        assert!(matches!(result, Err(ClientError::Launch { .. })));
    }
}
