//! Stdio transport: spawns the server process and owns its pipes.
//!
//! Requests are tagged with a monotonically increasing id and replies are
//! routed back through a pending map, so overlapping calls (or a call
//! abandoned on timeout) can never be paired with the wrong reply. When
//! the server's stdout closes, every in-flight call fails with
//! [`ClientError::Transport`] immediately instead of waiting out its
//! timeout.

use crate::error::ClientError;
use docket_proto::{RequestId, RpcNotification, RpcRequest, RpcResponse};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// Async stdio transport for one document server process.
///
/// Exclusively owned by one [`crate::Session`]; the child process and both
/// pipes are released exactly once, via [`StdioTransport::shutdown`].
pub struct StdioTransport {
    next_id: AtomicU64,
    outbound: mpsc::Sender<String>,
    pending: PendingMap,
    stream_closed: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    child: Child,
    timeout_ms: u64,
}

impl StdioTransport {
    /// Spawn a server process and start the background reader/writer tasks.
    ///
    /// The child's stderr is inherited so its logs reach our stderr; stdout
    /// carries protocol messages only.
    pub fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout_ms: u64,
    ) -> Result<Self, ClientError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClientError::Launch {
                name: command.to_string(),
                source: e,
            })?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let stream_closed = Arc::new(AtomicBool::new(false));

        // Writer: one newline-terminated frame per queued message.
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            while let Some(mut frame) = outbound_rx.recv().await {
                frame.push('\n');
                if stdin.write_all(frame.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        // Reader: pairs replies with pending requests until stdout closes.
        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&stream_closed);
        let reader_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                route_line(&line, &reader_pending).await;
            }
            // Stdout is gone: no pending request can ever complete. The
            // flag must be set before the map is drained so send_request
            // cannot park a new entry here unobserved.
            reader_closed.store(true, Ordering::SeqCst);
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            outbound,
            pending,
            stream_closed,
            reader_handle,
            writer_handle,
            child,
            timeout_ms,
        })
    }

    /// Send a JSON-RPC request and wait for the matching reply.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<RpcResponse, ClientError> {
        if self.stream_closed.load(Ordering::SeqCst) {
            return Err(ClientError::Transport(
                "server closed the connection".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&RpcRequest::new(id, method, params))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, reply_tx);

        if self.outbound.send(frame).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Transport("server stdin closed".to_string()));
        }

        // The reader may have drained the map between our insert and here;
        // an entry still parked after close can never be completed.
        if self.stream_closed.load(Ordering::SeqCst)
            && self.pending.lock().await.remove(&id).is_some()
        {
            return Err(ClientError::Transport(
                "server closed the connection".to_string(),
            ));
        }

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), reply_rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // Sender dropped: the reader drained the map on stream close.
            Ok(Err(_)) => Err(ClientError::Transport(
                "server closed the connection before replying".to_string(),
            )),
            Err(_) => {
                // Withdraw the entry so the eventual late reply is dropped
                // instead of being paired with a later request.
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    /// Send a JSON-RPC notification (fire-and-forget, no reply expected).
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let frame = serde_json::to_string(&RpcNotification::new(method, params))?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ClientError::Transport("server stdin closed".to_string()))
    }

    /// Shut down the transport: close the child's stdin, wait briefly for
    /// exit, then kill. Succeeds even if the child already exited.
    pub async fn shutdown(mut self) {
        // Dropping the outbound channel ends the writer task, which drops
        // the child's stdin; a well-behaved server exits on that EOF.
        drop(self.outbound);

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "Server exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reap server"),
            Err(_) => {
                tracing::warn!("Server did not exit on EOF, killing it");
                let _ = self.child.kill().await;
            }
        }

        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

/// Routes one line from the server: a numeric-id reply completes its
/// pending request, an id-less error is surfaced in the log, anything
/// else is dropped with a note.
async fn route_line(line: &str, pending: &PendingMap) {
    let message: RpcResponse = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unparseable line from server");
            return;
        }
    };

    let id = match &message.id {
        Some(RequestId::Number(n)) => *n,
        Some(RequestId::String(s)) => {
            // The client only ever sends numeric ids.
            tracing::debug!(id = %s, "Dropping reply with unexpected string id");
            return;
        }
        None => {
            if let Some(err) = &message.error {
                tracing::warn!(
                    code = err.code,
                    message = %err.message,
                    "Server reported an error outside any request"
                );
            }
            return;
        }
    };

    match pending.lock().await.remove(&id) {
        Some(tx) => {
            if tx.send(message).is_err() {
                tracing::debug!(id, "Reply arrived after the caller gave up");
            }
        }
        None => tracing::debug!(id, "Dropping reply with no pending request"),
    }
}
