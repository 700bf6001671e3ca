//! Server-side stdio transport.
//!
//! Messages are UTF-8 JSON-RPC delimited by newlines; stdin receives,
//! stdout sends, stderr is for logs only. Serialized messages must not
//! contain embedded newlines.

use docket_proto::RpcResponse;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Reads requests from stdin and writes responses to stdout.
pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next message line from stdin; `None` on EOF.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes a response to stdout, newline-terminated.
    pub async fn write_response(&mut self, response: &RpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        debug_assert!(!json.contains('\n'), "message must not contain newlines");

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_proto::RequestId;

    #[test]
    fn serialized_response_has_no_newlines() {
        let response = RpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "content": [{"type": "text", "text": "hello world"}],
                "nested": {"key": "value"}
            }),
        );

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn serialized_error_has_no_newlines() {
        let error = RpcResponse::method_not_found(RequestId::Number(1), "docs/unknown");
        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains('\n'));
    }
}
