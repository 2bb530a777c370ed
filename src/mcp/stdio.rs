//! Line-delimited JSON-RPC client for a stdio tool server.
//!
//! The server process is spawned once, the `initialize` handshake runs,
//! and the session then serves `tools/list` and `tools/call` with exactly
//! one request in flight at a time, matching the loop's
//! one-invocation-per-turn invariant.

use std::process::Stdio;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::catalog::ToolDescriptor;

use super::{normalize_result, SessionChannel, SessionError, ToolResult};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// A single long-lived stdio session.
pub struct StdioSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl StdioSession {
    /// Spawn the server process and run the initialize handshake.
    pub async fn connect(command: &str, args: &[String]) -> Result<Self, SessionError> {
        tracing::info!("Spawning tool server: {} {}", command, args.join(" "));
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(SessionError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Protocol("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Protocol("child stdout unavailable".to_string()))?;

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        };
        session.initialize().await?;
        Ok(session)
    }

    async fn initialize(&mut self) -> Result<(), SessionError> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .await?;
        self.notify("notifications/initialized", json!({})).await?;
        tracing::debug!("Session initialized");
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Value) -> Result<Value, SessionError> {
        let id = self.next_id;
        self.next_id += 1;
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.send(&message).await?;

        // Read until the response with our id shows up; server-initiated
        // notifications in between are skipped.
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(SessionError::Protocol(
                    "server closed the session".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let reply: Value = serde_json::from_str(trimmed)
                .map_err(|e| SessionError::Protocol(format!("invalid json from server: {}", e)))?;
            if reply.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = reply.get("error") {
                return Err(SessionError::Rpc {
                    code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }
            return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), SessionError> {
        let message = json!({"jsonrpc": "2.0", "method": method, "params": params});
        self.send(&message).await
    }

    async fn send(&mut self, message: &Value) -> Result<(), SessionError> {
        let mut payload = message.to_string();
        payload.push('\n');
        self.stdin.write_all(payload.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Close the channel and reap the server. Called on every exit path;
    /// `Drop` kills the child as a backstop if this is never reached.
    pub async fn shutdown(mut self) -> Result<(), SessionError> {
        self.stdin.shutdown().await.ok();
        let status = self.child.wait().await?;
        tracing::debug!("Tool server exited with {}", status);
        Ok(())
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[async_trait::async_trait]
impl SessionChannel for StdioSession {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(tools)
            .map_err(|e| SessionError::Protocol(format!("malformed tool list: {}", e)))
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResult, SessionError> {
        let result = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(normalize_result(&result))
    }
}
