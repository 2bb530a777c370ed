//! Session channel to the tool server.
//!
//! The channel is a single long-lived bidirectional session providing
//! `list_tools`/`call_tool` semantics. Results are normalized once at this
//! boundary into [`ToolResult`]; downstream code never branches on the raw
//! wire shape again.

pub mod stdio;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ToolDescriptor;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn tool server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Canonical result shape, produced once at the session boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Scalar(String),
    Items(Vec<String>),
}

impl ToolResult {
    /// Rendering used for history records: items join into a bracketed,
    /// comma-separated string.
    pub fn render(&self) -> String {
        match self {
            ToolResult::Scalar(text) => text.clone(),
            ToolResult::Items(items) => format!("[{}]", items.join(", ")),
        }
    }
}

/// The external collaborator executing tools on the agent's behalf.
#[async_trait]
pub trait SessionChannel: Send {
    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, SessionError>;

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolResult, SessionError>;
}

/// Normalize a raw `tools/call` result into the canonical form.
///
/// A result exposing `content` items yields one extracted text per item;
/// items without a `text` field are stringified wholesale. Anything else
/// becomes a scalar.
pub fn normalize_result(result: &Value) -> ToolResult {
    if let Some(content) = result.get("content").and_then(Value::as_array) {
        let items = content
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect();
        return ToolResult::Items(items);
    }
    match result {
        Value::String(s) => ToolResult::Scalar(s.clone()),
        other => ToolResult::Scalar(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_items_become_items() {
        let raw = json!({"content": [
            {"type": "text", "text": "68"},
            {"type": "text", "text": "104"}
        ]});
        let result = normalize_result(&raw);
        assert_eq!(
            result,
            ToolResult::Items(vec!["68".to_string(), "104".to_string()])
        );
        assert_eq!(result.render(), "[68, 104]");
    }

    #[test]
    fn textless_item_is_stringified() {
        let raw = json!({"content": [{"type": "image", "data": "xyz"}]});
        match normalize_result(&raw) {
            ToolResult::Items(items) => assert!(items[0].contains("image")),
            other => panic!("expected items, got {:?}", other),
        }
    }

    #[test]
    fn scalar_results_stringify() {
        assert_eq!(
            normalize_result(&json!("done")),
            ToolResult::Scalar("done".to_string())
        );
        assert_eq!(
            normalize_result(&json!(42)),
            ToolResult::Scalar("42".to_string())
        );
    }
}
