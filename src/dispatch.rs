//! Validates, coerces, and issues a single tool invocation, recording the
//! outcome either way.
//!
//! A dispatch failure never propagates out of [`Dispatcher::dispatch`]: one
//! bad turn degrades to a recorded failed [`StepOutcome`]. Whether that
//! failure ends the run is the loop controller's error policy, not this
//! module's.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::mcp::{SessionChannel, SessionError, ToolResult};
use crate::params::{self, ParamError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Not enough parameters provided for {tool} (missing {missing})")]
    InsufficientParameters { tool: String, missing: String },

    #[error("Cannot coerce {value:?} to {expected} for parameter {param}")]
    Coercion {
        param: String,
        expected: String,
        value: String,
    },

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// How FUNCTION_CALL parameter tokens bind to the schema. Chosen once per
/// deployment; the two styles are never mixed within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `key=value` tokens, dotted keys allowed, values parsed as literals.
    #[default]
    Keyed,
    /// One bare token per schema property, in declared order, coerced to
    /// the declared type.
    Positional,
}

/// One attempted invocation, recorded whether or not it succeeded.
/// Append-only: never mutated after it enters the run log.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub iteration: usize,
    pub tool_name: String,
    pub arguments: Value,
    pub result: Option<ToolResult>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl StepOutcome {
    /// The history line fed back into later prompts.
    pub fn summary(&self) -> String {
        match (&self.result, self.succeeded) {
            (Some(result), true) => format!(
                "In the {} iteration you called {} with {} parameters, and the function returned {}.",
                self.iteration + 1,
                self.tool_name,
                self.arguments,
                result.render()
            ),
            _ => format!(
                "Error in iteration {}: {}",
                self.iteration + 1,
                self.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

pub struct Dispatcher {
    style: ParamStyle,
    /// `(tool, parameter)` pairs whose argument must reach the tool as a
    /// string even when the literal parsed numeric. Textual tools must
    /// never receive a native number for their text payload.
    text_payloads: Vec<(String, String)>,
}

impl Dispatcher {
    pub fn new(style: ParamStyle) -> Self {
        Self {
            style,
            text_payloads: Vec::new(),
        }
    }

    pub fn with_text_payload(mut self, tool: impl Into<String>, param: impl Into<String>) -> Self {
        self.text_payloads.push((tool.into(), param.into()));
        self
    }

    /// Issue one call. Any failure in lookup, argument building, or the
    /// session call becomes a failed outcome carrying the error text.
    pub async fn dispatch(
        &self,
        catalog: &ToolCatalog,
        session: &mut dyn SessionChannel,
        tool_name: &str,
        tokens: &[String],
        iteration: usize,
    ) -> StepOutcome {
        match self.try_dispatch(catalog, session, tool_name, tokens).await {
            Ok((arguments, result)) => StepOutcome {
                iteration,
                tool_name: tool_name.to_string(),
                arguments,
                result: Some(result),
                succeeded: true,
                error: None,
                recorded_at: Utc::now(),
            },
            Err(e) => {
                tracing::warn!("Dispatch of {} failed: {}", tool_name, e);
                StepOutcome {
                    iteration,
                    tool_name: tool_name.to_string(),
                    arguments: Value::Null,
                    result: None,
                    succeeded: false,
                    error: Some(e.to_string()),
                    recorded_at: Utc::now(),
                }
            }
        }
    }

    async fn try_dispatch(
        &self,
        catalog: &ToolCatalog,
        session: &mut dyn SessionChannel,
        tool_name: &str,
        tokens: &[String],
    ) -> Result<(Value, ToolResult), DispatchError> {
        let tool = catalog
            .get(tool_name)
            .ok_or_else(|| DispatchError::UnknownTool(tool_name.to_string()))?;

        let mut arguments = self.build_arguments(tool, tokens)?;
        self.force_text_payloads(tool_name, &mut arguments);

        tracing::debug!("Calling tool {} with arguments {}", tool_name, arguments);
        let result = session.call_tool(tool_name, arguments.clone()).await?;
        Ok((arguments, result))
    }

    fn build_arguments(
        &self,
        tool: &ToolDescriptor,
        tokens: &[String],
    ) -> Result<Value, DispatchError> {
        if tokens.is_empty() && tool.input_schema.properties.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        match self.style {
            ParamStyle::Keyed => Ok(params::parse_tokens(tokens)?),
            ParamStyle::Positional => positional_arguments(tool, tokens),
        }
    }

    fn force_text_payloads(&self, tool_name: &str, arguments: &mut Value) {
        for (tool, param) in &self.text_payloads {
            if tool != tool_name {
                continue;
            }
            if let Some(value) = arguments.get_mut(param) {
                if !value.is_string() {
                    *value = Value::String(value.to_string());
                }
            }
        }
    }
}

/// Consume one token per schema property in declared order, coercing each
/// to the property's declared type.
fn positional_arguments(
    tool: &ToolDescriptor,
    tokens: &[String],
) -> Result<Value, DispatchError> {
    let mut remaining = tokens.iter();
    let mut arguments = Map::new();
    for name in tool.input_schema.properties.keys() {
        let raw = remaining
            .next()
            .ok_or_else(|| DispatchError::InsufficientParameters {
                tool: tool.name.clone(),
                missing: name.clone(),
            })?;
        let coerced = coerce(raw, tool.input_schema.property_type(name), name)?;
        arguments.insert(name.clone(), coerced);
    }
    Ok(Value::Object(arguments))
}

fn coerce(raw: &str, expected: &str, param: &str) -> Result<Value, DispatchError> {
    let raw = raw.trim();
    let mismatch = || DispatchError::Coercion {
        param: param.to_string(),
        expected: expected.to_string(),
        value: raw.to_string(),
    };
    match expected {
        "integer" => raw.parse::<i64>().map(Value::from).map_err(|_| mismatch()),
        "number" => raw.parse::<f64>().map(Value::from).map_err(|_| mismatch()),
        "array" => {
            // Accepts `[1,2,3]` or a bare comma-joined `1,2,3`.
            let inner = raw.trim_start_matches('[').trim_end_matches(']');
            let mut items = Vec::new();
            for piece in inner.split(',') {
                let piece = piece.trim();
                if piece.is_empty() {
                    continue;
                }
                items.push(Value::from(
                    piece.parse::<i64>().map_err(|_| mismatch())?,
                ));
            }
            Ok(Value::Array(items))
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoSession {
        last_arguments: Option<Value>,
    }

    #[async_trait]
    impl SessionChannel for EchoSession {
        async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, SessionError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &mut self,
            _name: &str,
            arguments: Value,
        ) -> Result<ToolResult, SessionError> {
            self.last_arguments = Some(arguments);
            Ok(ToolResult::Scalar("ok".to_string()))
        }
    }

    fn catalog() -> ToolCatalog {
        let tools: Vec<ToolDescriptor> = serde_json::from_value(json!([
            {
                "name": "draw_rectangle",
                "description": "Draw a rectangle",
                "inputSchema": {
                    "properties": {
                        "x1": {"type": "integer"},
                        "y1": {"type": "integer"},
                        "x2": {"type": "integer"},
                        "y2": {"type": "integer"}
                    },
                    "required": ["x1", "y1", "x2", "y2"]
                }
            },
            {
                "name": "add_text_in_paint",
                "description": "Insert text into the canvas",
                "inputSchema": {
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }
            },
            {
                "name": "int_list_to_exponential_sum",
                "description": "Exponential sum",
                "inputSchema": {
                    "properties": {"int_list": {"type": "array"}},
                    "required": ["int_list"]
                }
            }
        ]))
        .unwrap();
        ToolCatalog::new(tools)
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn keyed_tokens_bind_by_name() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Keyed);
        let outcome = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "draw_rectangle",
                &tokens(&["x1=780", "y1=380", "x2=1140", "y2=700"]),
                0,
            )
            .await;
        assert!(outcome.succeeded);
        assert_eq!(
            session.last_arguments.unwrap(),
            json!({"x1": 780, "y1": 380, "x2": 1140, "y2": 700})
        );
    }

    #[tokio::test]
    async fn positional_tokens_follow_schema_order() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Positional);
        let outcome = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "draw_rectangle",
                &tokens(&["780", "380", "1140", "700"]),
                0,
            )
            .await;
        assert!(outcome.succeeded);
        assert_eq!(
            session.last_arguments.unwrap(),
            json!({"x1": 780, "y1": 380, "x2": 1140, "y2": 700})
        );
    }

    #[tokio::test]
    async fn positional_array_accepts_bracketed_literal() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Positional);
        let outcome = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "int_list_to_exponential_sum",
                &tokens(&["[68,104,97]"]),
                0,
            )
            .await;
        assert!(outcome.succeeded);
        assert_eq!(
            session.last_arguments.unwrap(),
            json!({"int_list": [68, 104, 97]})
        );
    }

    #[tokio::test]
    async fn missing_positional_token_is_recorded_failure() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Positional);
        let outcome = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "draw_rectangle",
                &tokens(&["780", "380"]),
                3,
            )
            .await;
        assert!(!outcome.succeeded);
        assert!(outcome.error.unwrap().contains("Not enough parameters"));
        assert!(session.last_arguments.is_none());
    }

    #[tokio::test]
    async fn unknown_tool_is_recorded_failure() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Keyed);
        let outcome = dispatcher
            .dispatch(&catalog(), &mut session, "close_paint", &[], 0)
            .await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error.unwrap(), "Unknown tool: close_paint");
    }

    #[tokio::test]
    async fn text_payload_is_forced_to_string() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher =
            Dispatcher::new(ParamStyle::Keyed).with_text_payload("add_text_in_paint", "text");
        let outcome = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "add_text_in_paint",
                &tokens(&["text=12345.67"]),
                0,
            )
            .await;
        assert!(outcome.succeeded);
        assert_eq!(
            session.last_arguments.unwrap(),
            json!({"text": "12345.67"})
        );
    }

    #[tokio::test]
    async fn summary_lines_match_history_format() {
        let mut session = EchoSession { last_arguments: None };
        let dispatcher = Dispatcher::new(ParamStyle::Keyed);
        let ok = dispatcher
            .dispatch(
                &catalog(),
                &mut session,
                "draw_rectangle",
                &tokens(&["x1=1", "y1=2", "x2=3", "y2=4"]),
                0,
            )
            .await;
        assert!(ok.summary().starts_with("In the 1 iteration you called draw_rectangle"));

        let failed = dispatcher
            .dispatch(&catalog(), &mut session, "close_paint", &[], 1)
            .await;
        assert_eq!(
            failed.summary(),
            "Error in iteration 2: Unknown tool: close_paint"
        );
    }
}
