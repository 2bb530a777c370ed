//! Snapshot of the tools advertised by the session channel.
//!
//! Fetched once at startup and read-only for the run's duration; a tool
//! added by the server mid-run is invisible until the next session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single tool as described by the session's `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: InputSchema,
}

/// JSON-schema-like input specification. Property order is preserved so
/// positional parameter binding can follow the declared order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl InputSchema {
    /// Declared type of a property, defaulting to `string`.
    pub fn property_type(&self, name: &str) -> &str {
        self.properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("string")
    }
}

/// Read-only catalog fetched once at session startup.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// Look up a tool by name. Absent tools are `None`, never an error.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Human-readable listing for the system prompt, one numbered line per
    /// tool: `1. draw_rectangle(x1: integer, ...) - Draw a rectangle`.
    pub fn render(&self) -> String {
        self.tools
            .iter()
            .enumerate()
            .map(|(i, tool)| {
                let params = if tool.input_schema.properties.is_empty() {
                    "no parameters".to_string()
                } else {
                    tool.input_schema
                        .properties
                        .keys()
                        .map(|name| format!("{}: {}", name, tool.input_schema.property_type(name)))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let desc = if tool.description.is_empty() {
                    "No description available"
                } else {
                    &tool.description
                };
                format!("{}. {}({}) - {}", i + 1, tool.name, params, desc)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ToolCatalog {
        let tools: Vec<ToolDescriptor> = serde_json::from_value(json!([
            {
                "name": "open_paint",
                "description": "Open the canvas",
                "inputSchema": {"properties": {}}
            },
            {
                "name": "draw_rectangle",
                "inputSchema": {
                    "properties": {
                        "x1": {"type": "integer"},
                        "y1": {"type": "integer"}
                    },
                    "required": ["x1", "y1"]
                }
            }
        ]))
        .unwrap();
        ToolCatalog::new(tools)
    }

    #[test]
    fn lookup_by_name() {
        let catalog = sample();
        assert!(catalog.get("open_paint").is_some());
        assert!(catalog.get("close_paint").is_none());
    }

    #[test]
    fn render_lists_params_and_falls_back() {
        let rendering = sample().render();
        assert!(rendering.contains("1. open_paint(no parameters) - Open the canvas"));
        assert!(rendering.contains("2. draw_rectangle(x1: integer, y1: integer) - No description available"));
    }

    #[test]
    fn property_type_defaults_to_string() {
        let catalog = sample();
        let tool = catalog.get("draw_rectangle").unwrap();
        assert_eq!(tool.input_schema.property_type("x1"), "integer");
        assert_eq!(tool.input_schema.property_type("missing"), "string");
    }
}
