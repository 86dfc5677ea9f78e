//! Normalized outcome of a `tools/call` exchange.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a tool call produced once the MCP content envelope is peeled away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolCallResult {
    /// Structured payload, already typed by the server
    Json(Value),
    /// Free text that still needs grammar-based parsing
    Text(String),
    /// The call failed; the message is for logs, not end users
    Error(String),
}

#[derive(Debug, Deserialize)]
struct CallToolResultWire {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    is_error: bool,
    #[serde(default, rename = "structuredContent")]
    structured_content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ToolCallResult {
    /// Build from the `result` member of a `tools/call` response.
    ///
    /// Text content that is itself a JSON object or array is promoted to
    /// [`ToolCallResult::Json`]; anything else stays text.
    pub fn from_call_result(result: Value) -> Self {
        let is_envelope = result.as_object().is_some_and(|map| {
            map.contains_key("content")
                || map.contains_key("structuredContent")
                || map.contains_key("isError")
        });
        if !is_envelope {
            return Self::from_bare_value(result);
        }

        let wire = match serde_json::from_value::<CallToolResultWire>(result.clone()) {
            Ok(wire) => wire,
            Err(_) => return Self::from_bare_value(result),
        };

        let text = wire
            .content
            .iter()
            .filter(|block| block.kind == "text" || block.kind.is_empty())
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if wire.is_error {
            let message = if text.trim().is_empty() {
                "tool reported an error".to_string()
            } else {
                text
            };
            return Self::Error(message);
        }

        if let Some(structured) = wire.structured_content.filter(|v| !v.is_null()) {
            return Self::Json(structured);
        }

        if text.trim().is_empty() {
            return Self::Error("empty tool result".to_string());
        }

        Self::from_text(text)
    }

    /// Promote JSON-looking text, keep everything else as text.
    pub fn from_text(text: String) -> Self {
        let trimmed = text.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(value) = serde_json::from_str::<Value>(&text)
        {
            return Self::Json(value);
        }
        Self::Text(text)
    }

    fn from_bare_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::from_text(text),
            Value::Null => Self::Error("empty tool result".to_string()),
            other => Self::Json(other),
        }
    }

    /// Whether this is an error outcome
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}
