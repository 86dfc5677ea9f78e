//! Remote tool names and the descriptors returned by `tools/list`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tutorlink_protocol::Result;

/// Search a learner's assignments, grades, lessons and materials
pub const SEARCH: &str = "search";
/// Fetch one material's content and question list
pub const GET_MATERIAL_CONTENT: &str = "get_material_content";
/// Ask whether a learner may open a material
pub const CHECK_MATERIAL_ACCESS: &str = "check_material_access";
/// Dashboard summary for a learner
pub const GET_LEARNING_CONTEXT: &str = "get_learning_context";

/// Argument a tool declares when it can answer in JSON
pub const RESPONSE_FORMAT: &str = "response_format";

/// One tool as advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Whether the input schema declares `property`
    pub fn accepts(&self, property: &str) -> bool {
        self.input_schema
            .get("properties")
            .and_then(|properties| properties.get(property))
            .is_some()
    }

    /// Whether the tool can be asked for a JSON reply
    pub fn supports_structured_response(&self) -> bool {
        self.accepts(RESPONSE_FORMAT)
    }
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// Decode the `result` of a `tools/list` call.
///
/// # Errors
///
/// Returns [`tutorlink_protocol::Error::Serialization`] if the result does
/// not have the expected shape.
pub fn parse_tool_list(result: Value) -> Result<Vec<ToolDescriptor>> {
    let list: ListToolsResult = serde_json::from_value(result)?;
    Ok(list.tools)
}
