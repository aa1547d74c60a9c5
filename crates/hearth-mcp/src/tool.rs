//! Tool descriptors and call results.

use hearth_types::{FunctionDefinition, ToolDefinition};
use serde::{Deserialize, Serialize};

/// A tool as advertised by an MCP server's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    /// Optional human-readable display name, distinct from `name`.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments, as published by the server.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<serde_json::Value>,
}

impl ToolDescriptor {
    /// Render as a chat-completion tool definition. Tools without a schema
    /// get an accept-anything object schema so providers that require one
    /// still see a valid definition.
    pub fn to_definition(&self) -> ToolDefinition {
        let parameters = self.input_schema.clone().unwrap_or_else(|| {
            serde_json::json!({
                "type": "object",
                "properties": {}
            })
        });
        ToolDefinition {
            definition_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters,
            },
        }
    }
}

/// Outcome of a tool invocation, as reported by the owning server.
///
/// Both variants flow back into the conversation as tool-result messages:
/// a failed tool call is information for the model, not a client error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallResult {
    Text(String),
    Error(String),
}

impl ToolCallResult {
    pub fn message(&self) -> &str {
        match self {
            Self::Text(s) | Self::Error(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_with_schema_passes_it_through() {
        let descriptor = ToolDescriptor {
            name: "HassTurnOn".into(),
            title: None,
            description: Some("Turns on a device".into()),
            input_schema: Some(serde_json::json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            })),
        };
        let def = descriptor.to_definition();
        assert_eq!(def.definition_type, "function");
        assert_eq!(def.function.name, "HassTurnOn");
        assert_eq!(def.function.description.as_deref(), Some("Turns on a device"));
        assert_eq!(def.function.parameters["required"][0], "name");
    }

    #[test]
    fn descriptor_without_schema_gets_empty_object_schema() {
        let descriptor = ToolDescriptor {
            name: "GetLiveContext".into(),
            title: None,
            description: None,
            input_schema: None,
        };
        let def = descriptor.to_definition();
        assert!(def.function.description.is_none());
        assert_eq!(def.function.parameters["type"], "object");
        assert!(def.function.parameters["properties"].as_object().unwrap().is_empty());
    }

    #[test]
    fn deserialize_from_tools_list_entry() {
        let json = r#"{
            "name": "HassTurnOff",
            "title": "Turn Off",
            "description": "Turns off a device",
            "inputSchema": {"type": "object", "properties": {}}
        }"#;
        let descriptor: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.name, "HassTurnOff");
        assert_eq!(descriptor.title.as_deref(), Some("Turn Off"));
        assert!(descriptor.input_schema.is_some());
    }

    #[test]
    fn result_accessors() {
        let ok = ToolCallResult::Text("done".into());
        assert_eq!(ok.message(), "done");
        assert!(!ok.is_error());

        let err = ToolCallResult::Error("no such entity".into());
        assert_eq!(err.message(), "no such entity");
        assert!(err.is_error());
    }
}
