//! Tool registry - manages and dispatches tool calls
//!
//! Central table mapping a tool name to its definition, category and handler.
//! The registry is read-only once the orchestrator is built.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{ToolCategory, ToolDefinition, ToolOutput};
use crate::tools::fs::{ListDirectoryTool, ReadFileTool, Workspace, WriteFileTool};
use crate::tools::shell::RunCommandTool;

/// Async body of a tool
///
/// Handlers never return `Err`: every outcome, including failure, is a
/// [`ToolOutput`]. Handlers that spawn processes enforce their own timeout.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Value) -> ToolOutput;
}

/// A registered tool
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub category: ToolCategory,
    pub handler: Arc<dyn ToolHandler>,
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in file and shell tools
    pub fn with_builtins(workspace: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        let workspace = Workspace::new(workspace);
        let mut registry = Self::new();

        registry.register(
            ReadFileTool::definition(),
            ToolCategory::FileSystem,
            Arc::new(ReadFileTool::new(workspace.clone())),
        );
        registry.register(
            WriteFileTool::definition(),
            ToolCategory::FileSystem,
            Arc::new(WriteFileTool::new(workspace.clone())),
        );
        registry.register(
            ListDirectoryTool::definition(),
            ToolCategory::FileSystem,
            Arc::new(ListDirectoryTool::new(workspace.clone())),
        );
        registry.register(
            RunCommandTool::definition(),
            ToolCategory::System,
            Arc::new(RunCommandTool::new(workspace, command_timeout)),
        );

        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        category: ToolCategory,
        handler: Arc<dyn ToolHandler>,
    ) {
        let name = definition.name().to_string();
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                category,
                handler,
            },
        );
    }

    /// Look up a tool
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Category of a tool
    pub fn category(&self, name: &str) -> Option<ToolCategory> {
        self.tools.get(name).map(|t| t.category)
    }

    /// All tool definitions, in name order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// Registered tool names, in name order
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Check arguments against a tool's JSON schema
///
/// Covers the subset tool schemas use: object shape, `required` keys,
/// primitive `type` of declared properties and `additionalProperties: false`.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let args = arguments
        .as_object()
        .ok_or_else(|| format!("arguments must be a JSON object, got {}", arguments))?;

    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            match args.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required argument '{}'", key));
                }
                Some(_) => {}
            }
        }
    }

    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in args {
        let declared = properties.and_then(|p| p.get(key));
        match declared {
            None if closed => return Err(format!("unexpected argument '{}'", key)),
            None => {}
            Some(prop) => {
                if value.is_null() {
                    continue;
                }
                if let Some(expected) = prop.get("type").and_then(Value::as_str) {
                    if !type_matches(expected, value) {
                        return Err(format!(
                            "argument '{}' must be of type {}, got {}",
                            key, expected, value
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "overwrite": {"type": "boolean"},
                "limit": {"type": "integer"}
            },
            "required": ["path"]
        })
    }

    #[test]
    fn test_valid_arguments() {
        assert!(validate_arguments(&schema(), &json!({"path": "a", "overwrite": true})).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &json!({"overwrite": true})).unwrap_err();
        assert!(err.contains("path"));
    }

    #[test]
    fn test_wrong_type() {
        let err = validate_arguments(&schema(), &json!({"path": 3})).unwrap_err();
        assert!(err.contains("string"));
        assert!(validate_arguments(&schema(), &json!({"path": "a", "limit": 1.5})).is_err());
    }

    #[test]
    fn test_non_object_arguments() {
        assert!(validate_arguments(&schema(), &json!("path=a")).is_err());
    }

    #[test]
    fn test_closed_schema_rejects_extras() {
        let mut closed = schema();
        closed["additionalProperties"] = json!(false);
        assert!(validate_arguments(&closed, &json!({"path": "a", "x": 1})).is_err());
        assert!(validate_arguments(&schema(), &json!({"path": "a", "x": 1})).is_ok());
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = ToolRegistry::with_builtins(".", Duration::from_secs(5));
        assert_eq!(
            registry.tool_names(),
            vec!["list_directory", "read_file", "run_command", "write_file"]
        );
        assert_eq!(registry.category("run_command"), Some(ToolCategory::System));
        assert!(!registry.contains("delete_everything"));
    }
}
