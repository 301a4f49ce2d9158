//! File tools
//!
//! `read_file`, `write_file` and `list_directory`, confined to a workspace root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{ToolDefinition, ToolErrorKind, ToolOutput};
use crate::tools::registry::ToolHandler;

/// Largest file `read_file` returns in full
const MAX_READ_BYTES: usize = 256 * 1024;

/// Directory the file tools are allowed to touch
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(format!("path '{}' escapes the workspace", path));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("path '{}' must be relative to the workspace", path));
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolOutput> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| ToolOutput::failure(ToolErrorKind::ValidationError, e.to_string()))
}

fn resolve(workspace: &Workspace, path: &str) -> Result<PathBuf, ToolOutput> {
    workspace
        .resolve(path)
        .map_err(|e| ToolOutput::failure(ToolErrorKind::ValidationError, e))
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

/// Read a text file
pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            "read_file",
            "Read a text file from the project. Read a file before changing it.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    }
                },
                "required": ["path"]
            }),
        )
    }

    async fn read(&self, arguments: &Value) -> Result<ToolOutput, ToolOutput> {
        let args: ReadFileArgs = parse_args(arguments)?;
        let path = resolve(&self.workspace, &args.path)?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ToolOutput::error(format!("Cannot read '{}': {}", args.path, e))
        })?;

        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.len() > MAX_READ_BYTES {
            let mut cut = MAX_READ_BYTES;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push_str("\n... [truncated]");
        }
        Ok(ToolOutput::success(text))
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, arguments: &Value) -> ToolOutput {
        self.read(arguments).await.unwrap_or_else(|e| e)
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
    #[serde(default)]
    overwrite: Option<bool>,
}

/// Create or replace a file
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            "write_file",
            "Write a file. Fails if the file exists unless overwrite is true.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full file contents"
                    },
                    "overwrite": {
                        "type": "boolean",
                        "description": "Replace the file if it already exists"
                    }
                },
                "required": ["path", "content"]
            }),
        )
    }

    async fn write(&self, arguments: &Value) -> Result<ToolOutput, ToolOutput> {
        let args: WriteFileArgs = parse_args(arguments)?;
        let path = resolve(&self.workspace, &args.path)?;
        let overwrite = args.overwrite.unwrap_or(false);

        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if exists && !overwrite {
            return Err(ToolOutput::failure(
                ToolErrorKind::ExistsConflict,
                format!(
                    "File '{}' already exists; pass overwrite=true to replace it",
                    args.path
                ),
            ));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolOutput::error(format!("Cannot create directory for '{}': {}", args.path, e))
            })?;
        }

        tokio::fs::write(&path, args.content.as_bytes())
            .await
            .map_err(|e| ToolOutput::error(format!("Cannot write '{}': {}", args.path, e)))?;

        let verb = if exists { "Overwrote" } else { "Created" };
        Ok(ToolOutput::success(format!(
            "{} {} ({} bytes)",
            verb,
            args.path,
            args.content.len()
        )))
    }
}

#[async_trait]
impl ToolHandler for WriteFileTool {
    async fn call(&self, arguments: &Value) -> ToolOutput {
        self.write(arguments).await.unwrap_or_else(|e| e)
    }
}

#[derive(Deserialize)]
struct ListDirectoryArgs {
    #[serde(default)]
    path: Option<String>,
}

/// List the entries of a directory
pub struct ListDirectoryTool {
    workspace: Workspace,
}

impl ListDirectoryTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            "list_directory",
            "List files and directories in a project directory",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory relative to the project root (default: root)"
                    }
                }
            }),
        )
    }

    async fn list(&self, arguments: &Value) -> Result<ToolOutput, ToolOutput> {
        let args: ListDirectoryArgs = parse_args(arguments)?;
        let shown = args.path.unwrap_or_else(|| ".".to_string());
        let path = resolve(&self.workspace, &shown)?;

        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| ToolOutput::error(format!("Cannot list '{}': {}", shown, e)))?;

        let mut entries = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|t| t.is_dir())
                        .unwrap_or(false);
                    entries.push(if is_dir { format!("{}/", name) } else { name });
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(ToolOutput::error(format!("Cannot list '{}': {}", shown, e)));
                }
            }
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolOutput::success(format!("{} is empty", shown)));
        }
        Ok(ToolOutput::success(entries.join("\n")))
    }
}

#[async_trait]
impl ToolHandler for ListDirectoryTool {
    async fn call(&self, arguments: &Value) -> ToolOutput {
        self.list(arguments).await.unwrap_or_else(|e| e)
    }
}
