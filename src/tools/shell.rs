//! Shell tool
//!
//! Runs a command in the workspace with a hard timeout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::core::{ToolDefinition, ToolErrorKind, ToolOutput};
use crate::tools::fs::Workspace;
use crate::tools::registry::ToolHandler;

/// Output beyond this many bytes per stream is cut
const MAX_STREAM_BYTES: usize = 16 * 1024;

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Execute a shell command
pub struct RunCommandTool {
    workspace: Workspace,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(workspace: Workspace, timeout: Duration) -> Self {
        Self { workspace, timeout }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::function(
            "run_command",
            "Run a shell command in the project root and return its output",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Command line passed to the system shell"
                    },
                    "timeout_secs": {
                        "type": "integer",
                        "description": "Seconds before the command is killed"
                    }
                },
                "required": ["command"]
            }),
        )
    }

    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

fn clip(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_STREAM_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_STREAM_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n... [truncated]", &text[..cut])
}

#[async_trait]
impl ToolHandler for RunCommandTool {
    async fn call(&self, arguments: &Value) -> ToolOutput {
        let args: RunCommandArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => return ToolOutput::failure(ToolErrorKind::ValidationError, e.to_string()),
        };

        if args.command.trim().is_empty() {
            return ToolOutput::failure(ToolErrorKind::ValidationError, "command is empty");
        }

        // Never wait longer than the configured bound, whatever the model asks for.
        let limit = args
            .timeout_secs
            .map(Duration::from_secs)
            .map_or(self.timeout, |requested| requested.min(self.timeout));

        let mut cmd = Self::shell(&args.command);
        cmd.current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ToolOutput::error(format!("Failed to start command: {}", e)),
            Err(_) => {
                return ToolOutput::failure(
                    ToolErrorKind::Timeout,
                    format!("Command timed out after {}s", limit.as_secs()),
                )
            }
        };

        let stdout = clip(&output.stdout);
        let stderr = clip(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());

        let mut report = format!("exit code: {}", code);
        if !stdout.is_empty() {
            report.push_str(&format!("\nstdout:\n{}", stdout));
        }
        if !stderr.is_empty() {
            report.push_str(&format!("\nstderr:\n{}", stderr));
        }

        if output.status.success() {
            ToolOutput::success(report)
        } else {
            ToolOutput::error(report)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(timeout: Duration) -> RunCommandTool {
        RunCommandTool::new(Workspace::new(std::env::temp_dir()), timeout)
    }

    #[tokio::test]
    async fn test_successful_command() {
        let out = tool(Duration::from_secs(5))
            .call(&json!({"command": "echo hello"}))
            .await;
        assert!(out.ok);
        assert!(out.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code() {
        let out = tool(Duration::from_secs(5))
            .call(&json!({"command": "exit 3"}))
            .await;
        assert!(!out.ok);
        assert!(out.error_message.unwrap().contains("exit code: 3"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let out = tool(Duration::from_millis(100))
            .call(&json!({"command": "sleep 5"}))
            .await;
        assert_eq!(out.error_kind.as_deref(), Some("timeout"));
    }
}
