//! CLI commands
//!
//! Special commands that can be executed in the REPL. A bare word is a
//! command only when it is the whole line (`status`); commands with arguments
//! take a leading slash (`/model openai/gpt-4o`). Everything else is a message
//! for the agent.

use std::path::PathBuf;

use crate::agent::Orchestrator;
use crate::core::{Result, Role, Turn, TurnContent};
use crate::llm::get_model_presets;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Clear history
    Clear,
    /// No output needed
    None,
}

const COMMANDS: &[&str] = &[
    "exit", "quit", "q", "clear", "reset", "help", "?", "status", "usage", "cost", "history",
    "model", "models", "save", "load", "debug",
];

/// Split a line into a command and its argument, if it is a command at all
fn parse(input: &str) -> Option<(String, &str)> {
    let (slashed, body) = match input.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let mut parts = body.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default().to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    if slashed || (args.is_empty() && COMMANDS.contains(&cmd.as_str())) {
        Some((cmd, args))
    } else {
        None
    }
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, agent: &mut Orchestrator) -> Result<CommandResult> {
    let input = input.trim();
    let Some((cmd, args)) = parse(input) else {
        return Ok(CommandResult::Continue(input.to_string()));
    };

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            agent.clear();
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "status" => Ok(CommandResult::Handled(status_text(agent))),

        "usage" | "cost" => Ok(CommandResult::Handled(usage_text(agent))),

        "history" => {
            let n = if args.is_empty() {
                10
            } else {
                match args.parse::<usize>() {
                    Ok(n) => n,
                    Err(_) => {
                        return Ok(CommandResult::Handled(
                            "Usage: /history [number of turns]".to_string(),
                        ))
                    }
                }
            };
            Ok(CommandResult::Handled(history_text(agent.history(), n)))
        }

        "model" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled(format!(
                    "Current model: {}",
                    agent.model_id()
                )));
            }
            let confirmation = agent.switch_model(args)?;
            Ok(CommandResult::Handled(confirmation))
        }

        "models" => Ok(CommandResult::Handled(models_text(agent).await)),

        "save" => {
            let path = path_or_default(args, agent);
            agent.save(&path)?;
            Ok(CommandResult::Handled(format!(
                "Session saved to {}",
                path.display()
            )))
        }

        "load" => {
            let path = path_or_default(args, agent);
            agent.load(&path)?;
            Ok(CommandResult::Handled(format!(
                "Session loaded from {} ({} turns, model {})",
                path.display(),
                agent.history().len(),
                agent.model_id()
            )))
        }

        "debug" => {
            let new_state = !agent.is_debug();
            agent.set_debug(new_state);
            Ok(CommandResult::Handled(format!(
                "Debug mode: {}",
                if new_state { "ON" } else { "OFF" }
            )))
        }

        _ => Ok(CommandResult::Handled(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            cmd
        ))),
    }
}

fn path_or_default(args: &str, agent: &Orchestrator) -> PathBuf {
    if args.is_empty() {
        agent.config().snapshot_path()
    } else {
        PathBuf::from(args)
    }
}

/// Generate help text
fn help_text() -> String {
    r#"Codewright Commands:
---------------------------------------------
  help, ?            Show this help message
  exit, quit, q      Exit Codewright
  clear, reset       Clear history and usage counters
  status             Show current configuration
  usage, cost        Show token usage and cost for this session
  history            Show the last 10 turns
  /history <n>       Show the last n turns
  model              Show the active model
  /model <id>        Switch model for future turns
  models             List known models and their rates
  save, /save <path> Save a snapshot (default: snapshot file)
  load, /load <path> Load a snapshot (default: snapshot file)
  debug              Toggle per-turn details

Keyboard Shortcuts:
  Ctrl+C           Cancel the current turn
  Ctrl+D           Exit Codewright
---------------------------------------------"#
        .to_string()
}

fn status_text(agent: &Orchestrator) -> String {
    let config = agent.config();
    format!(
        "Codewright Status:\n\
         -----------------------------\n\
         Provider:   {}\n\
         Model:      {}\n\
         Workspace:  {}\n\
         Session:    {}\n\
         Snapshot:   {}\n\
         History:    {} turns\n\
         Tools:      {}\n\
         Autosave:   {}\n\
         Debug:      {}",
        agent.provider_name(),
        agent.model_id(),
        config.agent.workspace.display(),
        config.session_path().display(),
        config.snapshot_path().display(),
        agent.history().len(),
        agent.tool_names().join(", "),
        if config.agent.autosave { "on" } else { "off" },
        if agent.is_debug() { "on" } else { "off" }
    )
}

fn usage_text(agent: &Orchestrator) -> String {
    let usage = agent.usage_summary();
    format!(
        "Session usage:\n  Input tokens:  {}\n  Output tokens: {}\n  Cost:          ${:.4}",
        usage.input_tokens, usage.output_tokens, usage.cost
    )
}

/// One line per turn for the last `n` turns
pub fn history_text(turns: &[Turn], n: usize) -> String {
    if turns.is_empty() {
        return "History is empty.".to_string();
    }

    let start = turns.len().saturating_sub(n);
    let mut output = format!("Showing {} of {} turns:", turns.len() - start, turns.len());

    for (i, turn) in turns.iter().enumerate().skip(start) {
        let line = match &turn.content {
            TurnContent::Text { text } => {
                let mut line = format!("[{}] {}: {}", i + 1, turn.role, preview(text));
                if turn.role == Role::Assistant {
                    if let (Some(model), Some(cost)) = (&turn.model_id, turn.cost) {
                        line.push_str(&format!(
                            "  ({}, {} in / {} out, ${:.4})",
                            model,
                            turn.input_tokens.unwrap_or(0),
                            turn.output_tokens.unwrap_or(0),
                            cost
                        ));
                    }
                }
                line
            }
            TurnContent::ToolExchange { call, result } => {
                let status = if result.ok {
                    "ok".to_string()
                } else {
                    result
                        .error_kind
                        .map(|k| k.to_string())
                        .unwrap_or_else(|| "failed".to_string())
                };
                format!(
                    "[{}] tool: {} {} (attempt {}): {}",
                    i + 1,
                    call.name,
                    call.arguments,
                    result.attempt,
                    status
                )
            }
        };
        output.push('\n');
        output.push_str(&line);
    }
    output
}

fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    let clipped: String = first.chars().take(80).collect();
    if clipped.len() < text.len() {
        format!("{}...", clipped)
    } else {
        clipped
    }
}

async fn models_text(agent: &Orchestrator) -> String {
    let mut output = String::from("Known models (USD per 1M tokens in / out):\n");
    for preset in get_model_presets() {
        let marker = if preset.id == agent.model_id() { "*" } else { " " };
        output.push_str(&format!(
            "{} {:<28} ${:>6.2} / ${:>6.2}  {}\n",
            marker,
            preset.id,
            preset.input_per_million,
            preset.output_per_million,
            preset.display_name
        ));
    }

    match agent.list_models().await {
        Ok(models) if !models.is_empty() => {
            output.push_str(&format!("\nServed by {}:\n", agent.provider_name()));
            for model in models.iter().take(30) {
                output.push_str(&format!("  - {}\n", model));
            }
            if models.len() > 30 {
                output.push_str(&format!("  ... and {} more\n", models.len() - 30));
            }
        }
        Ok(_) => {}
        Err(e) => output.push_str(&format!("\n(Could not list provider models: {})\n", e)),
    }

    output.push_str(&format!("\nCurrent: {}", agent.model_id()));
    output
}
