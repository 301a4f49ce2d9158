//! Interactive REPL for Codewright
//!
//! Provides the main user interaction loop. Ctrl+C during a turn cancels it
//! and leaves the session as it was before the message was sent.

use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::{AssistantResponse, Orchestrator};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, ProviderType, Result};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Orchestrator,
    /// Model named on the command line; beats the one in a restored session
    pinned_model: Option<String>,
}

impl Repl {
    /// Create a REPL around an orchestrator
    pub fn new(agent: Orchestrator) -> Self {
        Self {
            agent,
            pinned_model: None,
        }
    }

    /// Keep `model` active even if the autosaved session used another one
    pub fn with_pinned_model(mut self, model: Option<String>) -> Self {
        self.pinned_model = model;
        self
    }

    pub fn agent(&self) -> &Orchestrator {
        &self.agent
    }

    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self::new(Orchestrator::new(config)?))
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();
        self.restore_session();

        print!("Initializing...");
        io::stdout().flush()?;

        // Checked after the restore so the model actually in use is verified
        match self.agent.initialize().await {
            Ok(()) => println!(" Ready!\n"),
            Err(e) => {
                println!("\n\nInitialization Error: {}\n", e);
                return Ok(());
            }
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("You: ");
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nGoodbye!");
                    break;
                }
            };

            let input = match line {
                Ok(Some(input)) => input,
                Ok(None) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            };

            if !self.handle_line(&input).await {
                println!("\nGoodbye!");
                break;
            }
        }

        Ok(())
    }

    /// Handle one line of input; returns false when the user asked to exit
    pub async fn handle_line(&mut self, input: &str) -> bool {
        let input = input.trim();
        if input.is_empty() {
            return true;
        }

        match handle_command(input, &mut self.agent).await {
            Ok(CommandResult::Exit) => return false,
            Ok(CommandResult::Clear) => {
                println!("Conversation cleared.\n");
                self.autosave();
            }
            Ok(CommandResult::Handled(output)) => {
                println!("{}\n", output);
            }
            Ok(CommandResult::None) => {}
            Ok(CommandResult::Continue(input)) => self.process(&input).await,
            Err(e) => {
                eprintln!("Command error: {}\n", e);
            }
        }
        true
    }

    /// Run one message, racing it against Ctrl+C
    async fn process(&mut self, input: &str) {
        let outcome = tokio::select! {
            result = self.agent.submit_detailed(input) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(response)) => {
                println!("\nAssistant:\n{}\n", response.text);
                if self.agent.is_debug() {
                    println!("{}\n", turn_details(&response));
                }
                self.autosave();
            }
            Some(Err(e)) => {
                eprintln!("\nError: {}\n", e);
            }
            None => {
                println!("\nCancelled. The message was not added to the conversation.\n");
            }
        }
    }

    /// Restore the autosaved session, if autosave is on
    fn restore_session(&mut self) {
        let config = self.agent.config();
        if !config.agent.autosave {
            return;
        }

        let path = config.session_path();
        match self.agent.resume(&path, self.pinned_model.as_deref()) {
            Ok(true) => println!(
                "Loaded previous session from {} ({} turns, model {})\n",
                path.display(),
                self.agent.history().len(),
                self.agent.model_id()
            ),
            Ok(false) => println!("Session will be saved to {}\n", path.display()),
            Err(e) => eprintln!("Warning: could not load {}: {}\n", path.display(), e),
        }
    }

    fn autosave(&self) {
        let config = self.agent.config();
        if !config.agent.autosave {
            return;
        }
        let path = config.session_path();
        if let Err(e) = self.agent.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Autosave failed");
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();

        println!(
            r#"
+-----------------------------------------------------------+
|                                                           |
|   CODEWRIGHT                                              |
|   Conversational coding agent                             |
|                                                           |
+-----------------------------------------------------------+
"#
        );
        println!("Provider:   {}", self.agent.provider_name());
        if config.provider == ProviderType::Ollama {
            println!("Ollama:     {}", config.ollama_url());
        }
        println!("Model:      {}", self.agent.model_id());
        println!("Workspace:  {}", config.agent.workspace.display());
        println!();
        println!("Commands: help, status, usage, history, models, clear, exit");
        println!("-----------------------------------------------------------");
    }
}

fn turn_details(response: &AssistantResponse) -> String {
    format!(
        "[{} round trip(s), {} tool call(s), {} in / {} out tokens, ${:.4}{}]",
        response.round_trips,
        response.tool_turns,
        response.input_tokens,
        response.output_tokens,
        response.cost,
        if response.exhausted {
            ", round limit reached"
        } else {
            ""
        }
    )
}
