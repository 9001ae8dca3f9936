//! CLI interface for Ferry
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use sdk::errors::{EngineError, FerryErrorExt};
use std::path::PathBuf;

/// Ferry chat agent
///
/// Routes messages between a local Ollama model and a code-execution agent,
/// and keeps a JSON transcript of every exchange.
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the interactive chat loop
    Chat,

    /// Process a single message and print the answer
    Ask {
        /// The message to send
        message: String,

        /// Send to the execution agent regardless of content
        #[arg(long)]
        exec: bool,
    },
}

impl Cli {
    /// The command to run, falling back to `chat`
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}

/// Render a fatal error for the terminal
///
/// Engine errors anywhere in the chain add their user hint. Errors that
/// cannot be recovered from are labelled as fatal.
pub fn failure_report(err: &anyhow::Error) -> String {
    let Some(engine_err) = err.chain().find_map(|e| e.downcast_ref::<EngineError>()) else {
        return format!("Error: {:#}", err);
    };

    let label = if engine_err.is_recoverable() {
        "Error"
    } else {
        "Fatal"
    };
    format!("{}: {:#}\nHint: {}", label, err, engine_err.user_hint())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_report_adds_hint() {
        let err = anyhow::Error::new(EngineError::Config("bad model".to_string()))
            .context("Failed to load configuration");
        let report = failure_report(&err);

        assert!(report.starts_with("Error: Failed to load configuration: "));
        assert!(report.contains("bad model"));
        assert!(report.ends_with("Hint: Check your config.toml file for errors"));
    }

    #[test]
    fn test_failure_report_marks_transcript_errors_fatal() {
        let err = anyhow::Error::new(EngineError::Transcript("corrupt log".to_string()))
            .context("Chat loop failed");
        let report = failure_report(&err);

        assert!(report.starts_with("Fatal: Chat loop failed"));
        assert!(report.contains("Hint: Transcript log could not be written"));
    }

    #[test]
    fn test_failure_report_plain_error() {
        let err = anyhow::anyhow!("Message is empty");
        assert_eq!(failure_report(&err), "Error: Message is empty");
    }

    #[test]
    fn test_cli_defaults_to_chat() {
        let cli = Cli::parse_from(["ferry"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.resolved_command(), Command::Chat);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["ferry", "--log", "debug", "chat"]);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert_eq!(cli.resolved_command(), Command::Chat);
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::parse_from(["ferry", "ask", "what is the capital of France"]);
        if let Some(Command::Ask { message, exec }) = cli.command {
            assert_eq!(message, "what is the capital of France");
            assert!(!exec);
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_ask_forced_execution() {
        let cli = Cli::parse_from([
            "ferry",
            "ask",
            "--exec",
            "show disk usage",
            "--config",
            "/tmp/ferry.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ferry.toml")));
        assert_eq!(
            cli.resolved_command(),
            Command::Ask {
                message: "show disk usage".to_string(),
                exec: true
            }
        );
    }
}
