//! Interactive chat loop
//!
//! Line-oriented front end for [`ChatAgent`]. Each line read from the input
//! is one command or one message; the answer is written back before the
//! next line is read.

use sdk::errors::EngineError;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::agent::ChatAgent;
use crate::llm::TokenSink;

/// Printed on start and in response to `/help`
pub const HELP_TEXT: &str = "/oi <msg>: Force interpreter\n/model: Show model info\n/quit: Exit";

const BANNER: &str = "=== Chat Agent (Ollama + Open Interpreter) ===";
const PROMPT: &str = "You: ";

/// One parsed input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Quit,
    Help,
    Model,
    /// Run on the execution agent regardless of content
    Force(&'a str),
    Empty,
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => ReplCommand::Empty,
            "/quit" | "exit" => ReplCommand::Quit,
            "/help" => ReplCommand::Help,
            "/model" => ReplCommand::Model,
            _ => match line.strip_prefix("/oi") {
                // "/oi" alone carries no task
                Some("") => ReplCommand::Empty,
                Some(rest) if rest.starts_with(char::is_whitespace) => {
                    ReplCommand::Force(rest.trim())
                }
                _ => ReplCommand::Message(line),
            },
        }
    }
}

/// Run the loop until `/quit` or end of input
///
/// Streamed tokens go to `sink`; prompts and answers go to `output`.
///
/// # Errors
///
/// Stops at the first transcript or I/O error. The caller stays
/// responsible for closing the agent.
pub async fn run<R, W>(
    agent: &mut ChatAgent,
    input: R,
    output: &mut W,
    sink: &mut dyn TokenSink,
) -> Result<(), EngineError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(output, "\n{}", BANNER)?;
    writeln!(output, "Commands: /oi <msg>, /model, /help, /quit")?;

    let mut lines = input.lines();
    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("Input closed, leaving chat loop");
            writeln!(output)?;
            break;
        };

        let answer = match ReplCommand::parse(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Empty => continue,
            ReplCommand::Help => {
                writeln!(output, "{}", HELP_TEXT)?;
                continue;
            }
            ReplCommand::Model => {
                writeln!(output, "{}", agent.model_info())?;
                continue;
            }
            ReplCommand::Force(task) => agent.process_message(task, true, sink).await?,
            ReplCommand::Message(message) => agent.process_message(message, false, sink).await?,
        };

        writeln!(output, "\nAssistant: {}", answer)?;
    }

    Ok(())
}
