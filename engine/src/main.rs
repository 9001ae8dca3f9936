// Ferry chat agent
// Main entry point for the ferry binary

use anyhow::Context;
use clap::Parser;
use ferry_engine::agent::ChatAgent;
use ferry_engine::cli::{failure_report, Cli, Command};
use ferry_engine::config::Config;
use ferry_engine::llm::StdoutSink;
use ferry_engine::repl;
use ferry_engine::telemetry::init_telemetry_with_level;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", failure_report(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)
    } else {
        Config::load_or_create()
    }
    .context("Failed to load configuration")?;

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!("Ferry v{}", env!("CARGO_PKG_VERSION"));

    let mut agent = ChatAgent::from_config(&config);
    if !agent.check_health().await {
        tracing::warn!(
            "Ollama is not reachable at {}. Generation requests will fail until it is running.",
            config.ollama.base_url
        );
    }

    let result = run_command(&mut agent, cli.resolved_command()).await;

    // Release the HTTP session on every path
    agent.close();
    result
}

async fn run_command(agent: &mut ChatAgent, command: Command) -> anyhow::Result<()> {
    let mut sink = StdoutSink;

    match command {
        Command::Chat => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            repl::run(agent, stdin, &mut stdout, &mut sink)
                .await
                .context("Chat loop failed")?;
        }

        Command::Ask { message, exec } => {
            let message = message.trim();
            if message.is_empty() {
                anyhow::bail!("Message is empty");
            }
            let answer = agent
                .process_message(message, exec, &mut sink)
                .await
                .context("Failed to record the exchange")?;
            println!("\nAssistant: {}", answer);
        }
    }

    Ok(())
}
