//! Chat Agent
//!
//! Ties the pieces together for one message at a time:
//!
//! 1. Route the message (keyword heuristic or forced execution)
//! 2. Dispatch to the execution adapter (blocking) or the generation
//!    provider (streaming)
//! 3. Persist the exchange in the transcript store
//! 4. Return the response text
//!
//! Backend failures come back as response strings. Only transcript
//! failures are returned as errors.

use sdk::errors::EngineError;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::interpreter::{ExecutionAdapter, SubprocessBackend};
use crate::llm::ollama::OllamaProvider;
use crate::llm::{LLMProvider, TokenSink};
use crate::router::{Route, TaskRouter};
use crate::transcript::{timestamp_now, LogName, TranscriptEntry, TranscriptStore};

/// Returned when generation produced no visible text
pub const FALLBACK_RESPONSE: &str = "I understand. How can I help you?";

/// Message-processing pipeline
pub struct ChatAgent {
    /// Routing heuristic
    router: TaskRouter,

    /// Streaming generation backend
    provider: Box<dyn LLMProvider>,

    /// Execution backend driver
    executor: ExecutionAdapter,

    /// Transcript persistence
    store: TranscriptStore,
}

impl ChatAgent {
    pub fn new(
        router: TaskRouter,
        provider: Box<dyn LLMProvider>,
        executor: ExecutionAdapter,
        store: TranscriptStore,
    ) -> Self {
        Self {
            router,
            provider,
            executor,
            store,
        }
    }

    /// Build the production pipeline: Ollama for generation, the configured
    /// agent program for execution
    pub fn from_config(config: &Config) -> Self {
        let provider = OllamaProvider::with_timeout(
            config.ollama.base_url.clone(),
            config.ollama.model.clone(),
            config.ollama.timeout(),
        );
        let backend = SubprocessBackend::new(
            config.interpreter.program.clone(),
            config.interpreter.args.clone(),
            config.interpreter.timeout(),
            config.execution_settings(),
        );

        info!(
            "Using Ollama at {} with model '{}'",
            config.ollama.base_url, config.ollama.model
        );
        info!(
            "Execution agent '{}' configured for local Ollama use",
            config.interpreter.program
        );

        Self::new(
            TaskRouter::new(&config.router.keywords),
            Box::new(provider),
            ExecutionAdapter::new(Box::new(backend)),
            TranscriptStore::new(&config.core.log_dir),
        )
    }

    /// Process one message to completion
    ///
    /// Generation tokens are pushed to `sink` as they arrive. Execution
    /// blocks the calling task until the agent returns.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Transcript` or `EngineError::Io` when the
    /// exchange cannot be persisted. Backend failures are reported through
    /// the returned string instead.
    pub async fn process_message(
        &mut self,
        message: &str,
        force_execution: bool,
        sink: &mut dyn TokenSink,
    ) -> Result<String, EngineError> {
        let route = self.router.route(message, force_execution);
        match (route, force_execution) {
            (Route::Execution, true) => info!("Routing to execution (forced)"),
            (Route::Execution, false) => info!(
                "Routing to execution (keyword '{}')",
                self.router.matched_keyword(message).unwrap_or_default()
            ),
            (Route::Generation, _) => info!("Routing to generation"),
        }

        match route {
            Route::Execution => self.execute_in_place(message),
            Route::Generation => self.generate(message, sink).await,
        }
    }

    /// Stream a reply from the generation backend and record it
    ///
    /// Writes a clean and a raw entry sharing one timestamp. A failed call
    /// records nothing.
    pub async fn generate(
        &mut self,
        message: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<String, EngineError> {
        let timestamp = timestamp_now();

        let outcome = match self.provider.generate_stream(message, sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Ollama streaming failed: {}", e);
                return Ok(format!("Error connecting to Ollama: {}", e));
            }
        };

        self.store.append(
            LogName::CleanGeneration,
            TranscriptEntry::new(timestamp.clone(), message, outcome.clean.clone()),
        )?;
        self.store.append(
            LogName::RawGeneration,
            TranscriptEntry::new(timestamp, message, outcome.raw),
        )?;

        if outcome.clean.is_empty() {
            warn!("Generation produced no visible text, using fallback");
            Ok(FALLBACK_RESPONSE.to_string())
        } else {
            Ok(outcome.clean)
        }
    }

    /// Run `execute` without stalling other tasks on a multi-thread runtime
    ///
    /// The worker hands its queued tasks to another thread for the duration
    /// of the call. A current-thread runtime has nowhere to hand them, so
    /// there the call simply blocks.
    fn execute_in_place(&mut self, task: &str) -> Result<String, EngineError> {
        let multi_thread = Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);

        if multi_thread {
            tokio::task::block_in_place(|| self.execute(task))
        } else {
            self.execute(task)
        }
    }

    /// Run a task on the execution backend and record it
    pub fn execute(&mut self, task: &str) -> Result<String, EngineError> {
        self.executor.execute(task, &self.store)
    }

    /// One-line description of the generation backend
    pub fn model_info(&self) -> String {
        format!(
            "Using model: {} at {}",
            self.provider.model(),
            self.provider.base_url()
        )
    }

    /// Whether the generation backend answers
    pub async fn check_health(&mut self) -> bool {
        self.provider.check_health().await
    }

    /// The transcript store this agent writes to
    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// The routing heuristic
    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    /// Release the generation backend's connection. Idempotent.
    pub fn close(&mut self) {
        self.provider.close();
    }
}
