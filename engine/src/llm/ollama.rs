//! Ollama LLM Provider
//!
//! This module implements the LLMProvider trait for Ollama's streaming
//! `/api/generate` endpoint. Ollama runs models locally, typically at
//! http://localhost:11434.
//!
//! Key features:
//! - NDJSON streaming, consumed chunk by chunk without buffering the body
//! - Live token forwarding through a `TokenSink`
//! - Fixed prompt template and sampling options
//! - Lazily opened, explicitly closed HTTP session
//! - Error mapping to LLMError

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::frames::{ResponseAssembler, StreamOutcome};
use super::session::HttpSession;
use super::{LLMError, LLMProvider, Result, TokenSink};

/// Instruction prepended to every message
pub const SYSTEM_PROMPT: &str = "When asked for code, provide clean, well-formatted examples using the appropriate language. Add comments if necessary.";

/// Default request timeout, covering model load and full generation
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Sampling options sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_predict: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_p: 0.9,
            top_k: 40,
            num_predict: 4096,
        }
    }
}

/// Embed a user message in the prompt template
pub fn build_prompt(message: &str) -> String {
    format!("{}\n\nUser: {}\nAssistant:", SYSTEM_PROMPT, message)
}

/// Ollama provider configuration
#[derive(Debug)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// Model name to use (e.g., "llama3.1:8b")
    model: String,

    /// HTTP session for API requests
    session: HttpSession,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Arguments
    /// * `base_url` - Base URL for Ollama API (e.g., "http://localhost:11434")
    /// * `model` - Model name to use (e.g., "llama3.1:8b")
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(base_url, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            session: HttpSession::new(timeout),
        }
    }

    /// Whether the underlying HTTP session is open
    pub fn is_session_open(&self) -> bool {
        self.session.is_open()
    }

    fn map_send_error(&self, e: reqwest::Error) -> LLMError {
        if e.is_timeout() {
            LLMError::Timeout
        } else if e.is_connect() {
            LLMError::ProviderUnavailable(format!(
                "Cannot connect to Ollama at {}. Is Ollama running?",
                self.base_url
            ))
        } else {
            LLMError::NetworkError(e.to_string())
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn generate_stream(
        &mut self,
        message: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<StreamOutcome> {
        if self.model.is_empty() {
            return Err(LLMError::InvalidRequest("No Ollama model configured".to_string()));
        }

        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(message),
            stream: true,
            options: GenerationOptions::default(),
        };

        tracing::debug!(
            "Ollama request: model={}, prompt_chars={}",
            self.model,
            request.prompt.len()
        );

        let url = format!("{}/api/generate", self.base_url);
        let start = Instant::now();
        let sent = self.session.client()?.post(&url).json(&request).send().await;
        let response = sent.map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::HttpStatus { status, body });
        }

        let mut assembler = ResponseAssembler::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout
                } else {
                    LLMError::NetworkError(format!("Stream interrupted: {}", e))
                }
            })?;
            assembler.feed(&chunk, sink);
        }

        let outcome = assembler.finish(sink);
        tracing::info!(
            "Ollama stream completed in {:.1}s ({} chars)",
            start.elapsed().as_secs_f64(),
            outcome.raw.len()
        );
        Ok(outcome)
    }

    fn close(&mut self) {
        self.session.close();
    }

    async fn check_health(&mut self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let client = match self.session.client() {
            Ok(client) => client,
            Err(_) => return false,
        };
        match client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

/// Ollama `/api/generate` request body
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerationOptions,
}
