//! Generation backend layer
//!
//! This module provides the interface the chat agent uses to talk to a
//! streaming text-generation backend. The `LLMProvider` trait is the seam;
//! `ollama::OllamaProvider` is the implementation used in production and
//! tests substitute their own.
//!
//! Tokens are pushed to a `TokenSink` as they arrive so the caller can show
//! them live, while the provider assembles the full response into a
//! `StreamOutcome`.

use async_trait::async_trait;
use std::io::Write;

pub mod frames;
pub mod ollama;
pub mod session;

pub use frames::{strip_reasoning_markers, FrameDecoder, ResponseAssembler, StreamOutcome};

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,
}

/// Receiver for live token output
///
/// `emit` is called once per non-empty fragment, in arrival order.
/// `finish` is called once after the stream ends cleanly.
pub trait TokenSink: Send {
    /// Handle one token fragment
    fn emit(&mut self, token: &str);

    /// Called after the last fragment
    fn finish(&mut self) {}
}

/// Writes tokens to stdout as they arrive
#[derive(Debug, Default)]
pub struct StdoutSink;

impl TokenSink for StdoutSink {
    fn emit(&mut self, token: &str) {
        let mut stdout = std::io::stdout().lock();
        // Display only; a closed stdout must not abort the stream
        let _ = stdout.write_all(token.as_bytes());
        let _ = stdout.flush();
    }

    fn finish(&mut self) {
        println!();
    }
}

/// Discards tokens
#[derive(Debug, Default)]
pub struct NullSink;

impl TokenSink for NullSink {
    fn emit(&mut self, _token: &str) {}
}

impl TokenSink for Vec<String> {
    fn emit(&mut self, token: &str) {
        self.push(token.to_string());
    }
}

impl TokenSink for tokio::sync::mpsc::UnboundedSender<String> {
    fn emit(&mut self, token: &str) {
        // Receiver gone means nobody is watching; keep assembling anyway
        let _ = self.send(token.to_string());
    }
}

/// Streaming generation provider
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "ollama")
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Base URL of the backend
    fn base_url(&self) -> &str;

    /// Send one message and stream the reply
    ///
    /// Every non-empty token fragment is passed to `sink` as it arrives.
    ///
    /// # Returns
    /// * `Ok(StreamOutcome)` - Clean and raw variants of the assembled reply
    /// * `Err(LLMError)` - If connecting, sending, or reading the stream fails
    async fn generate_stream(
        &mut self,
        message: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<StreamOutcome>;

    /// Release network resources. Safe to call repeatedly.
    fn close(&mut self) {}

    /// Check if the provider is currently reachable
    /// Default implementation returns true.
    async fn check_health(&mut self) -> bool {
        true
    }
}
