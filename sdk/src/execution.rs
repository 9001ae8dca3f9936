//! Execution backend contract
//!
//! This module defines the `ExecutionBackend` trait that code-execution agents
//! implement, the immutable `ExecutionSettings` they are configured with, and
//! the `ResultRecord` shape their runs produce.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default system message handed to execution agents
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful assistant that can execute code and perform file operations. \
When asked to perform a task, write and execute the necessary code. \
Be direct and execute tasks without asking for confirmation. \
Never return empty json responses, always provide a valid JSON object.";

/// Configuration for an execution backend
///
/// Built once at startup and moved into the backend. Backends never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Run generated code without asking for confirmation
    pub auto_run: bool,

    /// Safety mode passed through to the agent ("off", "ask", "auto")
    pub safe_mode: String,

    /// Agent uses a local model
    pub local: bool,

    /// Agent must not reach the network for anything but the model
    pub offline: bool,

    /// Target model identifier (e.g. "ollama/llama3.1:8b")
    pub model: String,

    /// Base URL of the model server
    pub api_base: String,

    /// Whether the model accepts images
    pub supports_vision: bool,

    /// Whether the model supports native function calling
    pub supports_functions: bool,

    /// System prompt for the agent
    pub system_message: String,
}

impl ExecutionSettings {
    /// Settings for a local, offline agent driven by an Ollama model
    pub fn local_ollama(base_url: impl Into<String>, model: &str) -> Self {
        Self {
            auto_run: true,
            safe_mode: "off".to_string(),
            local: true,
            offline: true,
            model: format!("ollama/{}", model),
            api_base: base_url.into(),
            supports_vision: false,
            supports_functions: false,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
        }
    }

    /// Replace the system message
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = system_message.into();
        self
    }
}

/// One record produced by an execution run
///
/// Agents emit records of varying shape. The variants capture which field,
/// if any, carries the useful text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultRecord {
    /// Record with a `content` field
    Content(String),

    /// Record with an `output` field (and no usable `content`)
    Output(String),

    /// Anything else, kept verbatim
    Opaque(Value),
}

impl ResultRecord {
    /// Classify a JSON value, probing `content` first and `output` second
    pub fn from_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if let Some(text) = map.get("content").and_then(field_text) {
                return Self::Content(text);
            }
            if let Some(text) = map.get("output").and_then(field_text) {
                return Self::Output(text);
            }
        }
        Self::Opaque(value)
    }

    /// Text carried by this record
    pub fn text(&self) -> String {
        match self {
            Self::Content(text) | Self::Output(text) => text.clone(),
            Self::Opaque(Value::String(text)) => text.clone(),
            Self::Opaque(value) => value.to_string(),
        }
    }
}

impl From<Value> for ResultRecord {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// A field counts as present when it is neither null nor empty
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Trait that code-execution agents implement
///
/// Calls are synchronous: a run may write files or execute arbitrary code
/// and blocks until the agent is done.
pub trait ExecutionBackend: Send {
    /// Returns the name of the backend
    fn name(&self) -> &str;

    /// Settings the backend was constructed with
    fn settings(&self) -> &ExecutionSettings;

    /// Forget any conversation state from earlier runs
    fn reset(&mut self) -> Result<(), EngineError>;

    /// Run one task to completion and return the records it produced
    fn run(&mut self, task: &str) -> Result<Vec<ResultRecord>, EngineError>;
}
