//! Error types and handling
//!
//! This module provides the error types shared by the Ferry engine and
//! execution backends. All errors implement the `FerryErrorExt` trait which
//! provides user-friendly hints and indicates whether errors are recoverable.
//!
//! # Taxonomy
//!
//! Only transcript persistence faults are meant to reach the top of the
//! process. Execution and network faults are turned into user-facing text at
//! the component that owns them; they still travel through this type on the
//! way there so each boundary returns an explicit `Result`.

use thiserror::Error;

/// Trait for Ferry error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information.
pub trait FerryErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never echoes the
    /// underlying error text.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Transcript**: Log files that cannot be read, parsed, or written
/// - **Execution**: Failures raised by an execution backend
/// - **Network**: Transport failures talking to the generation backend
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, FerryErrorExt};
///
/// let error = EngineError::Execution("agent exited with status 1".into());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::Transcript("corrupt log".into());
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Transcript persistence errors
    #[error("Transcript error: {0}")]
    Transcript(String),

    // Execution backend errors
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Execution timed out after {0} seconds")]
    ExecutionTimeout(u64),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FerryErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Transcript(_) => "Transcript log could not be written. Check the log directory",
            Self::Execution(_) => "The execution agent failed. Check that it is installed",
            Self::ExecutionTimeout(_) => "The execution agent took too long. Try a smaller task",
            Self::Network(_) => "Network operation failed. Is Ollama running?",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Losing transcript entries is not acceptable
            Self::Transcript(_) => false,

            _ => true,
        }
    }
}
