//! Task Router
//!
//! Decides whether a message goes to the execution agent or to the
//! generation backend. Classification is a case-insensitive substring match
//! against a fixed keyword set: any hit means the message asks for file or
//! system work and is routed to execution. Callers can force execution.
//!
//! Routing is pure and deterministic. Empty input matches nothing and is
//! routed to generation; callers are expected to drop empty input first.

use std::fmt;

/// Keywords that mark a message as an execution task
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "file", "folder", "create", "write", "save", "list", "delete",
];

/// Backend a message is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Code-execution agent
    Execution,

    /// Streaming text generation
    Generation,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Execution => write!(f, "execution"),
            Route::Generation => write!(f, "generation"),
        }
    }
}

/// Keyword-based message classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRouter {
    /// Lower-cased routing keywords
    keywords: Vec<String>,
}

impl Default for TaskRouter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl TaskRouter {
    /// Create a router with a custom keyword set
    ///
    /// Keywords are lower-cased; blank keywords are dropped so they cannot
    /// match every message.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// The keywords this router matches on
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Pick the backend for a message
    ///
    /// `force_execution` overrides classification.
    pub fn route(&self, message: &str, force_execution: bool) -> Route {
        if force_execution || self.is_execution_task(message) {
            Route::Execution
        } else {
            Route::Generation
        }
    }

    /// Whether any routing keyword occurs in the message
    pub fn is_execution_task(&self, message: &str) -> bool {
        self.matched_keyword(message).is_some()
    }

    /// First keyword found in the message, if any
    pub fn matched_keyword(&self, message: &str) -> Option<&str> {
        let lowered = message.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| lowered.contains(keyword.as_str()))
            .map(String::as_str)
    }
}
