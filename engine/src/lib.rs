//! Ferry Engine Library
//!
//! This library provides the core functionality of the Ferry chat agent.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Append-only JSON transcript logs
pub mod transcript;

/// Keyword-based task routing
pub mod router;

/// Streaming generation backend layer
pub mod llm;

/// Execution agent adapter
pub mod interpreter;

/// Message-processing pipeline
pub mod agent;

/// Interactive chat loop
pub mod repl;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;
