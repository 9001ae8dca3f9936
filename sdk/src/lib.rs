//! Ferry SDK
//!
//! Shared library providing the error taxonomy and the execution backend
//! contract. The engine consumes it, and out-of-tree execution agents can
//! implement it.

/// Error types and handling
pub mod errors;

/// Execution backend trait and result types
pub mod execution;

// Re-export commonly used types
pub use errors::{EngineError, FerryErrorExt};
pub use execution::{ExecutionBackend, ExecutionSettings, ResultRecord};
