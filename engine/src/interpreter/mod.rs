//! Execution Adapter
//!
//! Drives an `ExecutionBackend` for one task: clear its conversation state,
//! run the task to completion, reduce the records it returns to a single
//! response string, and record the exchange in the execution log.
//!
//! Backend failures never leave this module as errors. They come back as an
//! `[Error] Interpreter failed: ...` response and nothing is logged for them.
//! Transcript failures do propagate.

use sdk::errors::EngineError;
use sdk::execution::{ExecutionBackend, ResultRecord};
use tracing::{error, info};

use crate::transcript::{timestamp_now, LogName, TranscriptEntry, TranscriptStore};

pub mod subprocess;

pub use subprocess::SubprocessBackend;

/// Response used when a run produced nothing to show
pub const TASK_COMPLETED: &str = "Task completed.";

/// Reduce a run's records to one response string
///
/// The last record decides. Content beats output, and anything else is
/// stringified. An empty run or an empty result gives `TASK_COMPLETED`.
pub fn normalize(records: &[ResultRecord]) -> String {
    match records.last() {
        Some(record) => {
            let text = record.text();
            if text.is_empty() {
                TASK_COMPLETED.to_string()
            } else {
                text
            }
        }
        None => TASK_COMPLETED.to_string(),
    }
}

/// Runs tasks on an execution backend and records the results
pub struct ExecutionAdapter {
    backend: Box<dyn ExecutionBackend>,
}

impl ExecutionAdapter {
    pub fn new(backend: Box<dyn ExecutionBackend>) -> Self {
        Self { backend }
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The wrapped backend
    pub fn backend(&self) -> &dyn ExecutionBackend {
        self.backend.as_ref()
    }

    /// Execute one task
    ///
    /// Blocks until the backend returns.
    ///
    /// # Errors
    ///
    /// Only transcript persistence errors are returned. Backend failures are
    /// reported through the returned string.
    pub fn execute(&mut self, task: &str, store: &TranscriptStore) -> Result<String, EngineError> {
        info!("Executing with {}: {}", self.backend.name(), task);

        let records = match self.run_fresh(task) {
            Ok(records) => records,
            Err(e) => {
                error!("Interpreter failed: {}", e);
                return Ok(format!("[Error] Interpreter failed: {}", e));
            }
        };

        let response = normalize(&records);
        store.append(
            LogName::Execution,
            TranscriptEntry::new(timestamp_now(), task, response.clone()),
        )?;

        info!(
            "Execution finished ({} records, {} chars)",
            records.len(),
            response.len()
        );
        Ok(response)
    }

    fn run_fresh(&mut self, task: &str) -> Result<Vec<ResultRecord>, EngineError> {
        self.backend.reset()?;
        self.backend.run(task)
    }
}
