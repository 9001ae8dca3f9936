//! Append-only transcript store
//!
//! Every exchange is recorded as a `TranscriptEntry` in one of a few named
//! logs. Each log is a single pretty-printed JSON array under the log
//! directory. Appending reads the whole array, pushes the entry, and replaces
//! the file through a temporary file and a rename, so the file on disk is
//! always a complete array.
//!
//! The store assumes a single writer. Two processes appending to the same log
//! race on the read-modify-write cycle and the last rename wins.

use chrono::Local;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Timestamp format written into entries
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Named logical logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogName {
    /// Generation responses with reasoning markers removed
    CleanGeneration,

    /// Generation responses exactly as streamed (trimmed)
    RawGeneration,

    /// Execution agent results
    Execution,
}

impl LogName {
    /// All logs, in a stable order
    pub const ALL: [LogName; 3] = [
        LogName::CleanGeneration,
        LogName::RawGeneration,
        LogName::Execution,
    ];

    /// File name of the log inside the log directory
    pub fn file_name(&self) -> &'static str {
        match self {
            LogName::CleanGeneration => "ollama_response_clean_log.json",
            LogName::RawGeneration => "ollama_response_raw_log.json",
            LogName::Execution => "open_interpreter_log.json",
        }
    }
}

/// One recorded exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Local wall-clock time the exchange started
    pub timestamp: String,

    /// Message the user sent
    #[serde(rename = "user")]
    pub input: String,

    /// Text the backend produced
    #[serde(rename = "response")]
    pub output: String,
}

impl TranscriptEntry {
    /// Create an entry with an explicit timestamp
    pub fn new(
        timestamp: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            input: input.into(),
            output: output.into(),
        }
    }

    /// Create an entry stamped with the current local time
    pub fn now(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(timestamp_now(), input, output)
    }
}

/// Current local time in the transcript timestamp format
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// File-backed transcript store
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    log_dir: PathBuf,
}

impl TranscriptStore {
    /// Create a store rooted at `log_dir`
    ///
    /// The directory is created lazily on the first append.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Directory holding the log files
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path of the file backing `log`
    pub fn path_for(&self, log: LogName) -> PathBuf {
        self.log_dir.join(log.file_name())
    }

    /// Read every entry of `log`, oldest first
    ///
    /// A log that has never been written is empty.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Transcript` if the file exists but cannot be read
    /// or is not a JSON array of entries.
    pub fn read(&self, log: LogName) -> Result<Vec<TranscriptEntry>, EngineError> {
        let path = self.path_for(log);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_entries(&path)
    }

    /// Append one entry to `log`
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Transcript` if the existing log cannot be parsed
    /// (the file is left untouched in that case) or if the replacement file
    /// cannot be written.
    pub fn append(&self, log: LogName, entry: TranscriptEntry) -> Result<(), EngineError> {
        fs::create_dir_all(&self.log_dir).map_err(|e| {
            EngineError::Transcript(format!(
                "Failed to create log directory {}: {}",
                self.log_dir.display(),
                e
            ))
        })?;

        let path = self.path_for(log);
        let mut entries = if path.exists() {
            read_entries(&path)?
        } else {
            Vec::new()
        };
        entries.push(entry);

        write_entries(&path, &entries)?;

        debug!(
            "Appended transcript entry to {} ({} entries)",
            log.file_name(),
            entries.len()
        );
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Vec<TranscriptEntry>, EngineError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        EngineError::Transcript(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        EngineError::Transcript(format!(
            "{} is not a valid transcript log: {}",
            path.display(),
            e
        ))
    })
}

/// Replace `path` with the serialized entries via temp file + rename
fn write_entries(path: &Path, entries: &[TranscriptEntry]) -> Result<(), EngineError> {
    let parent = path
        .parent()
        .ok_or_else(|| EngineError::Transcript("Log path has no parent directory".to_string()))?;

    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| EngineError::Transcript(format!("Failed to serialize log: {}", e)))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| EngineError::Transcript(format!("Failed to create temporary file: {}", e)))?;

    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| EngineError::Transcript(format!("Failed to write temporary file: {}", e)))?;

    tmp.persist(path).map_err(|e| {
        EngineError::Transcript(format!("Failed to replace {}: {}", path.display(), e))
    })?;

    Ok(())
}
