//! Streaming frame decoding
//!
//! Ollama streams newline-delimited JSON objects. `FrameDecoder` turns an
//! arbitrary chunking of the body into complete lines, and
//! `ResponseAssembler` parses each line independently, forwards token
//! fragments to the sink, and accumulates them in arrival order.
//!
//! A line that does not parse is dropped and decoding carries on with the
//! next one.

use serde::Deserialize;
use tracing::{debug, warn};

use super::TokenSink;

/// Opening reasoning marker emitted by some models
pub const REASONING_OPEN: &str = "<think>";

/// Closing reasoning marker emitted by some models
pub const REASONING_CLOSE: &str = "</think>";

/// One parsed line of an Ollama `/api/generate` stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OllamaFrame {
    /// Token fragment
    #[serde(default)]
    pub response: Option<String>,

    /// Set on the final frame
    #[serde(default)]
    pub done: bool,

    /// Error reported by the backend mid-stream
    #[serde(default)]
    pub error: Option<String>,

    /// Number of generated tokens (final frame only)
    #[serde(default)]
    pub eval_count: Option<u64>,

    /// Total generation time in nanoseconds (final frame only)
    #[serde(default)]
    pub total_duration: Option<u64>,
}

impl OllamaFrame {
    /// Parse one line; `None` for blank or malformed lines
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("Skipping malformed frame ({}): {:.80}", e, line);
                None
            }
        }
    }
}

/// Longest line kept in memory: 1 MiB
///
/// A single Ollama frame carries one token plus metadata, so anything near
/// this size is a broken stream.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Splits a byte stream into lines
///
/// Bytes are buffered until a newline arrives, so lines split across chunks
/// (including inside a multi-byte UTF-8 sequence) come out whole. A line
/// longer than the cap is dropped up to its newline.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line_bytes: usize,
    /// Inside an oversized line, dropping bytes until the next newline
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty decoder with a custom line cap
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed a chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let newline = search_from + offset;
            if self.discarding {
                self.discarding = false;
            } else {
                lines.push(String::from_utf8_lossy(&self.buffer[line_start..newline]).into_owned());
            }
            line_start = newline + 1;
            search_from = line_start;
        }
        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            if !self.discarding {
                warn!("Dropping frame longer than {} bytes", self.max_line_bytes);
            }
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        lines
    }

    /// Flush a trailing line that never got its newline
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || self.buffer.is_empty() {
            self.buffer.clear();
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Clean and raw variants of an assembled response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Reasoning markers removed, whitespace trimmed
    pub clean: String,

    /// Whitespace trimmed only
    pub raw: String,
}

impl StreamOutcome {
    /// Derive both variants from the accumulated fragments
    pub fn from_accumulated(text: &str) -> Self {
        Self {
            clean: strip_reasoning_markers(text).trim().to_string(),
            raw: text.trim().to_string(),
        }
    }
}

/// Remove every reasoning marker, keeping the text between them
pub fn strip_reasoning_markers(text: &str) -> String {
    text.replace(REASONING_OPEN, "").replace(REASONING_CLOSE, "")
}

/// Assembles a streamed response frame by frame
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    decoder: FrameDecoder,
    text: String,
    frames: usize,
    skipped: usize,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the response body
    pub fn feed(&mut self, chunk: &[u8], sink: &mut dyn TokenSink) {
        for line in self.decoder.push(chunk) {
            self.ingest_line(&line, sink);
        }
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines dropped as malformed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Close the stream and produce the outcome
    pub fn finish(mut self, sink: &mut dyn TokenSink) -> StreamOutcome {
        if let Some(line) = self.decoder.finish() {
            self.ingest_line(&line, sink);
        }
        sink.finish();

        debug!(
            "Stream finished: {} frames, {} skipped, {} chars",
            self.frames,
            self.skipped,
            self.text.len()
        );
        StreamOutcome::from_accumulated(&self.text)
    }

    fn ingest_line(&mut self, line: &str, sink: &mut dyn TokenSink) {
        if line.trim().is_empty() {
            return;
        }
        let Some(frame) = OllamaFrame::parse(line) else {
            self.skipped += 1;
            return;
        };
        self.frames += 1;

        if let Some(error) = &frame.error {
            warn!("Backend reported an error mid-stream: {}", error);
        }

        if let Some(token) = frame.response.as_deref().filter(|t| !t.is_empty()) {
            sink.emit(token);
            self.text.push_str(token);
        }

        if frame.done {
            debug!(
                "Final frame: eval_count={:?}, total_duration={:?}ns",
                frame.eval_count, frame.total_duration
            );
        }
    }
}
