//! HTTP session lifecycle
//!
//! Owns the `reqwest::Client` used for streaming calls. The client is built
//! on first use and reused until `close()`; after a close the next call
//! builds a fresh one.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{LLMError, Result};

/// Lazily created, explicitly released HTTP client
#[derive(Debug)]
pub struct HttpSession {
    client: Option<Client>,
    timeout: Duration,
}

impl HttpSession {
    /// Create a closed session whose client will use `timeout` per request
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: None,
            timeout,
        }
    }

    /// Get the client, building it if the session is closed
    pub fn client(&mut self) -> Result<&Client> {
        let client = match self.client.take() {
            Some(client) => client,
            None => {
                debug!("Opening HTTP session (timeout {}s)", self.timeout.as_secs());
                Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| {
                        LLMError::NetworkError(format!("Failed to create HTTP client: {}", e))
                    })?
            }
        };
        Ok(self.client.insert(client))
    }

    /// Whether a client currently exists
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Drop the client. No-op when already closed.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("HTTP session closed");
        }
    }
}
