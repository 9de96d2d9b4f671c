//! Startup readiness probe.
//!
//! A single-threaded blocking poll that gates the container: nothing
//! downstream may send inference traffic until [`ReadinessProbe::await_ready`]
//! returns success. Poll exhaustion is a fatal startup condition; the process
//! owning the container treats it as container failure.

use crate::config::ProbeConfig;
use crate::error::{Result, SlipwayError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Bounded ring buffer of recent server output lines.
///
/// Attached to probe-exhaustion errors so the operator sees what the wrapped
/// server printed while it failed to come up.
#[derive(Debug)]
pub struct DiagnosticTail {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl DiagnosticTail {
    /// Create a tail keeping at most `capacity` lines.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    /// Record a line, evicting the oldest when full.
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// The retained lines, oldest first, joined with newlines.
    pub fn tail(&self) -> String {
        let lines = self.lines.lock();
        lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// Bounded readiness poll against the container's probe path.
pub struct ReadinessProbe {
    ping_url: String,
    interval: Duration,
    max_attempts: u32,
    client: reqwest::Client,
    diagnostics: Arc<DiagnosticTail>,
}

impl ReadinessProbe {
    /// Create a probe against a fully qualified ping URL.
    pub fn new(ping_url: impl Into<String>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            ping_url: ping_url.into(),
            interval,
            max_attempts,
            client: reqwest::Client::new(),
            diagnostics: DiagnosticTail::new(64),
        }
    }

    /// Create a probe from configuration, probing `base_url` + probe path.
    pub fn from_config(base_url: &str, config: &ProbeConfig) -> Self {
        Self::new(
            format!("{}{}", base_url.trim_end_matches('/'), config.path),
            config.interval,
            config.max_attempts,
        )
    }

    /// Attach a diagnostic tail fed by the server's output.
    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticTail>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// The diagnostic tail this probe reports on failure.
    pub fn diagnostics(&self) -> Arc<DiagnosticTail> {
        Arc::clone(&self.diagnostics)
    }

    /// Poll until the first 2xx response.
    ///
    /// Sends one probe per interval. Succeeds on the first HTTP success and
    /// returns the attempt count used; fails permanently after exactly
    /// `max_attempts` consecutive non-success responses or connection errors,
    /// surfacing the last error and the diagnostic tail.
    pub async fn await_ready(&self) -> Result<u32> {
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.max_attempts {
            match self.client.get(&self.ping_url).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        url = %self.ping_url,
                        attempt = attempt,
                        "Server answered ready"
                    );
                    return Ok(attempt);
                }
                Ok(response) => {
                    last_error = format!("probe returned HTTP {}", response.status());
                    debug!(
                        url = %self.ping_url,
                        attempt = attempt,
                        status = %response.status(),
                        "Probe not ready"
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    debug!(
                        url = %self.ping_url,
                        attempt = attempt,
                        error = %last_error,
                        "Probe request failed"
                    );
                }
            }

            self.diagnostics
                .push(format!("probe attempt {}: {}", attempt, last_error));

            if attempt < self.max_attempts {
                sleep(self.interval).await;
            }
        }

        warn!(
            url = %self.ping_url,
            attempts = self.max_attempts,
            "Readiness probe exhausted"
        );

        Err(SlipwayError::ProbeExhausted {
            attempts: self.max_attempts,
            last_error,
            diagnostics: self.diagnostics.tail(),
        })
    }
}
