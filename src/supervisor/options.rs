//! Stream configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use framegrid::{Delimiter, StreamOptions};
//!
//! let options = StreamOptions::from_base_url("http://127.0.0.1:8084")?
//!     .with_delimiter(Delimiter::Space)
//!     .with_restart_delay(Duration::from_secs(2));
//!
//! let json = options.to_json()?;
//! assert_eq!(StreamOptions::from_json(&json)?, options);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::protocol::{Delimiter, FrameReassembler};

// ============================================================================
// Constants
// ============================================================================

/// Server the stream is read from when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8084";

/// Path of the frame stream endpoint.
pub const DEFAULT_STREAM_PATH: &str = "/base64_stream";

/// Delay before restarting after a failed or ended session.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

const fn default_restart_delay_ms() -> u64 {
    DEFAULT_RESTART_DELAY.as_millis() as u64
}

// ============================================================================
// StreamOptions
// ============================================================================

/// Settings for the stream endpoint, framing and restart policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Full URL of the stream endpoint.
    pub endpoint: Url,

    /// Record delimiter used by the server.
    #[serde(default)]
    pub delimiter: Delimiter,

    /// Delay before restarting after `StreamError` or `EndOfStream`.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Upper bound for the reassembler's pending tail. Unbounded if `None`.
    #[serde(default)]
    pub max_pending_bytes: Option<usize>,
}

// ============================================================================
// Constructors
// ============================================================================

impl StreamOptions {
    /// Creates options for an explicit endpoint URL.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            delimiter: Delimiter::default(),
            restart_delay_ms: default_restart_delay_ms(),
            max_pending_bytes: None,
        }
    }

    /// Creates options for [`DEFAULT_STREAM_PATH`] on `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`](crate::Error::Url) if `base_url` is not a valid URL.
    pub fn from_base_url(base_url: &str) -> Result<Self> {
        Self::from_base_url_and_path(base_url, DEFAULT_STREAM_PATH)
    }

    /// Creates options for `path` on `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`](crate::Error::Url) if the URL cannot be built.
    pub fn from_base_url_and_path(base_url: &str, path: &str) -> Result<Self> {
        let endpoint = Url::parse(base_url)?.join(path)?;
        Ok(Self::new(endpoint))
    }

    /// Parses options from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) on malformed input.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl StreamOptions {
    /// Sets the record delimiter.
    #[inline]
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the restart delay.
    #[inline]
    #[must_use]
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bounds the pending tail to `max` bytes.
    #[inline]
    #[must_use]
    pub fn with_max_pending_bytes(mut self, max: usize) -> Self {
        self.max_pending_bytes = Some(max);
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl StreamOptions {
    /// Returns the restart delay.
    #[inline]
    #[must_use]
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Creates a reassembler configured by these options.
    #[must_use]
    pub fn reassembler(&self) -> FrameReassembler {
        FrameReassembler::new(self.delimiter).with_max_pending(self.max_pending_bytes)
    }

    /// Serializes options to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
