//! Builder pattern for supervisor configuration.
//!
//! Provides a fluent API for configuring and creating
//! [`ConnectionSupervisor`] instances.
//!
//! # Example
//!
//! ```ignore
//! use framegrid::{ConnectionSupervisor, SurfaceGrid};
//!
//! let grid = SurfaceGrid::with_targets(["bot-1", "bot-2"]);
//! let supervisor = ConnectionSupervisor::builder()
//!     .base_url("http://192.168.1.20:8084")
//!     .sink(grid)
//!     .spawn()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Delimiter;
use crate::sink::FrameSink;
use crate::transport::{HttpSource, StreamSource};

use super::core::ConnectionSupervisor;
use super::options::{DEFAULT_BASE_URL, DEFAULT_STREAM_PATH, StreamOptions};

// ============================================================================
// SupervisorBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionSupervisor`].
///
/// Use [`ConnectionSupervisor::builder()`] to create a new builder.
#[derive(Default)]
pub struct SupervisorBuilder {
    /// Complete options; individual setters override their fields.
    options: Option<StreamOptions>,
    /// Server base URL.
    base_url: Option<String>,
    /// Full endpoint URL, overriding base URL and path.
    endpoint: Option<String>,
    /// Endpoint path joined onto the base URL.
    stream_path: Option<String>,
    delimiter: Option<Delimiter>,
    restart_delay: Option<Duration>,
    max_pending_bytes: Option<usize>,
    sink: Option<Arc<dyn FrameSink>>,
    source: Option<Arc<dyn StreamSource>>,
}

// ============================================================================
// SupervisorBuilder Implementation
// ============================================================================

impl SupervisorBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a complete set of options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: StreamOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the server base URL (e.g. `http://127.0.0.1:8084`).
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the full stream endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the endpoint path joined onto the base URL.
    #[inline]
    #[must_use]
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = Some(path.into());
        self
    }

    /// Sets the record delimiter.
    #[inline]
    #[must_use]
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Sets the delay before restarting a failed session.
    #[inline]
    #[must_use]
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = Some(delay);
        self
    }

    /// Bounds the reassembler's pending tail.
    #[inline]
    #[must_use]
    pub fn max_pending_bytes(mut self, max: usize) -> Self {
        self.max_pending_bytes = Some(max);
        self
    }

    /// Sets the frame sink.
    #[inline]
    #[must_use]
    pub fn sink(mut self, sink: impl FrameSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Sets a shared frame sink.
    #[inline]
    #[must_use]
    pub fn shared_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replaces the HTTP source, e.g. with a custom client or a test double.
    #[inline]
    #[must_use]
    pub fn source(mut self, source: Arc<dyn StreamSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Builds an idle supervisor.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no sink is set
    /// - [`Error::Url`] if the endpoint cannot be parsed
    pub fn build(self) -> Result<ConnectionSupervisor> {
        let sink = self.sink.clone().ok_or_else(|| {
            Error::config(
                "A frame sink is required. Use .sink() to set it.\n\
                 Example: ConnectionSupervisor::builder().sink(SurfaceGrid::new())",
            )
        })?;
        let options = self.resolve_options()?;
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(HttpSource::new(options.endpoint.clone())));

        Ok(ConnectionSupervisor::new(source, sink, options))
    }

    /// Builds the supervisor and starts the first session immediately.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn spawn(self) -> Result<ConnectionSupervisor> {
        let supervisor = self.build()?;
        supervisor.start();
        Ok(supervisor)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SupervisorBuilder {
    /// Merges explicit settings over the base options.
    fn resolve_options(&self) -> Result<StreamOptions> {
        let mut options = match (&self.options, &self.endpoint) {
            (_, Some(endpoint)) => {
                let base = self.options.clone();
                let endpoint = Url::parse(endpoint)?;
                match base {
                    Some(mut options) => {
                        options.endpoint = endpoint;
                        options
                    }
                    None => StreamOptions::new(endpoint),
                }
            }
            (Some(options), None) if self.base_url.is_none() && self.stream_path.is_none() => {
                options.clone()
            }
            (base, None) => {
                let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
                let path = self.stream_path.as_deref().unwrap_or(DEFAULT_STREAM_PATH);
                let resolved = StreamOptions::from_base_url_and_path(base_url, path)?;
                match base {
                    Some(options) => StreamOptions {
                        endpoint: resolved.endpoint,
                        ..options.clone()
                    },
                    None => resolved,
                }
            }
        };

        if let Some(delimiter) = self.delimiter {
            options.delimiter = delimiter;
        }
        if let Some(delay) = self.restart_delay {
            options = options.with_restart_delay(delay);
        }
        if let Some(max) = self.max_pending_bytes {
            options.max_pending_bytes = Some(max);
        }

        Ok(options)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sink::SurfaceGrid;

    #[test]
    fn test_missing_sink() {
        let err = SupervisorBuilder::new().build().err().unwrap();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_defaults() {
        let supervisor = SupervisorBuilder::new().sink(SurfaceGrid::new()).build().unwrap();
        let options = supervisor.options();

        assert_eq!(options.endpoint.as_str(), "http://127.0.0.1:8084/base64_stream");
        assert_eq!(options.delimiter, Delimiter::Newline);
        assert_eq!(options.restart_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_base_url_and_path() {
        let supervisor = SupervisorBuilder::new()
            .base_url("http://10.1.1.1:9000")
            .stream_path("/grid")
            .delimiter(Delimiter::Space)
            .restart_delay(Duration::from_secs(1))
            .max_pending_bytes(4096)
            .sink(SurfaceGrid::new())
            .build()
            .unwrap();
        let options = supervisor.options();

        assert_eq!(options.endpoint.as_str(), "http://10.1.1.1:9000/grid");
        assert_eq!(options.delimiter, Delimiter::Space);
        assert_eq!(options.restart_delay_ms, 1000);
        assert_eq!(options.max_pending_bytes, Some(4096));
    }

    #[test]
    fn test_endpoint_overrides_options() {
        let base = StreamOptions::from_base_url("http://a:1")
            .unwrap()
            .with_delimiter(Delimiter::Space);
        let supervisor = SupervisorBuilder::new()
            .options(base)
            .endpoint("http://b:2/live")
            .sink(SurfaceGrid::new())
            .build()
            .unwrap();

        assert_eq!(supervisor.options().endpoint.as_str(), "http://b:2/live");
        assert_eq!(supervisor.options().delimiter, Delimiter::Space);
    }

    #[test]
    fn test_options_used_verbatim() {
        let base = StreamOptions::from_base_url("http://a:1").unwrap();
        let supervisor = SupervisorBuilder::new()
            .options(base.clone())
            .sink(SurfaceGrid::new())
            .build()
            .unwrap();

        assert_eq!(supervisor.options(), &base);
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = SupervisorBuilder::new()
            .endpoint("::not a url::")
            .sink(SurfaceGrid::new())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Url(_)));
    }
}
