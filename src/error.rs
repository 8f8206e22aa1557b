//! Error types for framegrid.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use framegrid::{Result, SupervisorBuilder};
//!
//! fn example(sink: SurfaceGrid) -> Result<()> {
//!     let supervisor = SupervisorBuilder::new()
//!         .base_url("http://127.0.0.1:8000")
//!         .sink(sink)
//!         .build()?;
//!     supervisor.start();
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Transport`], [`Error::HttpStatus`] |
//! | Protocol | [`Error::MalformedFrame`] |
//! | Sink | [`Error::Sink`] |
//! | External | [`Error::Json`], [`Error::Http`], [`Error::Url`], [`Error::Base64`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use base64::DecodeError;
use thiserror::Error;

use crate::identifiers::TargetId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when supervisor configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The byte stream failed while opening or reading.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The stream endpoint answered with a non-success status.
    #[error("Stream endpoint returned HTTP {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A record could not be turned into a frame.
    ///
    /// Never surfaced past the reassembler: malformed records are dropped.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// Why the record was rejected.
        reason: &'static str,
    },

    // ========================================================================
    // Sink Errors
    // ========================================================================
    /// The sink failed to apply a frame.
    #[error("Sink failed for {target_id}: {message}")]
    Sink {
        /// Target the frame was addressed to.
        target_id: TargetId,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Base64 decode error.
    #[error("Base64 error: {0}")]
    Base64(#[from] DecodeError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    #[inline]
    pub fn http_status(status: u16) -> Self {
        Self::HttpStatus { status }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed(reason: &'static str) -> Self {
        Self::MalformedFrame { reason }
    }

    /// Creates a sink error.
    #[inline]
    pub fn sink(target_id: TargetId, message: impl Into<String>) -> Self {
        Self::Sink {
            target_id,
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error came from the byte stream transport.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
