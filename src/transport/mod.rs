//! HTTP stream transport.
//!
//! This module opens the long-lived stream body and drives one read loop
//! per connection attempt.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        GET /base64_stream        ┌──────────────┐
//! │  StreamSession   │ ───────────────────────────────► │  Frame       │
//! │  (read loop)     │ ◄─────────────────────────────── │  server      │
//! │                  │     chunked text/plain body      │              │
//! └──────────────────┘                                  └──────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `StreamSource::open` - Issue the request, get the body stream
//! 2. `StreamSession::run` - Read chunks until end, error or cancel
//! 3. `CloseReason` - Reported to the supervisor, which decides what next
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | Read loop and close classification |
//! | `source` | Stream sources (HTTP and test doubles) |

// ============================================================================
// Submodules
// ============================================================================

/// Read loop and close classification.
pub mod session;

/// Byte stream sources.
pub mod source;

// ============================================================================
// Re-exports
// ============================================================================

pub use session::{CloseReason, SessionState, StreamSession};
pub use source::{ByteStream, HttpSource, StreamSource};
