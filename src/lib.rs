//! framegrid - Live image grid client for multiplexed frame streams.
//!
//! This library keeps a grid of display surfaces up to date from a single
//! long-lived HTTP response that carries JPEG frames for many targets.
//!
//! # Architecture
//!
//! ```text
//! network bytes ─► FrameReassembler ─► Dispatcher ─► FrameSink
//!                        ▲
//!                  StreamSession ◄── ConnectionSupervisor ◄── visibility
//! ```
//!
//! Key design principles:
//!
//! - Exactly one [`StreamSession`] reads the stream at a time
//! - Sessions never retry; the [`ConnectionSupervisor`] owns restart policy
//! - Records cut by chunk boundaries are carried over, not dropped
//! - Sink delivery never blocks the read loop
//!
//! # Quick Start
//!
//! ```no_run
//! use framegrid::{ConnectionSupervisor, Result, SurfaceGrid};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let grid = SurfaceGrid::with_targets(["bot-1", "bot-2"]);
//!     let mut updates = grid.subscribe();
//!
//!     let supervisor = ConnectionSupervisor::builder()
//!         .base_url("http://127.0.0.1:8084")
//!         .sink(grid.clone())
//!         .spawn()?;
//!
//!     while let Ok(target) = updates.recv().await {
//!         println!("{target} updated ({} frames)", grid.update_count(&target));
//!     }
//!
//!     supervisor.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire format, validation and reassembly |
//! | [`sink`] | Frame delivery to display surfaces |
//! | [`supervisor`] | Session lifecycle and restart policy |
//! | [`transport`] | HTTP stream source and read loop |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for targets and sessions.
pub mod identifiers;

/// Frame stream wire protocol.
///
/// Record parsing, payload validation and chunk reassembly.
pub mod protocol;

/// Frame delivery.
///
/// The [`FrameSink`] trait, an in-memory [`SurfaceGrid`], and per-target
/// dispatch lanes.
pub mod sink;

/// Connection supervision.
///
/// Use [`ConnectionSupervisor::builder()`] to create a configured supervisor.
pub mod supervisor;

/// HTTP stream transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SessionId, TargetId};

// Protocol types
pub use protocol::{Delimiter, Frame, FrameReassembler, ReassemblerStats, is_complete_image};

// Sink types
pub use sink::{Dispatcher, FrameSink, SurfaceGrid};

// Supervisor types
pub use supervisor::{
    ConnectionSupervisor, StreamOptions, SupervisorBuilder, SupervisorStats, SupervisorStatus,
    Visibility, VisibilityEvent,
};

// Transport types
pub use transport::{ByteStream, CloseReason, HttpSource, SessionState, StreamSession, StreamSource};
