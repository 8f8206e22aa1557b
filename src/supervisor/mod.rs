//! Connection supervision.
//!
//! This module provides the process-wide controller that keeps the frame
//! stream alive.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionSupervisor`] | Owns the active session and restart policy |
//! | [`SupervisorBuilder`] | Fluent configuration builder |
//! | [`StreamOptions`] | Endpoint, framing and restart settings |
//! | [`Visibility`] | Display visibility and its transition events |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for supervisor configuration.
pub mod builder;

/// Core supervisor implementation.
pub mod core;

/// Stream configuration.
pub mod options;

/// Page visibility signals.
pub mod visibility;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SupervisorBuilder;
pub use self::core::{ConnectionSupervisor, SupervisorStats, SupervisorStatus};
pub use options::{DEFAULT_BASE_URL, DEFAULT_RESTART_DELAY, DEFAULT_STREAM_PATH, StreamOptions};
pub use visibility::{Visibility, VisibilityEvent};
