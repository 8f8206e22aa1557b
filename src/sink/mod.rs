//! Frame delivery to display surfaces.
//!
//! The sink is the only externally visible effect of the stream: it receives
//! each reassembled [`Frame`] and replaces the image shown for its target.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FrameSink`] | Delivery trait implemented by display backends |
//! | [`SurfaceGrid`] | In-memory grid of registered surfaces |
//! | [`Dispatcher`] | Per-target latest-frame lanes decoupled from the read loop |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::TargetId;
use crate::protocol::Frame;

// ============================================================================
// Submodules
// ============================================================================

/// Per-target dispatch lanes.
pub mod dispatch;

/// In-memory surface grid.
pub mod grid;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatch::Dispatcher;
pub use grid::SurfaceGrid;

// ============================================================================
// FrameSink
// ============================================================================

/// Receives reassembled frames.
///
/// Delivery to a target with no matching surface must be a silent no-op.
/// Errors are logged by the caller and never stop the stream.
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Replaces the image shown for `frame.target_id()`.
    async fn deliver(&self, frame: Frame) -> Result<()>;

    /// Returns `false` for targets this sink will never show.
    ///
    /// Frames for such targets are dropped before a delivery lane is opened.
    fn accepts(&self, _target: &TargetId) -> bool {
        true
    }
}

#[async_trait]
impl<F> FrameSink for F
where
    F: Fn(Frame) -> Result<()> + Send + Sync + 'static,
{
    async fn deliver(&self, frame: Frame) -> Result<()> {
        self(frame)
    }
}
