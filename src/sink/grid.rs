//! In-memory grid of display surfaces.
//!
//! Models the page the stream feeds: surfaces are registered up front by
//! target id, each delivery replaces the surface's current frame, and frames
//! for unknown targets are ignored. During an outage every surface keeps the
//! last frame it received.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::Result;
use crate::identifiers::TargetId;
use crate::protocol::Frame;

use super::FrameSink;

// ============================================================================
// Constants
// ============================================================================

/// Capacity of the update notification channel.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Surface
// ============================================================================

/// State of one display surface.
#[derive(Debug, Default, Clone)]
struct Surface {
    frame: Option<Frame>,
    updates: u64,
}

// ============================================================================
// SurfaceGrid
// ============================================================================

/// Thread-safe set of surfaces addressed by [`TargetId`].
///
/// Cloning is cheap; clones share the same surfaces.
///
/// # Example
///
/// ```ignore
/// let grid = SurfaceGrid::with_targets(["cam1", "cam2"]);
/// let mut updates = grid.subscribe();
///
/// // hand `grid.clone()` to the supervisor as its sink ...
///
/// let target = updates.recv().await?;
/// let frame = grid.latest(&target);
/// ```
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    surfaces: Arc<RwLock<FxHashMap<TargetId, Surface>>>,
    updates: broadcast::Sender<TargetId>,
}

impl Default for SurfaceGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            surfaces: Arc::new(RwLock::new(FxHashMap::default())),
            updates,
        }
    }

    /// Creates a grid with the given surfaces registered.
    #[must_use]
    pub fn with_targets<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetId>,
    {
        let grid = Self::new();
        for target in targets {
            grid.register(target);
        }
        grid
    }

    /// Registers a surface. Returns `false` if it already existed.
    pub fn register(&self, target: impl Into<TargetId>) -> bool {
        let mut surfaces = self.surfaces.write();
        let target = target.into();
        if surfaces.contains_key(&target) {
            return false;
        }
        surfaces.insert(target, Surface::default());
        true
    }

    /// Removes a surface. Returns `false` if it did not exist.
    pub fn unregister(&self, target: &TargetId) -> bool {
        self.surfaces.write().remove(target).is_some()
    }

    /// Returns `true` if a surface is registered for `target`.
    #[must_use]
    pub fn contains(&self, target: &TargetId) -> bool {
        self.surfaces.read().contains_key(target)
    }

    /// Returns the number of registered surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.read().len()
    }

    /// Returns `true` if no surfaces are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.read().is_empty()
    }

    /// Returns the frame currently shown on `target`.
    #[must_use]
    pub fn latest(&self, target: &TargetId) -> Option<Frame> {
        self.surfaces
            .read()
            .get(target)
            .and_then(|surface| surface.frame.clone())
    }

    /// Returns how many frames `target` has shown.
    #[must_use]
    pub fn update_count(&self, target: &TargetId) -> u64 {
        self.surfaces
            .read()
            .get(target)
            .map_or(0, |surface| surface.updates)
    }

    /// Subscribes to update notifications.
    ///
    /// Each message is the target whose frame was just replaced.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TargetId> {
        self.updates.subscribe()
    }
}

#[async_trait]
impl FrameSink for SurfaceGrid {
    async fn deliver(&self, frame: Frame) -> Result<()> {
        let target = frame.target_id().clone();

        {
            let mut surfaces = self.surfaces.write();
            let Some(surface) = surfaces.get_mut(&target) else {
                trace!(target_id = %target, "No surface for frame");
                return Ok(());
            };
            surface.frame = Some(frame);
            surface.updates += 1;
        }

        // No subscribers is fine.
        let _ = self.updates.send(target);
        Ok(())
    }

    fn accepts(&self, target: &TargetId) -> bool {
        self.contains(target)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_replaces_frame() {
        let grid = SurfaceGrid::with_targets(["cam1"]);
        let target = TargetId::new("cam1");

        grid.deliver(Frame::new("cam1", "AAAA")).await.unwrap();
        grid.deliver(Frame::new("cam1", "BBBB")).await.unwrap();

        assert_eq!(grid.latest(&target).unwrap().payload(), "BBBB");
        assert_eq!(grid.update_count(&target), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_is_noop() {
        let grid = SurfaceGrid::with_targets(["cam1"]);

        grid.deliver(Frame::new("ghost", "AAAA")).await.unwrap();

        assert!(!grid.contains(&TargetId::new("ghost")));
        assert_eq!(grid.len(), 1);
        assert!(grid.latest(&TargetId::new("cam1")).is_none());
    }

    #[test]
    fn test_accepts_only_registered_targets() {
        let grid = SurfaceGrid::with_targets(["cam1"]);
        assert!(grid.accepts(&TargetId::new("cam1")));
        assert!(!grid.accepts(&TargetId::new("ghost")));
    }

    #[tokio::test]
    async fn test_subscribe_notifies_target() {
        let grid = SurfaceGrid::with_targets(["cam1"]);
        let mut updates = grid.subscribe();

        grid.deliver(Frame::new("cam1", "AAAA")).await.unwrap();

        assert_eq!(updates.recv().await.unwrap(), TargetId::new("cam1"));
    }

    #[test]
    fn test_register_and_unregister() {
        let grid = SurfaceGrid::new();
        assert!(grid.is_empty());
        assert!(grid.register("cam1"));
        assert!(!grid.register("cam1"));
        assert!(grid.unregister(&TargetId::new("cam1")));
        assert!(!grid.unregister(&TargetId::new("cam1")));
    }
}
