//! Per-target dispatch lanes.
//!
//! The read loop hands frames to a [`Dispatcher`] and moves on. Each target
//! id gets its own lane: a single-frame mailbox drained by a dedicated task
//! that awaits the sink one frame at a time. A slow sink therefore only
//! delays its own target, and frames for one target keep stream order.
//!
//! ```text
//! read loop ──dispatch()──┬──► lane "cam1" ──► sink.deliver()
//!                         ├──► lane "cam2" ──► sink.deliver()
//!                         └──► lane "cam3" ──► sink.deliver()
//! ```
//!
//! A surface only ever shows its newest image, so a lane holds at most one
//! undelivered frame. A newer frame replaces the waiting one.
//!
//! Lanes stop as soon as the session's cancel token fires, dropping the
//! waiting frame.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::identifiers::TargetId;
use crate::protocol::Frame;

use super::FrameSink;

// ============================================================================
// Lane
// ============================================================================

/// Producer side of one target's lane.
struct Lane {
    /// Newest frame not yet taken by the lane task.
    slot: Arc<Mutex<Option<Frame>>>,
    /// Capacity-one wake-up signal.
    wake: mpsc::Sender<()>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fans frames out to per-target delivery lanes.
///
/// Must be used from within a tokio runtime.
pub struct Dispatcher {
    sink: Arc<dyn FrameSink>,
    cancel: CancellationToken,
    lanes: FxHashMap<TargetId, Lane>,
    superseded: u64,
}

impl Dispatcher {
    /// Creates a dispatcher whose lanes stop when `cancel` fires.
    #[must_use]
    pub fn new(sink: Arc<dyn FrameSink>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            lanes: FxHashMap::default(),
            superseded: 0,
        }
    }

    /// Hands `frame` to its target's lane without waiting for delivery.
    ///
    /// Frames for targets the sink does not accept are dropped.
    pub fn dispatch(&mut self, frame: Frame) {
        if self.cancel.is_cancelled() {
            return;
        }

        if !self.lanes.contains_key(frame.target_id()) {
            if !self.sink.accepts(frame.target_id()) {
                trace!(target_id = %frame.target_id(), "No surface for target, dropping frame");
                return;
            }
            let target = frame.target_id().clone();
            let lane = self.spawn_lane(target.clone());
            self.lanes.insert(target, lane);
        }

        let Some(lane) = self.lanes.get(frame.target_id()) else {
            return;
        };
        if lane.slot.lock().replace(frame).is_some() {
            self.superseded += 1;
        }
        // Full means a wake-up is already pending.
        let _ = lane.wake.try_send(());
    }

    /// Returns the number of lanes opened so far.
    #[inline]
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Returns how many frames are waiting for delivery, at most one per lane.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.lanes
            .values()
            .filter(|lane| lane.slot.lock().is_some())
            .count()
    }

    /// Returns how many frames were replaced before they were delivered.
    #[inline]
    #[must_use]
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    /// Spawns the delivery task for one target.
    fn spawn_lane(&self, target: TargetId) -> Lane {
        let (wake, mut woken) = mpsc::channel::<()>(1);
        let slot: Arc<Mutex<Option<Frame>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let mailbox = Arc::clone(&slot);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    signal = woken.recv() => {
                        if signal.is_none() {
                            break;
                        }
                    }
                }

                let Some(frame) = mailbox.lock().take() else {
                    continue;
                };

                trace!(target_id = %target, "Delivering frame");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = sink.deliver(frame) => {
                        if let Err(e) = result {
                            warn!(target_id = %target, error = %e, "Sink delivery failed");
                        }
                    }
                }
            }

            trace!(target_id = %target, "Dispatch lane closed");
        });

        Lane { slot, wake }
    }
}

// ============================================================================
// Tests
// ============================================================================
