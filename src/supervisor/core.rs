//! Connection supervisor.
//!
//! Owns the single active [`StreamSession`] and decides when to start,
//! cancel, and restart it.
//!
//! # State Machine
//!
//! ```text
//!            start()/visible            opened
//!   Idle ──────────────────► Starting ─────────► Running
//!    ▲                         ▲                   │
//!    │ hidden                  │ delay elapsed     │ StreamError / EndOfStream
//!    │                         │                   ▼
//!    └──────────────────────── Restarting ◄────────┘
//!
//!   stop() from any state → Stopped
//! ```
//!
//! # Invariants
//!
//! - Starting a session always cancels the previous one first, and the new
//!   session waits for the previous task to finish before opening its
//!   stream. At most one stream is ever open.
//! - `Aborted` sessions are never restarted; whoever cancelled them owns
//!   what happens next.
//! - A hide, stop or start cancels any pending restart.
//! - A session that closed on its own keeps delivering queued frames until
//!   the next hide, stop or start cancels its token.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::identifiers::SessionId;
use crate::sink::FrameSink;
use crate::transport::{CloseReason, SessionState, StreamSession, StreamSource};

use super::builder::SupervisorBuilder;
use super::options::StreamOptions;
use super::visibility::{Visibility, VisibilityEvent};

// ============================================================================
// SupervisorStatus
// ============================================================================

/// Observable state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// No session and no restart pending.
    Idle,
    /// A session is connecting.
    Starting,
    /// A session is reading the stream.
    Running,
    /// Waiting out the restart delay.
    Restarting,
    /// Explicitly stopped.
    Stopped,
}

// ============================================================================
// SupervisorStats
// ============================================================================

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Sessions launched.
    pub sessions_started: u64,
    /// Delayed restarts scheduled after a failure or end of stream.
    pub restarts_scheduled: u64,
}

// ============================================================================
// Internal State
// ============================================================================

/// The session currently owned by the supervisor.
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    state: watch::Receiver<SessionState>,
}

/// Mutable supervisor state, only touched under the lock.
struct State {
    active: Option<ActiveSession>,
    /// Task of a cancelled session that may still be winding down.
    draining: Option<JoinHandle<()>>,
    /// Token of the last session that closed on its own; its lanes may
    /// still be delivering.
    closed: Option<CancellationToken>,
    pending_restart: Option<CancellationToken>,
    visibility: Visibility,
    status: SupervisorStatus,
}

struct Inner {
    source: Arc<dyn StreamSource>,
    sink: Arc<dyn FrameSink>,
    options: StreamOptions,
    state: Mutex<State>,
    sessions_started: AtomicU64,
    restarts_scheduled: AtomicU64,
}

// ============================================================================
// ConnectionSupervisor
// ============================================================================

/// Keeps exactly one stream session alive while the display is visible.
///
/// Cloning is cheap; clones control the same supervisor. When the last
/// clone is dropped, the active session and any pending restart are
/// cancelled.
///
/// All methods that may launch a session must be called from within a
/// tokio runtime.
///
/// # Example
///
/// ```ignore
/// let grid = SurfaceGrid::with_targets(["cam1", "cam2"]);
/// let supervisor = ConnectionSupervisor::builder()
///     .base_url("http://127.0.0.1:8084")
///     .sink(grid.clone())
///     .spawn()?;
///
/// supervisor.became_hidden();
/// supervisor.became_visible();
/// ```
#[derive(Clone)]
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

// ============================================================================
// ConnectionSupervisor - Constructor
// ============================================================================

impl ConnectionSupervisor {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Creates an idle supervisor. Call [`start`](Self::start) to connect.
    #[must_use]
    pub fn new(
        source: Arc<dyn StreamSource>,
        sink: Arc<dyn FrameSink>,
        options: StreamOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                sink,
                options,
                state: Mutex::new(State {
                    active: None,
                    draining: None,
                    closed: None,
                    pending_restart: None,
                    visibility: Visibility::Visible,
                    status: SupervisorStatus::Idle,
                }),
                sessions_started: AtomicU64::new(0),
                restarts_scheduled: AtomicU64::new(0),
            }),
        }
    }
}

// ============================================================================
// ConnectionSupervisor - Public API
// ============================================================================

impl ConnectionSupervisor {
    /// Starts a fresh session, cancelling any existing one.
    ///
    /// Reported visibility is not consulted: a session started while hidden
    /// is restarted after a failure like any other, until the next hide or
    /// stop.
    pub fn start(&self) -> SessionId {
        let mut state = self.inner.state.lock();
        self.inner.start_locked(&mut state)
    }

    /// Cancels the active session and any pending restart.
    ///
    /// Nothing restarts until [`start`](Self::start) or a visible transition.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        Inner::cancel_locked(&mut state);
        state.status = SupervisorStatus::Stopped;
        info!("Supervisor stopped");
    }

    /// Handles the display becoming visible: always starts a clean session.
    pub fn became_visible(&self) -> SessionId {
        let mut state = self.inner.state.lock();
        debug!("Display became visible");
        state.visibility = Visibility::Visible;
        self.inner.start_locked(&mut state)
    }

    /// Handles the display becoming hidden: cancels and stays idle.
    pub fn became_hidden(&self) {
        let mut state = self.inner.state.lock();
        debug!("Display became hidden");
        state.visibility = Visibility::Hidden;
        Inner::cancel_locked(&mut state);
        state.status = SupervisorStatus::Idle;
    }

    /// Applies a visibility event.
    pub fn handle_event(&self, event: VisibilityEvent) {
        match event {
            VisibilityEvent::BecameVisible => {
                self.became_visible();
            }
            VisibilityEvent::BecameHidden => self.became_hidden(),
        }
    }

    /// Applies visibility events from `events` until the channel closes.
    ///
    /// The task holds only a weak reference and exits once the supervisor
    /// is dropped.
    pub fn watch_visibility(&self, mut events: mpsc::Receiver<VisibilityEvent>) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                ConnectionSupervisor { inner }.handle_event(event);
            }
            debug!("Visibility watcher stopped");
        })
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        let state = self.inner.state.lock();
        match &state.active {
            Some(active) => match *active.state.borrow() {
                SessionState::Connecting => SupervisorStatus::Starting,
                SessionState::Streaming => SupervisorStatus::Running,
                // Closed but not yet reported back.
                SessionState::Closed(_) => SupervisorStatus::Restarting,
            },
            None => state.status,
        }
    }

    /// Returns the last reported visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.inner.state.lock().visibility
    }

    /// Returns the active session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.inner.state.lock().active.as_ref().map(|a| a.id)
    }

    /// Returns `true` if a delayed restart is pending.
    #[must_use]
    pub fn restart_pending(&self) -> bool {
        self.inner.state.lock().pending_restart.is_some()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &StreamOptions {
        &self.inner.options
    }

    /// Returns lifetime counters.
    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            sessions_started: self.inner.sessions_started.load(Ordering::Relaxed),
            restarts_scheduled: self.inner.restarts_scheduled.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Inner - Session Lifecycle
// ============================================================================

impl Inner {
    /// Cancels the current session and launches a new one.
    fn start_locked(self: &Arc<Self>, state: &mut State) -> SessionId {
        if let Some(restart) = state.pending_restart.take() {
            restart.cancel();
        }
        if let Some(closed) = state.closed.take() {
            closed.cancel();
        }

        if let Some(active) = state.active.take() {
            debug!(session_id = %active.id, "Cancelling previous session");
            active.cancel.cancel();
            state.draining = Some(active.handle);
        }
        let previous = state.draining.take();

        let id = SessionId::next();
        let cancel = CancellationToken::new();
        let session = StreamSession::new(
            id,
            Arc::clone(&self.source),
            Arc::clone(&self.sink),
            self.options.reassembler(),
        );
        let session_state = session.subscribe();

        let weak = Arc::downgrade(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let reason = session.run(token).await;

            if let Some(inner) = weak.upgrade() {
                inner.on_session_closed(id, reason);
            }
        });

        state.active = Some(ActiveSession {
            id,
            cancel,
            handle,
            state: session_state,
        });
        state.status = SupervisorStatus::Starting;
        self.sessions_started.fetch_add(1, Ordering::Relaxed);

        info!(session_id = %id, "Session launched");
        id
    }

    /// Cancels the active session, its predecessor's lanes and any pending
    /// restart.
    fn cancel_locked(state: &mut State) {
        if let Some(restart) = state.pending_restart.take() {
            restart.cancel();
        }
        if let Some(closed) = state.closed.take() {
            closed.cancel();
        }

        if let Some(active) = state.active.take() {
            debug!(session_id = %active.id, "Cancelling session");
            active.cancel.cancel();
            state.draining = Some(active.handle);
        }
    }

    /// Reacts to a session finishing.
    fn on_session_closed(self: &Arc<Self>, id: SessionId, reason: CloseReason) {
        let mut state = self.state.lock();

        if state.active.as_ref().map(|a| a.id) != Some(id) {
            debug!(session_id = %id, ?reason, "Ignoring report from replaced session");
            return;
        }
        // Hide and stop take the active session, so only a session nobody
        // cancelled gets here.
        let Some(active) = state.active.take() else {
            return;
        };
        state.closed = Some(active.cancel);

        if !reason.wants_restart() {
            state.status = SupervisorStatus::Idle;
            return;
        }

        self.schedule_restart_locked(&mut state);
    }

    /// Arms the single restart timer.
    fn schedule_restart_locked(self: &Arc<Self>, state: &mut State) {
        if let Some(restart) = state.pending_restart.take() {
            restart.cancel();
        }

        let delay = self.options.restart_delay();
        let token = CancellationToken::new();
        state.pending_restart = Some(token.clone());
        state.status = SupervisorStatus::Restarting;
        self.restarts_scheduled.fetch_add(1, Ordering::Relaxed);

        info!(delay_ms = delay.as_millis() as u64, "Scheduling stream restart");

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();

            // Cancelled between the timer firing and taking the lock.
            if token.is_cancelled() {
                return;
            }
            state.pending_restart = None;
            inner.start_locked(&mut state);
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        Self::cancel_locked(self.state.get_mut());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::stream;

    use crate::error::{Error, Result};
    use crate::protocol::Frame;
    use crate::transport::ByteStream;

    /// Source that counts opens and either fails or hangs.
    struct Counting {
        opens: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StreamSource for Counting {
        async fn open(&self) -> Result<ByteStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::transport("connection refused"));
            }
            Ok(Box::pin(stream::pending()))
        }
    }

    fn supervisor(fail: bool) -> (ConnectionSupervisor, Arc<Counting>) {
        let source = Arc::new(Counting {
            opens: AtomicUsize::new(0),
            fail,
        });
        let sink = |_: Frame| -> Result<()> { Ok(()) };
        let options = StreamOptions::from_base_url("http://127.0.0.1:8084").unwrap();
        let supervisor = ConnectionSupervisor::new(source.clone(), Arc::new(sink), options);
        (supervisor, source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_idle() {
        let (supervisor, source) = supervisor(false);
        assert_eq!(supervisor.status(), SupervisorStatus::Idle);
        assert_eq!(supervisor.visibility(), Visibility::Visible);
        assert!(supervisor.active_session().is_none());
        assert_eq!(source.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reaches_running() {
        let (supervisor, source) = supervisor(false);

        let id = supervisor.start();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(supervisor.active_session(), Some(id));
        assert_eq!(supervisor.status(), SupervisorStatus::Running);
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_error_restarts_after_delay() {
        let (supervisor, source) = supervisor(true);

        supervisor.start();
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.status(), SupervisorStatus::Restarting);
        assert!(supervisor.restart_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
        assert_eq!(supervisor.stats().restarts_scheduled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_cancels_pending_restart() {
        let (supervisor, source) = supervisor(true);

        supervisor.start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        supervisor.became_hidden();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.status(), SupervisorStatus::Idle);
        assert!(!supervisor.restart_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_hidden_restarts_on_failure() {
        let (supervisor, source) = supervisor(true);

        supervisor.became_hidden();
        supervisor.start();
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
        assert_eq!(supervisor.visibility(), Visibility::Hidden);
        assert!(supervisor.restart_pending());

        supervisor.became_hidden();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_restarts_healthy_session() {
        let (supervisor, source) = supervisor(false);

        let first = supervisor.start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = supervisor.became_visible();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_ne!(first, second);
        assert_eq!(supervisor.active_session(), Some(second));
        assert_eq!(source.opens.load(Ordering::SeqCst), 2);
        assert_eq!(supervisor.stats().restarts_scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_restart() {
        let (supervisor, source) = supervisor(false);

        supervisor.start();
        tokio::time::sleep(Duration::from_millis(1)).await;
        supervisor.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
        assert!(supervisor.active_session().is_none());
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_visibility_applies_events() {
        let (supervisor, source) = supervisor(false);
        let (tx, rx) = mpsc::channel(8);
        let watcher = supervisor.watch_visibility(rx);

        tx.send(VisibilityEvent::BecameVisible).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(supervisor.status(), SupervisorStatus::Running);

        tx.send(VisibilityEvent::BecameHidden).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(supervisor.visibility(), Visibility::Hidden);
        assert!(supervisor.active_session().is_none());

        drop(tx);
        watcher.await.unwrap();
        assert_eq!(source.opens.load(Ordering::SeqCst), 1);
    }
}
