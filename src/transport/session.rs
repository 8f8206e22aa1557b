//! One end-to-end attempt to read the frame stream.
//!
//! # Read Loop
//!
//! [`StreamSession::run`] opens the source and then loops on the next chunk:
//!
//! - chunk → reassembler → dispatcher (never waits on the sink)
//! - end of body → [`CloseReason::EndOfStream`]
//! - read error → [`CloseReason::StreamError`]
//! - cancel signal → [`CloseReason::Aborted`]
//!
//! The session never retries. Restart policy belongs to the supervisor.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::identifiers::SessionId;
use crate::protocol::FrameReassembler;
use crate::sink::{Dispatcher, FrameSink};

use super::source::StreamSource;

// ============================================================================
// CloseReason
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The cancel signal fired.
    Aborted,
    /// Opening or reading the stream failed.
    StreamError,
    /// The server closed the body.
    EndOfStream,
}

impl CloseReason {
    /// Returns `true` if the supervisor should schedule a restart.
    ///
    /// The stream is meant to stay open forever, so a clean end is treated
    /// like a failure.
    #[inline]
    #[must_use]
    pub fn wants_restart(self) -> bool {
        matches!(self, Self::StreamError | Self::EndOfStream)
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Request issued, waiting for the response.
    Connecting,
    /// Reading the body.
    Streaming,
    /// Finished.
    Closed(CloseReason),
}

// ============================================================================
// StreamSession
// ============================================================================

/// Owns one connection attempt.
///
/// # Example
///
/// ```ignore
/// let session = StreamSession::new(SessionId::next(), source, sink, FrameReassembler::default());
/// let reason = session.run(CancellationToken::new()).await;
/// ```
pub struct StreamSession {
    id: SessionId,
    source: Arc<dyn StreamSource>,
    sink: Arc<dyn FrameSink>,
    reassembler: FrameReassembler,
    state: watch::Sender<SessionState>,
}

impl StreamSession {
    /// Creates a session in the [`SessionState::Connecting`] state.
    #[must_use]
    pub fn new(
        id: SessionId,
        source: Arc<dyn StreamSource>,
        sink: Arc<dyn FrameSink>,
        reassembler: FrameReassembler,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            id,
            source,
            sink,
            reassembler,
            state,
        }
    }

    /// Returns the session identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Runs the session until it closes and returns why.
    ///
    /// Frames already queued for delivery keep flowing after a natural close
    /// until `cancel` fires, so the caller must cancel the token once it no
    /// longer wants deliveries from this session.
    pub async fn run(mut self, cancel: CancellationToken) -> CloseReason {
        info!(session_id = %self.id, "Stream session starting");

        let reason = self.read_loop(&cancel).await;
        self.state.send_replace(SessionState::Closed(reason));

        let stats = self.reassembler.stats();
        info!(
            session_id = %self.id,
            ?reason,
            frames = stats.frames_emitted,
            discarded = stats.records_discarded,
            "Stream session closed"
        );

        reason
    }

    async fn read_loop(&mut self, cancel: &CancellationToken) -> CloseReason {
        self.state.send_replace(SessionState::Connecting);

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CloseReason::Aborted,
            opened = self.source.open() => match opened {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(session_id = %self.id, error = %e, "Failed to open stream");
                    return CloseReason::StreamError;
                }
            },
        };

        self.state.send_replace(SessionState::Streaming);

        let mut dispatcher = Dispatcher::new(Arc::clone(&self.sink), cancel.clone());
        let mut frames = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(session_id = %self.id, "Stream cancelled");
                    return CloseReason::Aborted;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    self.reassembler.feed_into(&chunk, &mut frames);
                    for frame in frames.drain(..) {
                        dispatcher.dispatch(frame);
                    }
                }

                Some(Err(e)) => {
                    warn!(session_id = %self.id, error = %e, "Stream read failed");
                    return CloseReason::StreamError;
                }

                None => {
                    debug!(session_id = %self.id, "Stream ended");
                    return CloseReason::EndOfStream;
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as Base64Standard;
    use bytes::Bytes;
    use futures_util::stream;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use crate::error::{Error, Result};
    use crate::protocol::Frame;
    use crate::transport::source::ByteStream;

    fn jpeg(seed: u8) -> String {
        Base64Standard.encode([0xFF, 0xD8, seed, seed, seed, 0x01, 0xFF, 0xD9])
    }

    /// Source that replays a fixed script of chunk results once.
    struct Scripted {
        script: Mutex<Option<Vec<Result<Bytes>>>>,
        hang_after: bool,
    }

    impl Scripted {
        fn new(script: Vec<Result<Bytes>>, hang_after: bool) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(Some(script)),
                hang_after,
            })
        }
    }

    #[async_trait]
    impl StreamSource for Scripted {
        async fn open(&self) -> Result<ByteStream> {
            let script = self.script.lock().take().unwrap_or_default();
            let body: ByteStream = if self.hang_after {
                Box::pin(stream::iter(script).chain(stream::pending()))
            } else {
                Box::pin(stream::iter(script))
            };
            Ok(body)
        }
    }

    struct Refused;

    #[async_trait]
    impl StreamSource for Refused {
        async fn open(&self) -> Result<ByteStream> {
            Err(Error::transport("connection refused"))
        }
    }

    fn channel_sink() -> (Arc<dyn FrameSink>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = move |frame: Frame| -> Result<()> {
            let _ = tx.send(frame);
            Ok(())
        };
        let sink: Arc<dyn FrameSink> = Arc::new(sink);
        (sink, rx)
    }

    fn session(source: Arc<dyn StreamSource>, sink: Arc<dyn FrameSink>) -> StreamSession {
        StreamSession::new(SessionId::next(), source, sink, FrameReassembler::default())
    }

    #[test]
    fn test_close_reason_restart_policy() {
        assert!(CloseReason::StreamError.wants_restart());
        assert!(CloseReason::EndOfStream.wants_restart());
        assert!(!CloseReason::Aborted.wants_restart());
    }

    #[tokio::test]
    async fn test_split_frames_delivered_in_order() {
        let (e1, e2) = (jpeg(1), jpeg(2));
        let source = Scripted::new(
            vec![
                Ok(Bytes::from(format!("a:{}", &e1[..5]))),
                Ok(Bytes::from(format!("{}\nb:{e2}\n", &e1[5..]))),
            ],
            false,
        );
        let (sink, mut rx) = channel_sink();

        let reason = session(source, sink).run(CancellationToken::new()).await;
        assert_eq!(reason, CloseReason::EndOfStream);

        // Lanes are per target, so only per-target order is guaranteed.
        let mut delivered = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        delivered.sort_by(|x, y| x.target_id().cmp(y.target_id()));
        assert_eq!(delivered, vec![Frame::new("a", e1), Frame::new("b", e2)]);
    }

    #[tokio::test]
    async fn test_read_error_closes_with_stream_error() {
        let source = Scripted::new(
            vec![
                Ok(Bytes::from(format!("a:{}\n", jpeg(3)))),
                Err(Error::transport("connection reset")),
            ],
            false,
        );
        let (sink, mut rx) = channel_sink();

        let reason = session(source, sink).run(CancellationToken::new()).await;

        assert_eq!(reason, CloseReason::StreamError);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_open_failure_closes_with_stream_error() {
        let (sink, _rx) = channel_sink();
        let reason = session(Arc::new(Refused), sink)
            .run(CancellationToken::new())
            .await;
        assert_eq!(reason, CloseReason::StreamError);
    }

    #[tokio::test]
    async fn test_cancel_closes_with_aborted() {
        let source = Scripted::new(vec![Ok(Bytes::from(format!("a:{}\n", jpeg(4))))], true);
        let (sink, _rx) = channel_sink();
        let session = session(source, sink);
        let mut state = session.subscribe();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(session.run(cancel.clone()));
        state
            .wait_for(|s| *s == SessionState::Streaming)
            .await
            .unwrap();
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), CloseReason::Aborted);
        assert_eq!(*state.borrow(), SessionState::Closed(CloseReason::Aborted));
    }

    #[tokio::test]
    async fn test_cancel_before_open_aborts() {
        let (sink, _rx) = channel_sink();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reason = session(Arc::new(Refused), sink).run(cancel).await;
        assert_eq!(reason, CloseReason::Aborted);
    }
}
