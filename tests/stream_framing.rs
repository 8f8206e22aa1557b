//! Framing behavior over whole sessions, as a frame server emits it.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use bytes::Bytes;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use framegrid::{
    ByteStream, CloseReason, Delimiter, Error, Frame, FrameReassembler, FrameSink, Result,
    SessionId, StreamSession, StreamSource,
};

// ============================================================================
// Helpers
// ============================================================================

fn jpeg(seed: u8, body_len: usize) -> String {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.extend((0..body_len).map(|i| (i as u8).wrapping_add(seed) & 0x7F));
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    Base64Standard.encode(bytes)
}

/// One server tick: every target's latest image, each followed by the delimiter.
fn mix(frames: &[(&str, &str)], delimiter: Delimiter) -> String {
    frames
        .iter()
        .map(|(target, payload)| format!("{target}:{payload}{}", delimiter.as_char()))
        .collect()
}

/// Serves a fixed body split at the given byte offsets.
struct SplitBody {
    body: Vec<u8>,
    cuts: Vec<usize>,
}

#[async_trait]
impl StreamSource for SplitBody {
    async fn open(&self) -> Result<ByteStream> {
        let mut chunks: Vec<Result<Bytes>> = Vec::new();
        let mut start = 0;
        for &cut in self.cuts.iter().chain([self.body.len()].iter()) {
            chunks.push(Ok(Bytes::copy_from_slice(&self.body[start..cut])));
            start = cut;
        }
        Ok(Box::pin(stream::iter(chunks)))
    }
}

fn collecting_sink() -> (Arc<dyn FrameSink>, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = move |frame: Frame| -> Result<()> {
        let target_id = frame.target_id().clone();
        tx.send(frame).map_err(|_| Error::sink(target_id, "receiver closed"))
    };
    let sink: Arc<dyn FrameSink> = Arc::new(sink);
    (sink, rx)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn server_ticks_split_anywhere_reach_every_target() -> anyhow::Result<()> {
    let (a1, b1, a2) = (jpeg(1, 60), jpeg(2, 44), jpeg(3, 70));
    let body = format!(
        "{}{}",
        mix(&[("bot-1", &a1), ("bot-2", &b1)], Delimiter::Newline),
        mix(&[("bot-1", &a2)], Delimiter::Newline)
    );

    let (reason, mut frames) = tokio_test::block_on(async {
        let source = Arc::new(SplitBody {
            cuts: vec![3, 40, 81, body.len() - 2],
            body: body.clone().into_bytes(),
        });
        let (sink, mut rx) = collecting_sink();
        let session = StreamSession::new(
            SessionId::next(),
            source,
            sink,
            FrameReassembler::default(),
        );

        let reason = session.run(CancellationToken::new()).await;
        // Lanes drain and drop the sink once the session is gone.
        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        (reason, frames)
    });

    assert_eq!(reason, CloseReason::EndOfStream);

    let bot_1: Vec<_> = frames
        .iter()
        .filter(|f| f.target_id().as_str() == "bot-1")
        .map(|f| f.payload().to_owned())
        .collect();
    // An older frame may be replaced by a newer one before delivery, but the
    // newest frame always lands and order is kept.
    assert_eq!(bot_1.last(), Some(&a2));
    assert!(bot_1 == vec![a2.clone()] || bot_1 == vec![a1, a2]);

    frames.retain(|f| f.target_id().as_str() == "bot-2");
    assert_eq!(frames, vec![Frame::new("bot-2", b1)]);
    Ok(())
}

#[test]
fn legacy_space_delimited_server() -> anyhow::Result<()> {
    let (a, b) = (jpeg(4, 33), jpeg(5, 34));
    let body = mix(&[("left", &a), ("right", &b)], Delimiter::Space);

    let mut reassembler = FrameReassembler::new(Delimiter::Space);
    let mut frames = Vec::new();
    for chunk in body.as_bytes().chunks(7) {
        reassembler.feed_into(chunk, &mut frames);
    }

    assert_eq!(frames, vec![Frame::new("left", a), Frame::new("right", b)]);
    assert_eq!(reassembler.pending_len(), 0);
    assert_eq!(reassembler.stats().records_discarded, 0);
    Ok(())
}

#[test]
fn multibyte_target_ids_survive_chunk_splits() -> anyhow::Result<()> {
    let payload = jpeg(6, 21);
    let body = format!("câmara-ñ:{payload}\n");
    let bytes = body.as_bytes();

    let mut reassembler = FrameReassembler::default();
    let mut frames = reassembler.feed(&bytes[..2]);
    frames.extend(reassembler.feed(&bytes[2..]));

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].target_id().as_str(), "câmara-ñ");
    assert_ok!(frames[0].decode_payload());
    Ok(())
}

#[test]
fn corrupt_records_are_dropped_not_fatal() -> anyhow::Result<()> {
    let good = jpeg(7, 18);
    let body = format!("garbage\nbot:%%%%\n:{good}\nbot:{good}\n");

    let mut reassembler = FrameReassembler::default();
    let frames = reassembler.feed(body.as_bytes());

    assert_eq!(frames, vec![Frame::new("bot", good)]);
    assert_eq!(reassembler.stats().records_discarded, 3);
    assert_err!(Frame::parse_record("garbage"));
    Ok(())
}

#[test]
fn pending_limit_bounds_a_runaway_record() -> anyhow::Result<()> {
    let mut reassembler = FrameReassembler::default().with_max_pending(Some(64));
    let runaway = "bot:".to_owned() + &"A".repeat(127);

    assert!(reassembler.feed(runaway.as_bytes()).is_empty());
    assert_eq!(reassembler.pending_len(), 0);
    assert_eq!(reassembler.stats().tails_overflowed, 1);

    let good = jpeg(8, 10);
    let frames = reassembler.feed(format!("\nbot:{good}\n").as_bytes());
    assert_eq!(frames, vec![Frame::new("bot", good)]);
    Ok(())
}
