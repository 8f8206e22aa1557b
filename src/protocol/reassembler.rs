//! Record reassembly across arbitrary chunk boundaries.
//!
//! The stream body is a sequence of `target_id:payload` records separated by
//! a single delimiter character. Network chunks carry no meaning, so a record
//! may be cut anywhere, including inside a multi-byte character.
//!
//! # Algorithm
//!
//! On every [`FrameReassembler::feed`]:
//!
//! 1. Decode the chunk to text (holding back partial UTF-8 sequences).
//! 2. Prefix the pending tail from the previous chunk.
//! 3. Split on the delimiter. Every token except the last is a finished
//!    record: emit it if it parses, otherwise drop it.
//! 4. The last token is emitted if it already holds a complete image,
//!    otherwise it becomes the new pending tail.
//!
//! Feeding a byte sequence in any partition yields the same frames as
//! feeding it whole, as long as no proper prefix of a record happens to be
//! a complete image on its own.

// ============================================================================
// Imports
// ============================================================================

use std::mem;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::decoder::Utf8Decoder;
use super::frame::Frame;

// ============================================================================
// Delimiter
// ============================================================================

/// Character separating records on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// `\n` between records.
    #[default]
    Newline,
    /// A single space between records (older servers).
    Space,
}

impl Delimiter {
    /// Returns the delimiter character.
    #[inline]
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Newline => '\n',
            Self::Space => ' ',
        }
    }
}

// ============================================================================
// ReassemblerStats
// ============================================================================

/// Counters kept by a [`FrameReassembler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames emitted.
    pub frames_emitted: u64,
    /// Non-empty records dropped as malformed.
    pub records_discarded: u64,
    /// Pending tails dropped for exceeding the size limit.
    pub tails_overflowed: u64,
}

// ============================================================================
// FrameReassembler
// ============================================================================

/// Turns raw byte chunks into validated [`Frame`]s.
///
/// # Example
///
/// ```ignore
/// let mut reassembler = FrameReassembler::new(Delimiter::Newline);
/// for frame in reassembler.feed(b"cam1:/9j/...") {
///     println!("{}", frame.target_id());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FrameReassembler {
    delimiter: Delimiter,
    decoder: Utf8Decoder,
    /// Text after the last delimiter that is not yet a complete record.
    pending: String,
    /// Upper bound for `pending`, in bytes. `None` keeps it unbounded.
    max_pending: Option<usize>,
    stats: ReassemblerStats,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(Delimiter::default())
    }
}

impl FrameReassembler {
    /// Creates a reassembler with an unbounded pending tail.
    #[must_use]
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            decoder: Utf8Decoder::new(),
            pending: String::new(),
            max_pending: None,
            stats: ReassemblerStats::default(),
        }
    }

    /// Limits the pending tail to `max` bytes.
    ///
    /// A tail that grows past the limit is dropped.
    #[must_use]
    pub fn with_max_pending(mut self, max: Option<usize>) -> Self {
        self.max_pending = max;
        self
    }

    /// Returns the configured delimiter.
    #[inline]
    #[must_use]
    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Returns the length of the pending tail in bytes.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    /// Discards the pending tail and any partial character.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.decoder.reset();
    }

    /// Feeds one chunk and returns the frames it completes, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        self.feed_into(chunk, &mut frames);
        frames
    }

    /// Like [`feed`](Self::feed), appending to `frames`.
    pub fn feed_into(&mut self, chunk: &[u8], frames: &mut Vec<Frame>) {
        let text = self.decoder.decode(chunk);
        if text.is_empty() {
            return;
        }

        let mut buffer = mem::take(&mut self.pending);
        buffer.push_str(&text);

        let mut tokens = buffer.split(self.delimiter.as_char());
        let last = tokens.next_back().unwrap_or_default();

        for record in tokens {
            self.accept(record, frames);
        }

        match Frame::parse_record(last) {
            Ok(frame) => {
                self.stats.frames_emitted += 1;
                frames.push(frame);
            }
            Err(_) => self.hold(last),
        }
    }

    /// Emits or drops a delimiter-terminated record.
    fn accept(&mut self, record: &str, frames: &mut Vec<Frame>) {
        if record.is_empty() {
            return;
        }

        match Frame::parse_record(record) {
            Ok(frame) => {
                trace!(target_id = %frame.target_id(), len = frame.payload().len(), "Frame reassembled");
                self.stats.frames_emitted += 1;
                frames.push(frame);
            }
            Err(e) => {
                trace!(error = %e, len = record.len(), "Discarding record");
                self.stats.records_discarded += 1;
            }
        }
    }

    /// Stores `tail` as the pending tail, enforcing the size limit.
    fn hold(&mut self, tail: &str) {
        if let Some(max) = self.max_pending
            && tail.len() > max
        {
            warn!(len = tail.len(), max, "Pending tail exceeded limit, dropping");
            self.stats.tails_overflowed += 1;
            self.pending.clear();
            return;
        }

        self.pending.clear();
        self.pending.push_str(tail);
    }
}

// ============================================================================
// Tests
// ============================================================================
