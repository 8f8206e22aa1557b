//! Incremental UTF-8 decoding across chunk boundaries.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::mem;
use std::str;

// ============================================================================
// Constants
// ============================================================================

const REPLACEMENT: char = '\u{FFFD}';

// ============================================================================
// Utf8Decoder
// ============================================================================

/// Stateful UTF-8 decoder.
///
/// A multi-byte sequence cut by a chunk boundary is held back until the next
/// chunk completes it. Invalid sequences become U+FFFD.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    /// Bytes of an unfinished sequence from the previous chunk (at most 3).
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates a decoder with no buffered bytes.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk`, prefixed by any bytes held from the previous call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = str::from_utf8(valid) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Returns `true` if an unfinished sequence is buffered.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drops any buffered bytes.
    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
