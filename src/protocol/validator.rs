//! Completeness check for base64-encoded JPEG payloads.
//!
//! A payload counts as complete when it is well-formed standard base64 and
//! the decoded bytes end with the JPEG end-of-image marker. The same check
//! answers "has this frame finished arriving" and "is this frame intact":
//! a payload that fails it may still be in flight or may be corrupt, and
//! callers cannot tell which.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;

// ============================================================================
// Constants
// ============================================================================

/// JPEG end-of-image marker.
pub const JPEG_TRAILER: [u8; 2] = [0xFF, 0xD9];

/// Number of trailing characters decoded for the cheap trailer probe.
///
/// Two base64 blocks always cover the last two decoded bytes, even when the
/// final block carries `==` padding.
const TAIL_PROBE_LEN: usize = 8;

// ============================================================================
// Functions
// ============================================================================

/// Returns `true` if `payload` decodes to bytes ending in [`JPEG_TRAILER`].
///
/// Rejects without decoding when the length is not a multiple of four, then
/// probes the last two blocks before decoding the whole payload.
#[must_use]
pub fn is_complete_image(payload: &str) -> bool {
    if payload.len() < 4 || !payload.len().is_multiple_of(4) {
        return false;
    }

    let tail_start = payload.len().saturating_sub(TAIL_PROBE_LEN);
    match Base64Standard.decode(&payload.as_bytes()[tail_start..]) {
        Ok(tail) if tail.ends_with(&JPEG_TRAILER) => {}
        _ => return false,
    }

    if tail_start == 0 {
        return true;
    }

    match Base64Standard.decode(payload) {
        Ok(bytes) => bytes.ends_with(&JPEG_TRAILER),
        Err(_) => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
