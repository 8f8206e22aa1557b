//! Addressed image frames.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

use super::validator::is_complete_image;

// ============================================================================
// Constants
// ============================================================================

/// Separator between target id and payload inside a record.
pub const TARGET_SEPARATOR: char = ':';

// ============================================================================
// Frame
// ============================================================================

/// One complete, validated image update for a single display surface.
///
/// # Format
///
/// ```text
/// <target_id>:<base64 jpeg>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    target_id: TargetId,
    payload: String,
}

impl Frame {
    /// Creates a frame without validating the payload.
    #[inline]
    #[must_use]
    pub fn new(target_id: impl Into<TargetId>, payload: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            payload: payload.into(),
        }
    }

    /// Parses and validates one `target_id:payload` record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the separator is missing, the
    /// target id is empty, or the payload is not a complete image.
    pub fn parse_record(record: &str) -> Result<Self> {
        let (target_id, payload) = record
            .split_once(TARGET_SEPARATOR)
            .ok_or_else(|| Error::malformed("missing target separator"))?;

        if target_id.is_empty() {
            return Err(Error::malformed("empty target id"));
        }

        if !is_complete_image(payload) {
            return Err(Error::malformed("incomplete or corrupt image payload"));
        }

        Ok(Self::new(target_id, payload))
    }

    /// Returns the addressed surface.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    /// Returns the base64 payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Splits the frame into its parts.
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (TargetId, String) {
        (self.target_id, self.payload)
    }

    /// Decodes the payload into raw JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Base64`] if the payload is not valid base64.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        Ok(Base64Standard.decode(&self.payload)?)
    }

    /// Returns the payload as a `data:` URI suitable for an image element.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.payload)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::validator::JPEG_TRAILER;

    fn jpeg_payload() -> String {
        Base64Standard.encode([0xFF, 0xD8, 0x00, 0x11, JPEG_TRAILER[0], JPEG_TRAILER[1]])
    }

    #[test]
    fn test_parse_record() {
        let payload = jpeg_payload();
        let frame = Frame::parse_record(&format!("cam1:{payload}")).unwrap();
        assert_eq!(frame.target_id().as_str(), "cam1");
        assert_eq!(frame.payload(), payload);
    }

    #[test]
    fn test_parse_record_without_separator() {
        let err = Frame::parse_record(&jpeg_payload()).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame { .. }));
    }

    #[test]
    fn test_parse_record_empty_target() {
        let err = Frame::parse_record(&format!(":{}", jpeg_payload())).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedFrame {
                reason: "empty target id"
            }
        ));
    }

    #[test]
    fn test_parse_record_incomplete_payload() {
        let payload = jpeg_payload();
        let record = format!("cam1:{}", &payload[..4]);
        assert!(Frame::parse_record(&record).is_err());
    }

    #[test]
    fn test_decode_payload() {
        let frame = Frame::new("cam1", jpeg_payload());
        let bytes = frame.decode_payload().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(bytes.ends_with(&JPEG_TRAILER));
    }

    #[test]
    fn test_data_uri() {
        let frame = Frame::new("cam1", "AAAA");
        assert_eq!(frame.data_uri(), "data:image/jpeg;base64,AAAA");
    }
}
