//! Frame stream wire protocol.
//!
//! The stream body is plain text: a sequence of records separated by a
//! single delimiter character.
//!
//! ```text
//! cam1:/9j/4AAQSkZJRg...//2Q==\ncam2:/9j/4AAQSkZJRg...//2Q==\n...
//! ```
//!
//! Each record is `target_id ":" payload`, where the payload is standard
//! base64 of a JPEG image. A payload is only accepted once its decoded bytes
//! end with the JPEG end-of-image marker `FF D9`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `decoder` | Incremental UTF-8 decoding |
//! | `frame` | [`Frame`] type and record parsing |
//! | `reassembler` | Chunk-to-frame reassembly |
//! | `validator` | Payload completeness check |

// ============================================================================
// Submodules
// ============================================================================

/// Incremental UTF-8 decoding.
pub mod decoder;

/// Addressed image frames.
pub mod frame;

/// Chunk-to-frame reassembly.
pub mod reassembler;

/// Payload completeness check.
pub mod validator;

// ============================================================================
// Re-exports
// ============================================================================

pub use decoder::Utf8Decoder;
pub use frame::Frame;
pub use reassembler::{Delimiter, FrameReassembler, ReassemblerStats};
pub use validator::{JPEG_TRAILER, is_complete_image};
