//! Error types for the framing and value layers.
//!
//! Two conditions are deliberately absent: running out of input mid-frame
//! is reported as partial consumption by [`crate::Dispatcher::feed`], and a
//! frame whose performative has no registered handler is skipped with a
//! diagnostic. Neither endangers the byte stream. Everything here does.

use thiserror::Error;

/// Errors from the typed-value codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown format code {0:#04x}")]
    UnknownFormatCode(u8),

    #[error("truncated value: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("destination buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    #[error("descriptor is not an unsigned integer")]
    InvalidDescriptor,

    #[error("frame body is not a described list")]
    InvalidBody,
}

/// Errors surfaced by the dispatcher's input and output paths.
///
/// All of these are fatal to the stream (or, for [`Encode`], to the frame
/// being posted): the dispatcher never resynchronizes after one.
///
/// [`Encode`]: DispatchError::Encode
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("frame type mismatch: expected {expected:#04x}, got {actual:#04x}")]
    FrameTypeMismatch { expected: u8, actual: u8 },

    #[error("frame size {size} below the 8-byte minimum")]
    FrameTooSmall { size: u32 },

    #[error("invalid data offset {doff} for frame of {size} bytes")]
    InvalidDataOffset { doff: u8, size: u32 },

    #[error("frame body decode failed: {0}")]
    Decode(#[source] CodecError),

    #[error("frame encode failed: {0}")]
    Encode(#[source] CodecError),

    #[error("performative descriptor {0} outside one-byte code space")]
    PerformativeOutOfRange(u64),

    #[error("handler failed: {0}")]
    Handler(String),
}
