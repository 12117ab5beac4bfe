//! Fixed frame header and described-body composition.
//!
//! Frame layout (8-byte header + body + optional trailing payload):
//!
//! ```text
//! +--------+--------+--------+---------+------------------+---------+
//! |  size  |  doff  |  type  | channel | body (described  | payload |
//! | 4 bytes| 1 byte | 1 byte | 2 bytes | value at doff*4) |         |
//! +--------+--------+--------+---------+------------------+---------+
//! ```
//!
//! All integers are big-endian. `size` spans the whole frame including
//! the header; `doff` gives the body start in 4-byte words, leaving room
//! for extended headers. The body is a described value: constructor
//! `0x00`, a descriptor identifying the performative, then the argument
//! list. Bytes between the end of the body and `size` are the payload.

use crate::error::{CodecError, DispatchError};
use crate::value::{self, Value};
use bytes::BufMut;

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Minimum data offset: the two mandatory header words.
pub const MIN_DOFF: u8 = 2;

/// A parsed fixed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub size: u32,
    pub doff: u8,
    pub frame_type: u8,
    pub channel: u16,
}

impl FrameHeader {
    /// Reads a header from the front of `buf`, or `None` if fewer than
    /// [`FRAME_HEADER_SIZE`] bytes are available. No validation happens
    /// here; see [`validate`](FrameHeader::validate).
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }
        Some(Self {
            size: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            doff: buf[4],
            frame_type: buf[5],
            channel: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    /// Checks the header invariants against the dispatcher's configured
    /// frame type. Any violation is fatal to the stream.
    pub fn validate(&self, expected_type: u8) -> Result<(), DispatchError> {
        if (self.size as usize) < FRAME_HEADER_SIZE {
            return Err(DispatchError::FrameTooSmall { size: self.size });
        }
        if self.frame_type != expected_type {
            return Err(DispatchError::FrameTypeMismatch {
                expected: expected_type,
                actual: self.frame_type,
            });
        }
        if self.doff < MIN_DOFF || self.body_offset() > self.size as usize {
            return Err(DispatchError::InvalidDataOffset {
                doff: self.doff,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Byte offset at which the frame body begins.
    pub fn body_offset(&self) -> usize {
        usize::from(self.doff) * 4
    }

    /// Appends the 8 header bytes to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.size);
        buf.put_u8(self.doff);
        buf.put_u8(self.frame_type);
        buf.put_u16(self.channel);
    }
}

/// Decodes a described body: descriptor then argument list. The reusable
/// `args` vec is cleared and repopulated in wire order. Returns the
/// descriptor and the number of body bytes consumed.
pub(crate) fn decode_described(body: &[u8], args: &mut Vec<Value>) -> Result<(u64, usize), CodecError> {
    if body.first() != Some(&value::FC_DESCRIBED) {
        return Err(CodecError::InvalidBody);
    }
    let (descriptor, desc_len) = Value::decode(&body[1..])?;
    let descriptor = descriptor
        .as_unsigned()
        .ok_or(CodecError::InvalidDescriptor)?;
    let (fields, list_len) = Value::decode(&body[1 + desc_len..])?;
    args.clear();
    match fields {
        Value::List(items) => args.extend(items),
        _ => return Err(CodecError::InvalidBody),
    }
    Ok((descriptor, 1 + desc_len + list_len))
}

/// Encoded length of a described body for `code` and `args`.
pub(crate) fn described_len(code: u8, args: &[Value]) -> usize {
    1 + Value::ULong(u64::from(code)).encoded_len() + value::list_slice_len(args)
}

/// Encodes a described body into `dst`, returning bytes written.
pub(crate) fn encode_described(code: u8, args: &[Value], dst: &mut [u8]) -> Result<usize, CodecError> {
    let needed = described_len(code, args);
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            have: dst.len(),
        });
    }
    dst[0] = value::FC_DESCRIBED;
    let mut pos = 1;
    pos += Value::ULong(u64::from(code)).encode(&mut dst[pos..])?;
    pos += value::encode_list_slice(args, &mut dst[pos..]);
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_roundtrip() {
        let header = FrameHeader {
            size: 24,
            doff: 2,
            frame_type: 0,
            channel: 5,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), FRAME_HEADER_SIZE);
        assert_eq!(FrameHeader::parse(&buf), Some(header));
    }

    #[test]
    fn test_header_parse_short_input() {
        assert!(FrameHeader::parse(&[0, 0, 0, 24, 2]).is_none());
    }

    #[test]
    fn test_header_validate() {
        let ok = FrameHeader { size: 16, doff: 2, frame_type: 0, channel: 0 };
        assert!(ok.validate(0).is_ok());

        let small = FrameHeader { size: 4, ..ok };
        assert!(matches!(
            small.validate(0),
            Err(DispatchError::FrameTooSmall { size: 4 })
        ));

        let wrong_type = FrameHeader { frame_type: 1, ..ok };
        assert!(matches!(
            wrong_type.validate(0),
            Err(DispatchError::FrameTypeMismatch { expected: 0, actual: 1 })
        ));

        let low_doff = FrameHeader { doff: 1, ..ok };
        assert!(matches!(
            low_doff.validate(0),
            Err(DispatchError::InvalidDataOffset { doff: 1, .. })
        ));

        // doff points past the end of the frame
        let far_doff = FrameHeader { doff: 5, ..ok };
        assert!(matches!(
            far_doff.validate(0),
            Err(DispatchError::InvalidDataOffset { doff: 5, .. })
        ));
    }

    #[test]
    fn test_extended_header_offset() {
        let header = FrameHeader { size: 32, doff: 4, frame_type: 0, channel: 0 };
        assert!(header.validate(0).is_ok());
        assert_eq!(header.body_offset(), 16);
    }

    #[test]
    fn test_described_body_roundtrip() {
        let args = vec![
            Value::String("container".to_string()),
            Value::UInt(512),
        ];
        let mut buf = vec![0u8; described_len(0x10, &args)];
        let written = encode_described(0x10, &args, &mut buf).unwrap();
        assert_eq!(written, buf.len());

        let mut decoded = Vec::new();
        let (code, consumed) = decode_described(&buf, &mut decoded).unwrap();
        assert_eq!(code, 0x10);
        assert_eq!(consumed, written);
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_described_body_empty_args() {
        let mut buf = vec![0u8; described_len(0x17, &[])];
        encode_described(0x17, &[], &mut buf).unwrap();

        let mut decoded = vec![Value::Bool(true)]; // stale contents get cleared
        let (code, _) = decode_described(&buf, &mut decoded).unwrap();
        assert_eq!(code, 0x17);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_described_rejects_bare_value() {
        // list without the 0x00 described constructor
        let mut decoded = Vec::new();
        assert!(matches!(
            decode_described(&[0x45], &mut decoded),
            Err(CodecError::InvalidBody)
        ));
    }

    #[test]
    fn test_decode_described_rejects_non_integer_descriptor() {
        // descriptor is a string
        let body = [0x00, 0xa1, 0x01, b'x', 0x45];
        let mut decoded = Vec::new();
        assert!(matches!(
            decode_described(&body, &mut decoded),
            Err(CodecError::InvalidDescriptor)
        ));
    }

    #[test]
    fn test_decode_described_rejects_non_list_args() {
        // descriptor 0x10 followed by a uint instead of a list
        let body = [0x00, 0x53, 0x10, 0x52, 0x07];
        let mut decoded = Vec::new();
        assert!(matches!(
            decode_described(&body, &mut decoded),
            Err(CodecError::InvalidBody)
        ));
    }

    #[test]
    fn test_encode_described_buffer_too_small() {
        let args = vec![Value::String("hello".to_string())];
        let mut buf = [0u8; 4];
        assert!(matches!(
            encode_described(0x10, &args, &mut buf),
            Err(CodecError::BufferTooSmall { .. })
        ));
    }
}
