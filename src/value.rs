//! Typed-value codec for frame bodies.
//!
//! Implements the AMQP 1.0 primitive encodings the dispatcher needs:
//! fixed-width scalars, variable-width binary/string/symbol, and lists.
//! Compact constructors (`uint0`, `smalluint`, `list8`, ...) are accepted
//! on decode; the encoder emits the compact form where one exists so
//! round-trips stay byte-stable.
//!
//! The encoder writes into a caller-provided slice and reports
//! [`CodecError::BufferTooSmall`] when the value does not fit, which is
//! what lets the dispatcher try its fixed scratch region first and fall
//! back to the output buffer only for oversized bodies.

use crate::error::CodecError;
use bytes::Bytes;

// AMQP 1.0 format codes.
pub(crate) const FC_DESCRIBED: u8 = 0x00;
const FC_NULL: u8 = 0x40;
const FC_TRUE: u8 = 0x41;
const FC_FALSE: u8 = 0x42;
const FC_BOOL: u8 = 0x56;
const FC_UBYTE: u8 = 0x50;
const FC_USHORT: u8 = 0x60;
const FC_UINT: u8 = 0x70;
const FC_SMALLUINT: u8 = 0x52;
const FC_UINT0: u8 = 0x43;
const FC_ULONG: u8 = 0x80;
const FC_SMALLULONG: u8 = 0x53;
const FC_ULONG0: u8 = 0x44;
const FC_BYTE: u8 = 0x51;
const FC_SHORT: u8 = 0x61;
const FC_INT: u8 = 0x71;
const FC_SMALLINT: u8 = 0x54;
const FC_LONG: u8 = 0x81;
const FC_SMALLLONG: u8 = 0x55;
const FC_FLOAT: u8 = 0x72;
const FC_DOUBLE: u8 = 0x82;
const FC_VBIN8: u8 = 0xa0;
const FC_VBIN32: u8 = 0xb0;
const FC_STR8: u8 = 0xa1;
const FC_STR32: u8 = 0xb1;
const FC_SYM8: u8 = 0xa3;
const FC_SYM32: u8 = 0xb3;
const FC_LIST0: u8 = 0x45;
const FC_LIST8: u8 = 0xc0;
const FC_LIST32: u8 = 0xd0;

/// A decoded AMQP value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    UByte(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Binary(Bytes),
    String(String),
    Symbol(String),
    List(Vec<Value>),
}

impl Value {
    /// Returns the value as an unsigned integer if it is one of the
    /// unsigned kinds. Descriptors are read through this.
    pub fn as_unsigned(&self) -> Option<u64> {
        match *self {
            Value::UByte(v) => Some(u64::from(v)),
            Value::UShort(v) => Some(u64::from(v)),
            Value::UInt(v) => Some(u64::from(v)),
            Value::ULong(v) => Some(v),
            _ => None,
        }
    }

    /// Exact number of bytes [`encode`](Value::encode) will produce.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Null => 1,
            Value::Bool(_) => 1,
            Value::UByte(_) => 2,
            Value::UShort(_) => 3,
            Value::UInt(0) => 1,
            Value::UInt(v) if *v <= 0xff => 2,
            Value::UInt(_) => 5,
            Value::ULong(0) => 1,
            Value::ULong(v) if *v <= 0xff => 2,
            Value::ULong(_) => 9,
            Value::Byte(_) => 2,
            Value::Short(_) => 3,
            Value::Int(v) if i8::try_from(*v).is_ok() => 2,
            Value::Int(_) => 5,
            Value::Long(v) if i8::try_from(*v).is_ok() => 2,
            Value::Long(_) => 9,
            Value::Float(_) => 5,
            Value::Double(_) => 9,
            Value::Binary(b) if b.len() <= 0xff => 2 + b.len(),
            Value::Binary(b) => 5 + b.len(),
            Value::String(s) if s.len() <= 0xff => 2 + s.len(),
            Value::String(s) => 5 + s.len(),
            Value::Symbol(s) if s.len() <= 0xff => 2 + s.len(),
            Value::Symbol(s) => 5 + s.len(),
            // constructor + size:u32 + count:u32 + elements, or list0
            Value::List(items) => list_slice_len(items),
        }
    }

    /// Encodes the value into `dst`, returning the number of bytes written.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, CodecError> {
        let needed = self.encoded_len();
        if dst.len() < needed {
            return Err(CodecError::BufferTooSmall {
                needed,
                have: dst.len(),
            });
        }
        let written = self.encode_unchecked(dst);
        debug_assert_eq!(written, needed);
        Ok(written)
    }

    // Capacity was verified by encode(); every write below is in bounds.
    fn encode_unchecked(&self, dst: &mut [u8]) -> usize {
        match self {
            Value::Null => {
                dst[0] = FC_NULL;
                1
            }
            Value::Bool(true) => {
                dst[0] = FC_TRUE;
                1
            }
            Value::Bool(false) => {
                dst[0] = FC_FALSE;
                1
            }
            Value::UByte(v) => {
                dst[0] = FC_UBYTE;
                dst[1] = *v;
                2
            }
            Value::UShort(v) => {
                dst[0] = FC_USHORT;
                dst[1..3].copy_from_slice(&v.to_be_bytes());
                3
            }
            Value::UInt(0) => {
                dst[0] = FC_UINT0;
                1
            }
            Value::UInt(v) if *v <= 0xff => {
                dst[0] = FC_SMALLUINT;
                dst[1] = *v as u8;
                2
            }
            Value::UInt(v) => {
                dst[0] = FC_UINT;
                dst[1..5].copy_from_slice(&v.to_be_bytes());
                5
            }
            Value::ULong(0) => {
                dst[0] = FC_ULONG0;
                1
            }
            Value::ULong(v) if *v <= 0xff => {
                dst[0] = FC_SMALLULONG;
                dst[1] = *v as u8;
                2
            }
            Value::ULong(v) => {
                dst[0] = FC_ULONG;
                dst[1..9].copy_from_slice(&v.to_be_bytes());
                9
            }
            Value::Byte(v) => {
                dst[0] = FC_BYTE;
                dst[1] = *v as u8;
                2
            }
            Value::Short(v) => {
                dst[0] = FC_SHORT;
                dst[1..3].copy_from_slice(&v.to_be_bytes());
                3
            }
            Value::Int(v) => {
                if let Ok(small) = i8::try_from(*v) {
                    dst[0] = FC_SMALLINT;
                    dst[1] = small as u8;
                    2
                } else {
                    dst[0] = FC_INT;
                    dst[1..5].copy_from_slice(&v.to_be_bytes());
                    5
                }
            }
            Value::Long(v) => {
                if let Ok(small) = i8::try_from(*v) {
                    dst[0] = FC_SMALLLONG;
                    dst[1] = small as u8;
                    2
                } else {
                    dst[0] = FC_LONG;
                    dst[1..9].copy_from_slice(&v.to_be_bytes());
                    9
                }
            }
            Value::Float(v) => {
                dst[0] = FC_FLOAT;
                dst[1..5].copy_from_slice(&v.to_be_bytes());
                5
            }
            Value::Double(v) => {
                dst[0] = FC_DOUBLE;
                dst[1..9].copy_from_slice(&v.to_be_bytes());
                9
            }
            Value::Binary(b) => encode_variable(dst, FC_VBIN8, FC_VBIN32, b),
            Value::String(s) => encode_variable(dst, FC_STR8, FC_STR32, s.as_bytes()),
            Value::Symbol(s) => encode_variable(dst, FC_SYM8, FC_SYM32, s.as_bytes()),
            Value::List(items) => encode_list_slice(items, dst),
        }
    }

    /// Decodes one value from the front of `src`, returning it together
    /// with the number of bytes consumed.
    pub fn decode(src: &[u8]) -> Result<(Value, usize), CodecError> {
        let code = *src.first().ok_or(CodecError::Truncated { needed: 1, have: 0 })?;
        let rest = &src[1..];
        let (value, consumed) = match code {
            FC_NULL => (Value::Null, 0),
            FC_TRUE => (Value::Bool(true), 0),
            FC_FALSE => (Value::Bool(false), 0),
            FC_BOOL => {
                let b = take(rest, 1)?;
                (Value::Bool(b[0] != 0), 1)
            }
            FC_UBYTE => {
                let b = take(rest, 1)?;
                (Value::UByte(b[0]), 1)
            }
            FC_USHORT => {
                let b = take(rest, 2)?;
                (Value::UShort(u16::from_be_bytes([b[0], b[1]])), 2)
            }
            FC_UINT0 => (Value::UInt(0), 0),
            FC_SMALLUINT => {
                let b = take(rest, 1)?;
                (Value::UInt(u32::from(b[0])), 1)
            }
            FC_UINT => {
                let b = take(rest, 4)?;
                (Value::UInt(u32::from_be_bytes([b[0], b[1], b[2], b[3]])), 4)
            }
            FC_ULONG0 => (Value::ULong(0), 0),
            FC_SMALLULONG => {
                let b = take(rest, 1)?;
                (Value::ULong(u64::from(b[0])), 1)
            }
            FC_ULONG => {
                let b = take(rest, 8)?;
                (Value::ULong(u64::from_be_bytes(b.try_into().unwrap())), 8)
            }
            FC_BYTE => {
                let b = take(rest, 1)?;
                (Value::Byte(b[0] as i8), 1)
            }
            FC_SHORT => {
                let b = take(rest, 2)?;
                (Value::Short(i16::from_be_bytes([b[0], b[1]])), 2)
            }
            FC_SMALLINT => {
                let b = take(rest, 1)?;
                (Value::Int(i32::from(b[0] as i8)), 1)
            }
            FC_INT => {
                let b = take(rest, 4)?;
                (Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]])), 4)
            }
            FC_SMALLLONG => {
                let b = take(rest, 1)?;
                (Value::Long(i64::from(b[0] as i8)), 1)
            }
            FC_LONG => {
                let b = take(rest, 8)?;
                (Value::Long(i64::from_be_bytes(b.try_into().unwrap())), 8)
            }
            FC_FLOAT => {
                let b = take(rest, 4)?;
                (Value::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]])), 4)
            }
            FC_DOUBLE => {
                let b = take(rest, 8)?;
                (Value::Double(f64::from_be_bytes(b.try_into().unwrap())), 8)
            }
            FC_VBIN8 | FC_VBIN32 => {
                let (data, consumed) = decode_variable(rest, code == FC_VBIN8)?;
                (Value::Binary(Bytes::copy_from_slice(data)), consumed)
            }
            FC_STR8 | FC_STR32 => {
                let (data, consumed) = decode_variable(rest, code == FC_STR8)?;
                let s = std::str::from_utf8(data).map_err(|_| CodecError::InvalidUtf8)?;
                (Value::String(s.to_string()), consumed)
            }
            FC_SYM8 | FC_SYM32 => {
                let (data, consumed) = decode_variable(rest, code == FC_SYM8)?;
                let s = std::str::from_utf8(data).map_err(|_| CodecError::InvalidUtf8)?;
                (Value::Symbol(s.to_string()), consumed)
            }
            FC_LIST0 => (Value::List(Vec::new()), 0),
            FC_LIST8 | FC_LIST32 => decode_list(rest, code == FC_LIST8)?,
            other => return Err(CodecError::UnknownFormatCode(other)),
        };
        Ok((value, 1 + consumed))
    }
}

/// Encoded length of `items` as a list value, without building a
/// [`Value::List`] around a borrowed slice.
pub(crate) fn list_slice_len(items: &[Value]) -> usize {
    if items.is_empty() {
        1
    } else {
        9 + items.iter().map(Value::encoded_len).sum::<usize>()
    }
}

/// Encodes `items` as a list value. `dst` must hold [`list_slice_len`]
/// bytes; the caller checks capacity up front.
pub(crate) fn encode_list_slice(items: &[Value], dst: &mut [u8]) -> usize {
    if items.is_empty() {
        dst[0] = FC_LIST0;
        return 1;
    }
    dst[0] = FC_LIST32;
    let mut pos = 9;
    for item in items {
        pos += item.encode_unchecked(&mut dst[pos..]);
    }
    let size = (pos - 5) as u32;
    dst[1..5].copy_from_slice(&size.to_be_bytes());
    dst[5..9].copy_from_slice(&(items.len() as u32).to_be_bytes());
    pos
}

fn take(src: &[u8], n: usize) -> Result<&[u8], CodecError> {
    if src.len() < n {
        return Err(CodecError::Truncated {
            needed: n,
            have: src.len(),
        });
    }
    Ok(&src[..n])
}

fn encode_variable(dst: &mut [u8], code8: u8, code32: u8, data: &[u8]) -> usize {
    if data.len() <= 0xff {
        dst[0] = code8;
        dst[1] = data.len() as u8;
        dst[2..2 + data.len()].copy_from_slice(data);
        2 + data.len()
    } else {
        dst[0] = code32;
        dst[1..5].copy_from_slice(&(data.len() as u32).to_be_bytes());
        dst[5..5 + data.len()].copy_from_slice(data);
        5 + data.len()
    }
}

/// Reads a length-prefixed payload; returns (payload, bytes consumed after
/// the constructor).
fn decode_variable(src: &[u8], narrow: bool) -> Result<(&[u8], usize), CodecError> {
    let (len, prefix) = if narrow {
        (usize::from(take(src, 1)?[0]), 1)
    } else {
        let b = take(src, 4)?;
        (u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize, 4)
    };
    let data = take(&src[prefix..], len)?;
    Ok((data, prefix + len))
}

fn decode_list(src: &[u8], narrow: bool) -> Result<(Value, usize), CodecError> {
    let (size, count, prefix) = if narrow {
        let b = take(src, 2)?;
        (usize::from(b[0]), usize::from(b[1]), 2)
    } else {
        let b = take(src, 8)?;
        (
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize,
            u32::from_be_bytes([b[4], b[5], b[6], b[7]]) as usize,
            8,
        )
    };
    // size spans the count field and the elements
    let count_width = prefix / 2;
    let body_len = size.checked_sub(count_width).ok_or(CodecError::Truncated {
        needed: count_width,
        have: size,
    })?;
    let body = take(&src[prefix..], body_len)?;

    // every element takes at least one byte, so a count beyond the body
    // length is corrupt; checking before the allocation keeps a hostile
    // count field from requesting gigabytes
    if count > body_len {
        return Err(CodecError::Truncated {
            needed: count,
            have: body_len,
        });
    }

    let mut items = Vec::with_capacity(count);
    let mut pos = 0;
    for _ in 0..count {
        let (item, used) = Value::decode(&body[pos..])?;
        items.push(item);
        pos += used;
    }
    Ok((Value::List(items), prefix + body_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(value: Value) {
        let mut buf = vec![0u8; value.encoded_len()];
        let written = value.encode(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        let (decoded, consumed) = Value::decode(&buf).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_scalar_roundtrips() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::UByte(7));
        roundtrip(Value::UShort(512));
        roundtrip(Value::UInt(0));
        roundtrip(Value::UInt(200));
        roundtrip(Value::UInt(70_000));
        roundtrip(Value::ULong(0));
        roundtrip(Value::ULong(9));
        roundtrip(Value::ULong(u64::MAX));
        roundtrip(Value::Byte(-1));
        roundtrip(Value::Short(-300));
        roundtrip(Value::Int(-5));
        roundtrip(Value::Int(1 << 20));
        roundtrip(Value::Long(100));
        roundtrip(Value::Long(i64::MIN));
        roundtrip(Value::Float(1.5));
        roundtrip(Value::Double(-2.25));
    }

    #[test]
    fn test_variable_width_roundtrips() {
        roundtrip(Value::String("x".to_string()));
        roundtrip(Value::String("a".repeat(300)));
        roundtrip(Value::Symbol("amqp:link:detach-forced".to_string()));
        roundtrip(Value::Binary(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])));
        roundtrip(Value::Binary(Bytes::from(vec![0u8; 1000])));
    }

    #[test]
    fn test_list_roundtrips() {
        roundtrip(Value::List(vec![]));
        roundtrip(Value::List(vec![
            Value::String("container".to_string()),
            Value::UInt(512),
            Value::Null,
            Value::Bool(true),
        ]));
        roundtrip(Value::List(vec![Value::List(vec![Value::Int(1)])]));
    }

    #[test]
    fn test_decode_compact_constructors() {
        // uint0 / smalluint / list8 are accepted even though the encoder
        // picks its own forms
        let (v, n) = Value::decode(&[0x43]).unwrap();
        assert_eq!(v, Value::UInt(0));
        assert_eq!(n, 1);

        let (v, n) = Value::decode(&[0x52, 0x2a]).unwrap();
        assert_eq!(v, Value::UInt(42));
        assert_eq!(n, 2);

        // list8: size=3 (count byte + two null elements), count=2
        let (v, n) = Value::decode(&[0xc0, 0x03, 0x02, 0x40, 0x40]).unwrap();
        assert_eq!(v, Value::List(vec![Value::Null, Value::Null]));
        assert_eq!(n, 5);

        let (v, _) = Value::decode(&[0x56, 0x01]).unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(
            Value::decode(&[]),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            Value::decode(&[0x70, 0x00, 0x01]),
            Err(CodecError::Truncated { .. })
        ));
        // str8 claims 10 bytes, provides 2
        assert!(matches!(
            Value::decode(&[0xa1, 0x0a, b'h', b'i']),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_list_count_exceeding_body() {
        // list32 claiming u32::MAX elements in a 1-byte body must fail
        // cleanly instead of reserving a huge vector
        let bytes = [0xd0, 0, 0, 0, 5, 0xff, 0xff, 0xff, 0xff, 0x40];
        assert!(matches!(
            Value::decode(&bytes),
            Err(CodecError::Truncated { .. })
        ));

        // same for list8
        let bytes = [0xc0, 0x02, 0xff, 0x40];
        assert!(matches!(
            Value::decode(&bytes),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_format_code() {
        assert!(matches!(
            Value::decode(&[0x0e]),
            Err(CodecError::UnknownFormatCode(0x0e))
        ));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(
            Value::decode(&[0xa1, 0x02, 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let value = Value::String("hello".to_string());
        let mut buf = [0u8; 3];
        assert!(matches!(
            value.encode(&mut buf),
            Err(CodecError::BufferTooSmall { needed: 7, have: 3 })
        ));
    }

    #[test]
    fn test_as_unsigned() {
        assert_eq!(Value::UByte(3).as_unsigned(), Some(3));
        assert_eq!(Value::UShort(300).as_unsigned(), Some(300));
        assert_eq!(Value::UInt(9).as_unsigned(), Some(9));
        assert_eq!(Value::ULong(u64::MAX).as_unsigned(), Some(u64::MAX));
        assert_eq!(Value::Int(3).as_unsigned(), None);
        assert_eq!(Value::Null.as_unsigned(), None);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<u8>().prop_map(Value::UByte),
            any::<u16>().prop_map(Value::UShort),
            any::<u32>().prop_map(Value::UInt),
            any::<u64>().prop_map(Value::ULong),
            any::<i32>().prop_map(Value::Int),
            any::<i64>().prop_map(Value::Long),
            "[a-z]{0,40}".prop_map(Value::String),
            "[a-z:\\-]{0,20}".prop_map(Value::Symbol),
            proptest::collection::vec(any::<u8>(), 0..300)
                .prop_map(|b| Value::Binary(Bytes::from(b))),
        ];
        leaf.prop_recursive(2, 16, 8, |inner| {
            proptest::collection::vec(inner, 0..8).prop_map(Value::List)
        })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(value in arb_value()) {
            let mut buf = vec![0u8; value.encoded_len()];
            let written = value.encode(&mut buf).unwrap();
            prop_assert_eq!(written, buf.len());
            let (decoded, consumed) = Value::decode(&buf).unwrap();
            prop_assert_eq!(consumed, written);
            prop_assert_eq!(decoded, value);
        }
    }
}
