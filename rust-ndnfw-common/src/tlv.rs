//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! The wire format is NDN-style TLV: a one-byte type, a variable-width
//! length, and the value bytes. Transports use these helpers at the
//! boundary; the forwarding plane never touches wire bytes.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants (single-byte for ndnfw)
 * ---------------------------------------------------------------- */

pub const TLV_NACK: u8              = 0x03;
pub const TLV_INTEREST: u8          = 0x05;
pub const TLV_DATA: u8              = 0x06;
pub const TLV_NAME: u8              = 0x07;
pub const TLV_COMPONENT: u8         = 0x08;
pub const TLV_NONCE: u8             = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_NACK_REASON: u8       = 0x0D;
pub const TLV_MUST_BE_FRESH: u8     = 0x12;
pub const TLV_CONTENT: u8           = 0x15;
pub const TLV_FRESHNESS_PERIOD: u8  = 0x19;
pub const TLV_CAN_BE_PREFIX: u8     = 0x21;
pub const TLV_HOP_LIMIT: u8         = 0x22;

/* ---------------------------------------------------------------- *
 * Length field codec
 * ---------------------------------------------------------------- */

/// Encode the variable-width TLV *length* field.
///
/// * `< 253` -> 1 byte
/// * `<= 65 535` -> marker 253 + 2-byte length
/// * otherwise -> marker 254 + 4-byte length
pub fn encode_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Decode the TLV *length* field using the variable-width rules.
pub fn decode_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("buffer underflow when decoding TLV length".into()));
    }

    let first = buf.get_u8();
    match first {
        0..=252 => Ok(first as usize),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("buffer underflow when decoding 16-bit TLV length".into()));
            }
            Ok(buf.get_u16() as usize)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("buffer underflow when decoding 32-bit TLV length".into()));
            }
            Ok(buf.get_u32() as usize)
        }
        255 => Err(Error::Tlv("64-bit TLV lengths not supported".into())),
    }
}

/// Number of bytes required to encode `length` with the variable-width scheme.
fn length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65_535 {
        3
    } else {
        5
    }
}

/// Encode `value` as a minimal-width big-endian unsigned integer (1, 2, 4
/// or 8 bytes), the form used by lifetime and freshness fields.
pub fn encode_uint(value: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new element from raw parts.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Create a zero-length flag element (presence carries the meaning).
    pub fn flag(tlv_type: u8) -> Self {
        Self::new(tlv_type, Bytes::new())
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        1 + length_size(self.value.len()) + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tlv_type);
        encode_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decode a single element from `buf`, advancing it past the element.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("buffer too small for TLV header".into()));
        }

        let tlv_type = buf.get_u8();
        let length = decode_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        // bytes 1.*: cheap zero-copy slice
        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }

    /// Interpret the value as a big-endian unsigned integer of 1, 2, 4 or
    /// 8 bytes.
    pub fn as_uint(&self) -> Result<u64, Error> {
        let mut v = self.value.clone();
        match v.len() {
            1 => Ok(v.get_u8() as u64),
            2 => Ok(v.get_u16() as u64),
            4 => Ok(v.get_u32() as u64),
            8 => Ok(v.get_u64()),
            n => Err(Error::Tlv(format!("invalid integer width {n}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_widths() {
        let mut buf = BytesMut::new();
        encode_length(100, &mut buf);
        assert_eq!(buf.as_ref(), &[100]);

        buf.clear();
        encode_length(1000, &mut buf);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], 253);
        assert_eq!(decode_length(&mut buf.clone().freeze()).unwrap(), 1000);

        buf.clear();
        encode_length(100_000, &mut buf);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], 254);
        assert_eq!(decode_length(&mut buf.clone().freeze()).unwrap(), 100_000);
    }

    #[test]
    fn element_round_trip() {
        let element = TlvElement::new(TLV_CONTENT, &b"abc"[..]);
        let mut buf = BytesMut::new();
        element.encode(&mut buf);
        assert_eq!(buf.len(), element.len());

        let decoded = TlvElement::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn truncated_value_rejected() {
        // claims 10 value bytes, provides 2
        let wire = [TLV_CONTENT, 10, 0xAA, 0xBB];
        assert!(TlvElement::decode(&mut &wire[..]).is_err());
    }

    #[test]
    fn uint_minimal_widths() {
        assert_eq!(encode_uint(7).len(), 1);
        assert_eq!(encode_uint(4000).len(), 2);
        assert_eq!(encode_uint(100_000).len(), 4);
        assert_eq!(encode_uint(u64::MAX).len(), 8);

        let element = TlvElement::new(TLV_INTEREST_LIFETIME, encode_uint(4000));
        assert_eq!(element.as_uint().unwrap(), 4000);
    }
}
