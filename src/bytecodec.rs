// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Little-endian primitives, base64, CRC-32, and the IBT value encoding.
//!
//! This module has no notion of frames or packets; it is the bottom layer
//! every other module in the crate builds on.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::{Buf, BufMut, BytesMut};
use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC-32 (IEEE 802.3, polynomial 0xEDB88320) table, built once per process.
pub static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the CRC-32 (IEEE) checksum of `data`.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Renders a CRC-32 value as 8 uppercase hex digits, as required in a frame.
#[must_use]
pub fn crc32_hex(crc: u32) -> String {
    format!("{crc:08X}")
}

/// Encodes `data` as standard base64 (alphabet `A-Z a-z 0-9 + /`, `=` padding).
#[must_use]
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decodes a base64 string back into raw bytes.
///
/// Tolerant of a non-padded final quartet of 2 or 3 characters, since the
/// source encoder's final group can be short by one component when
/// `len % 3 == 2` (see spec §9). [`base64::engine::GeneralPurposeConfig`]
/// with padding left on the decode side already accepts this; we fall back
/// to a manually re-padded attempt if strict decoding fails.
pub fn base64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    match BASE64.decode(text) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let mut padded = text.trim_end_matches('=').to_string();
            while padded.len() % 4 != 0 {
                padded.push('=');
            }
            BASE64.decode(&padded).map_err(|_| err)
        }
    }
}

/// A type-tagged, self-describing value used for custom event parameters
/// (the "IBT" — Interchange Binary Table — encoding).
#[derive(Debug, Clone, PartialEq)]
pub enum IbtValue {
    /// Tag 0: signed 64-bit integer, used when the value is integral and
    /// fits in `[-2^31, 2^31)`.
    Int(i64),
    /// Tag 1: IEEE-754 double, used for non-integral values or integers
    /// outside the 32-bit signed range.
    Float(f64),
    /// Tag 2: boolean.
    Bool(bool),
    /// Tag 3: UTF-8 string.
    Str(String),
    /// Tag 4: an ordered key/value table. Order is insertion order, chosen
    /// (per spec §9's open question) for bit-exact reproducibility; see
    /// `DESIGN.md`.
    Table(Vec<(IbtValue, IbtValue)>),
    /// Tag 5: nil.
    Nil,
}

impl IbtValue {
    /// Chooses the tag a well-formed encoder would use for this value,
    /// matching the heuristic in spec §4.1: integral values in
    /// `[-2^31, 2^31)` encode as tag 0, everything else numeric as tag 1.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            IbtValue::Int(_) => 0,
            IbtValue::Float(_) => 1,
            IbtValue::Bool(_) => 2,
            IbtValue::Str(_) => 3,
            IbtValue::Table(_) => 4,
            IbtValue::Nil => 5,
        }
    }

    /// Builds the value an encoder would emit for a raw double: tag 0 if the
    /// number is integral and fits in 32 signed bits, tag 1 otherwise.
    #[must_use]
    pub fn from_number(value: f64) -> Self {
        if value.fract() == 0.0 && value >= f64::from(i32::MIN) && value < -f64::from(i32::MIN) {
            IbtValue::Int(value as i64)
        } else {
            IbtValue::Float(value)
        }
    }

    /// Serializes this value into `buf`, tag byte first.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        match self {
            IbtValue::Int(v) => buf.put_i64_le(*v),
            IbtValue::Float(v) => buf.put_f64_le(*v),
            IbtValue::Bool(v) => buf.put_u8(u8::from(*v)),
            IbtValue::Str(s) => {
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
            }
            IbtValue::Table(entries) => {
                debug_assert!(entries.len() <= 255, "IBT table entries must fit in one byte");
                buf.put_u8(entries.len() as u8);
                for (key, _) in entries {
                    key.encode(buf);
                }
                for (_, value) in entries {
                    value.encode(buf);
                }
            }
            IbtValue::Nil => {}
        }
    }

    /// Deserializes one IBT value from the front of `buf`, advancing it past
    /// the bytes consumed.
    pub fn decode(buf: &mut BytesMut) -> Result<Self, crate::error::ProtocolError> {
        if buf.is_empty() {
            return Err(crate::error::ProtocolError::InvalidArgument(
                "IBT value truncated: missing tag byte".into(),
            ));
        }
        let tag = buf.get_u8();
        match tag {
            0 => {
                require_len(buf, 8, "IBT int")?;
                Ok(IbtValue::Int(buf.get_i64_le()))
            }
            1 => {
                require_len(buf, 8, "IBT float")?;
                Ok(IbtValue::Float(buf.get_f64_le()))
            }
            2 => {
                require_len(buf, 1, "IBT bool")?;
                Ok(IbtValue::Bool(buf.get_u8() != 0))
            }
            3 => read_cstring(buf).map(IbtValue::Str),
            4 => {
                require_len(buf, 1, "IBT table count")?;
                let count = buf.get_u8() as usize;
                let mut keys = Vec::with_capacity(count);
                for _ in 0..count {
                    keys.push(IbtValue::decode(buf)?);
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(IbtValue::decode(buf)?);
                }
                Ok(IbtValue::Table(keys.into_iter().zip(values).collect()))
            }
            5 => Ok(IbtValue::Nil),
            other => Err(crate::error::ProtocolError::InvalidArgument(format!(
                "unknown IBT tag {other}"
            ))),
        }
    }
}

fn require_len(buf: &BytesMut, n: usize, what: &str) -> Result<(), crate::error::ProtocolError> {
    if buf.len() < n {
        Err(crate::error::ProtocolError::InvalidArgument(format!(
            "{what} truncated"
        )))
    } else {
        Ok(())
    }
}

/// Reads a NUL-terminated UTF-8 string from the front of `buf`.
pub fn read_cstring(buf: &mut BytesMut) -> Result<String, crate::error::ProtocolError> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| crate::error::ProtocolError::InvalidArgument("missing NUL terminator".into()))?;
    let bytes = buf.split_to(nul);
    buf.advance(1); // consume the NUL
    String::from_utf8(bytes.to_vec())
        .map_err(|e| crate::error::ProtocolError::InvalidArgument(format!("invalid UTF-8: {e}")))
}

/// Appends `s` followed by a NUL terminator to `buf`.
pub fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_reference_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_hex_is_uppercase_and_fixed_width() {
        assert_eq!(crc32_hex(crc32(b"123456789")), "CBF43926");
    }

    #[test]
    fn base64_round_trip_all_remainders() {
        for len in 0..16usize {
            let data: Vec<u8> = (0..len as u8).collect();
            let encoded = base64_encode(&data);
            match len % 3 {
                1 => assert!(encoded.ends_with("==")),
                2 => assert!(encoded.ends_with('=') && !encoded.ends_with("==")),
                _ => assert!(!encoded.ends_with('=')),
            }
            let decoded = base64_decode(&encoded).unwrap();
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn base64_decode_tolerates_missing_padding() {
        let data = b"ab";
        let encoded = base64_encode(data);
        let stripped = encoded.trim_end_matches('=');
        assert_eq!(base64_decode(stripped).unwrap(), data);
    }

    #[test]
    fn ibt_round_trip_int() {
        let v = IbtValue::Int(-42);
        let mut buf = BytesMut::new();
        v.encode(&mut buf);
        assert_eq!(buf[0], 0);
        let decoded = IbtValue::decode(&mut buf).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn ibt_round_trip_float() {
        let v = IbtValue::Float(3.25);
        let mut buf = BytesMut::new();
        v.encode(&mut buf);
        assert_eq!(buf[0], 1);
        assert_eq!(IbtValue::decode(&mut buf).unwrap(), v);
    }

    #[test]
    fn ibt_from_number_heuristic() {
        assert_eq!(IbtValue::from_number(5.0), IbtValue::Int(5));
        assert_eq!(IbtValue::from_number(5.5), IbtValue::Float(5.5));
        assert_eq!(
            IbtValue::from_number(f64::from(i32::MAX) + 1.0),
            IbtValue::Float(f64::from(i32::MAX) + 1.0)
        );
    }

    #[test]
    fn ibt_round_trip_bool_str_nil() {
        for v in [
            IbtValue::Bool(true),
            IbtValue::Bool(false),
            IbtValue::Str("hello".to_string()),
            IbtValue::Nil,
        ] {
            let mut buf = BytesMut::new();
            v.encode(&mut buf);
            assert_eq!(IbtValue::decode(&mut buf).unwrap(), v);
        }
    }

    #[test]
    fn ibt_round_trip_table_preserves_order() {
        let v = IbtValue::Table(vec![
            (IbtValue::Str("a".into()), IbtValue::Int(1)),
            (IbtValue::Str("b".into()), IbtValue::Int(2)),
        ]);
        let mut buf = BytesMut::new();
        v.encode(&mut buf);
        assert_eq!(IbtValue::decode(&mut buf).unwrap(), v);
    }

    #[test]
    fn cstring_round_trip() {
        let mut buf = BytesMut::new();
        put_cstring(&mut buf, "hi");
        buf.put_u8(0xAA); // trailing byte must survive
        let s = read_cstring(&mut buf).unwrap();
        assert_eq!(s, "hi");
        assert_eq!(&buf[..], &[0xAA]);
    }
}
