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

//! Textual frame wrapping/unwrapping: `!CPC<4hex>` (short, v1.0+) and
//! `!CPD<12hex>` (long, v1.1), with CRC-32 checksum verification.
//!
//! A frame carries one opaque [`Payload`](crate::protocol) as
//! `[kind: u8][window: u8][body...]`. Framing does not interpret the body;
//! it only special-cases packet kind 6 (see [`encode_frame`]).

use crate::bytecodec::{base64_decode, base64_encode, crc32, crc32_hex};
use crate::error::ProtocolError;
use crate::handshake::CapabilityFlags;

const SHORT_MAGIC: &str = "!CPC";
const LONG_MAGIC: &str = "!CPD";
const MAX_SHORT_PAYLOAD: usize = 0xFFFF;

/// Packet kind for the version-probe/handshake packet (see `protocol.rs`),
/// whose checksum is always computed over the base64 domain regardless of
/// the negotiated binary-checksum flag.
const HANDSHAKE_KIND: u8 = 6;

/// Encodes one payload (`[kind][window][body...]`) into a complete textual
/// frame, choosing the long (`!CPD`) form only when the base64 payload
/// exceeds 65535 bytes *and* v1.1 framing has been negotiated.
///
/// Per spec §9's first open question, a pre-handshake (v1.0) payload that
/// would overflow the short form's 16-bit length field is refused rather
/// than silently truncated.
pub fn encode_frame(payload: &[u8], flags: &CapabilityFlags) -> Result<String, ProtocolError> {
    let encoded = base64_encode(payload);
    let is_handshake = payload.first() == Some(&HANDSHAKE_KIND);

    let use_long = encoded.len() > MAX_SHORT_PAYLOAD;
    if use_long && !flags.is_version_11() {
        return Err(ProtocolError::Framing(format!(
            "payload of {} base64 bytes exceeds the 65535-byte short-frame limit \
             and long frames have not been negotiated",
            encoded.len()
        )));
    }

    let checksum_domain: &[u8] = if !is_handshake && flags.binary_checksum() {
        payload
    } else {
        encoded.as_bytes()
    };
    let crc = crc32_hex(crc32(checksum_domain));

    let mut frame = String::with_capacity(encoded.len() + 32);
    if use_long {
        frame.push_str(LONG_MAGIC);
        frame.push_str(&format!("{:012X}", encoded.len()));
    } else {
        frame.push_str(SHORT_MAGIC);
        frame.push_str(&format!("{:04X}", encoded.len()));
    }
    frame.push_str(&encoded);
    frame.push_str(&crc);
    frame.push('\n');
    Ok(frame)
}

/// A successfully decoded frame: the raw payload bytes it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// `[kind][window][body...]`, as it was before base64 encoding.
    pub payload: Vec<u8>,
}

/// Scans `text` for one complete frame starting at its first `!CP` magic.
///
/// Returns `Ok(None)` when:
/// - no magic is found (caller should read more data), or
/// - a magic is found but the checksum does not verify (per spec §7, this
///   is silently dropped; the stream is not desynchronized — decoding
///   resumes after this frame's trailing newline).
///
/// Returns `Err` only for structural problems (truncated length/checksum
/// fields, non-hex digits, an unparseable base64 body) that mean the frame
/// itself is malformed rather than merely corrupted in transit.
///
/// On success, also returns the byte offset in `text` immediately after the
/// consumed frame (including its trailing newline), so callers can keep
/// scanning a buffer that may hold more than one frame.
pub fn decode_frame(
    text: &str,
    flags: &CapabilityFlags,
) -> Result<Option<(DecodedFrame, usize)>, ProtocolError> {
    let Some(magic_at) = text.find(SHORT_MAGIC).map(|i| (i, false)).into_iter()
        .chain(text.find(LONG_MAGIC).map(|i| (i, true)))
        .min_by_key(|&(i, _)| i)
    else {
        return Ok(None);
    };
    let (start, is_long) = magic_at;
    let rest = &text[start + 4..];

    let hexlen_width = if is_long { 12 } else { 4 };
    if rest.len() < hexlen_width {
        return Err(ProtocolError::Framing("frame truncated in length field".into()));
    }
    let (hexlen, rest) = rest.split_at(hexlen_width);
    let payload_len = usize::from_str_radix(hexlen, 16)
        .map_err(|_| ProtocolError::Framing("non-hex length field".into()))?;

    // The source is lenient about stray newlines embedded inside long
    // frames (spec §9): strip them from the window we read before slicing
    // out the declared payload length.
    let cleaned: String = rest.chars().filter(|&c| c != '\n').collect();
    if cleaned.len() < payload_len + 8 {
        return Err(ProtocolError::Framing("frame truncated before checksum".into()));
    }
    let (b64_body, after_body) = cleaned.split_at(payload_len);
    let (hexcrc, _remainder) = after_body.split_at(8);

    let expected_crc = u32::from_str_radix(hexcrc, 16)
        .map_err(|_| ProtocolError::Framing("non-hex checksum field".into()))?;

    // Compute the consumed length in the *original* (newline-containing)
    // text so the caller can resume scanning correctly.
    let mut consumed_in_rest = 0usize;
    let mut seen = 0usize;
    for (byte_idx, ch) in rest.char_indices() {
        if ch != '\n' {
            seen += 1;
        }
        if seen == payload_len + 8 {
            consumed_in_rest = byte_idx + ch.len_utf8();
            break;
        }
    }
    if consumed_in_rest == 0 {
        consumed_in_rest = rest.len();
    }
    let mut end = start + 4 + hexlen_width + consumed_in_rest;
    if text[end..].starts_with('\n') {
        end += 1;
    }

    let payload = match base64_decode(b64_body) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(None),
    };
    let is_handshake = payload.first() == Some(&HANDSHAKE_KIND);
    let checksum_domain: &[u8] = if !is_handshake && flags.binary_checksum() {
        &payload
    } else {
        b64_body.as_bytes()
    };
    if crc32(checksum_domain) != expected_crc {
        return Ok(None);
    }

    Ok(Some((DecodedFrame { payload }, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_for(kind: u8, body: &[u8]) -> Vec<u8> {
        let mut p = vec![kind, 0u8];
        p.extend_from_slice(body);
        p
    }

    #[test]
    fn encode_decode_round_trip_short_frame() {
        let flags = CapabilityFlags::new();
        let payload = payload_for(1, &[30, 0x08]);
        let frame = encode_frame(&payload, &flags).unwrap();
        assert!(frame.starts_with("!CPC"));
        let (decoded, consumed) = decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn long_frame_used_only_past_65535_bytes_in_v11() {
        let flags = CapabilityFlags::new();
        flags.test_mark_v11_binary();
        let payload = payload_for(0, &vec![0u8; 70_000]);
        let frame = encode_frame(&payload, &flags).unwrap();
        assert!(frame.starts_with("!CPD"));
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn v10_refuses_oversized_payload_instead_of_truncating() {
        let flags = CapabilityFlags::new();
        let payload = payload_for(0, &vec![0u8; 70_000]);
        assert!(encode_frame(&payload, &flags).is_err());
    }

    #[test]
    fn bad_checksum_is_silently_dropped_not_an_error() {
        let flags = CapabilityFlags::new();
        let payload = payload_for(1, &[1, 2, 3]);
        let mut frame = encode_frame(&payload, &flags).unwrap();
        // Flip a hex digit in the checksum field.
        let crc_start = frame.len() - 9; // 8 hex digits + trailing newline
        let bad_char = if frame.as_bytes()[crc_start] == b'0' { '1' } else { '0' };
        frame.replace_range(crc_start..crc_start + 1, &bad_char.to_string());
        assert_eq!(decode_frame(&frame, &flags).unwrap(), None);
    }

    #[test]
    fn checksum_domain_property_5_follows_binary_checksum_flag() {
        let payload = payload_for(1, &[1, 2, 3]);
        let encoded = base64_encode(&payload);

        let off_flags = CapabilityFlags::new();
        let off_frame = encode_frame(&payload, &off_flags).unwrap();
        assert!(off_frame.contains(&crc32_hex(crc32(encoded.as_bytes()))));

        let on_flags = CapabilityFlags::new();
        on_flags.test_mark_v11_binary();
        let on_frame = encode_frame(&payload, &on_flags).unwrap();
        assert!(on_frame.contains(&crc32_hex(crc32(&payload))));
        assert_ne!(off_frame, on_frame);
    }

    #[test]
    fn handshake_kind_always_uses_base64_domain() {
        let flags = CapabilityFlags::new();
        flags.test_mark_v11_binary();
        assert!(flags.binary_checksum());
        let payload = payload_for(6, &[0x07, 0x00]);
        let frame = encode_frame(&payload, &flags).unwrap();
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn no_magic_returns_none_for_more_data() {
        let flags = CapabilityFlags::new();
        assert_eq!(decode_frame("not a frame", &flags).unwrap(), None);
    }
}

#[cfg(test)]
impl CapabilityFlags {
    /// Test-only helper to force v1.1 + binary-checksum on without a full
    /// handshake round trip.
    pub fn test_mark_v11_binary(&self) {
        use crate::handshake::{observe_peer_bits, LocalFeatures};
        observe_peer_bits(
            self,
            LocalFeatures { binary_checksum: true, filesystem: true, request_window_info: false },
            0x03,
        );
    }
}
