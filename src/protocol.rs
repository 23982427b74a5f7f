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

//! The ten packet kinds carried inside a [`Payload`](crate::framing), and
//! their encode/decode on top of the bytecodec primitives.
//!
//! A [`Packet`] is `[kind: u8][window: u8][body...]`. This module only
//! knows how to turn a `Packet` into bytes and back; it has no notion of
//! terminal state, palettes, or filesystems beyond the wire shapes those
//! need (`ScreenUpdate`'s RLE streams, `FSRequest`'s op table).

use bytes::{Buf, BufMut, BytesMut};

use crate::bytecodec::{put_cstring, read_cstring, IbtValue};
use crate::error::ProtocolError;

/// Pixel-grid cell dimensions (spec §3): each character cell is this many
/// pixels wide/tall in pixel-16/pixel-256 mode.
const PIXELS_PER_CELL_X: u32 = 6;
const PIXELS_PER_CELL_Y: u32 = 9;

/// Packet kind byte for each of the ten defined packets.
pub mod kind {
    pub const SCREEN_UPDATE: u8 = 0;
    pub const KEY_INPUT: u8 = 1;
    pub const MOUSE_INPUT: u8 = 2;
    pub const EVENT_QUEUE: u8 = 3;
    pub const WINDOW_INFO: u8 = 4;
    pub const SERVER_MESSAGE: u8 = 5;
    pub const HANDSHAKE: u8 = 6;
    pub const FS_REQUEST: u8 = 7;
    pub const FS_RESPONSE: u8 = 8;
    pub const FS_DATA: u8 = 9;
}

/// `WindowInfo` flag values (kind 4).
pub mod window_flags {
    pub const UPDATE: u8 = 0;
    pub const CLOSE_KEEPALIVE: u8 = 1;
    pub const CLOSE_TEARDOWN: u8 = 2;
}

/// `ServerMessage` flag bits (kind 5).
pub mod message_flags {
    pub const ERROR: u32 = 0x10;
    pub const WARNING: u32 = 0x20;
    pub const INFO: u32 = 0x40;
}

/// `KeyInput` flag bits (kind 1).
pub mod key_flags {
    pub const KEY_UP: u8 = 0x01;
    pub const REPEAT: u8 = 0x02;
    pub const CHARACTER: u8 = 0x08;
}

/// `MouseInput` event codes (kind 2).
pub mod mouse_event {
    pub const CLICK: u8 = 0;
    pub const UP: u8 = 1;
    pub const SCROLL: u8 = 2;
    pub const DRAG: u8 = 3;
}

/// One complete packet: its target window and typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Window this packet addresses; 0 is the default window.
    pub window: u8,
    /// The decoded body.
    pub body: PacketBody,
}

/// Fixed header fields of a kind-0 `ScreenUpdate`, before the RLE body and
/// palette. The RLE streams and palette entries are opaque byte blobs here;
/// `terminal.rs`/`renderer.rs` own their grid semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenUpdateHeader {
    /// 0 = text, 1 = pixel-16, 2 = pixel-256.
    pub mode: u8,
    /// Cursor blink state.
    pub blink: bool,
    /// Terminal width in character cells.
    pub width: u16,
    /// Terminal height in character cells.
    pub height: u16,
    /// 1-indexed cursor column.
    pub cursor_x: u16,
    /// 1-indexed cursor row.
    pub cursor_y: u16,
    /// Whether the palette should be rendered as grayscale.
    pub grayscale: bool,
}

/// A kind-0 body: header, one or two RLE streams, and a palette.
///
/// Text mode carries two streams (characters, then colors); pixel modes
/// carry one stream over the pixel grid. Palette length is 16 entries in
/// mode 0/1, 256 in mode 2.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenUpdate {
    /// Fixed header fields.
    pub header: ScreenUpdateHeader,
    /// One stream (pixel modes) or two (text mode: chars, then colors),
    /// each already RLE-encoded.
    pub rle_streams: Vec<Vec<u8>>,
    /// `(r, g, b)` triplets, 16 or 256 entries depending on mode.
    pub palette: Vec<(u8, u8, u8)>,
}

/// Body of a kind-7 filesystem request: path ops carry one path, `copy`
/// and `move` carry two.
#[derive(Debug, Clone, PartialEq)]
pub struct FsRequest {
    /// Low nibble selects the operation (see `fs_op`); high nibble 0x1
    /// marks a file-open request, whose low 3 bits select the mode.
    pub op: u8,
    /// Correlation id, rotated mod 256 by the caller.
    pub req_id: u8,
    /// Primary path argument.
    pub path: String,
    /// Second path, present only for `copy`/`move`.
    pub path2: Option<String>,
}

/// Filesystem request op codes (kind 7, low nibble when not a file-open).
pub mod fs_op {
    pub const EXISTS: u8 = 0;
    pub const IS_DIR: u8 = 1;
    pub const IS_READ_ONLY: u8 = 2;
    pub const GET_SIZE: u8 = 3;
    pub const GET_DRIVE: u8 = 4;
    pub const GET_CAPACITY: u8 = 5;
    pub const GET_FREE_SPACE: u8 = 6;
    pub const LIST: u8 = 7;
    pub const ATTRIBUTES: u8 = 8;
    pub const FIND: u8 = 9;
    pub const MAKE_DIR: u8 = 10;
    pub const DELETE: u8 = 11;
    pub const COPY: u8 = 12;
    pub const MOVE: u8 = 13;
    /// High nibble set on `op` marks a file-open request; low 3 bits select
    /// the mode via [`OPEN_MODES`].
    pub const OPEN_MASK: u8 = 0x10;
}

/// The eight open modes selectable by the low 3 bits of an open request.
pub const OPEN_MODES: [&str; 8] = ["r", "w", "r", "a", "rb", "wb", "rb", "ab"];

/// True if `mode` (one of [`OPEN_MODES`]) opens for writing.
#[must_use]
pub fn open_mode_is_write(mode_bits: u8) -> bool {
    mode_bits & 0x01 != 0
}

/// Body of a kind-8 filesystem response; shape depends on `op`.
#[derive(Debug, Clone, PartialEq)]
pub enum FsResponseBody {
    /// Ops 0/1/2: `false`, `true`, or an error sentinel.
    Boolean(BoolResult),
    /// Ops 3/5/6: a size/capacity value, or `u32::MAX` on error.
    Numeric(Option<u32>),
    /// Ops 4/7/9 (list/attributes-path/find): zero or more path strings; an
    /// empty list signals an error per spec (count == 0).
    Strings(Vec<String>),
    /// Op 8: file attributes, or an error code.
    Attributes(AttributesResult),
    /// Ops 10/11/12/13, and file-open write-confirm (op 17): empty string
    /// on success, otherwise the error message.
    Void(String),
}

/// Result of a boolean filesystem query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolResult {
    /// Op 1 (`true`).
    True,
    /// Op 0 (`false`).
    False,
    /// Op 2 (error sentinel).
    Error,
}

/// Result of a kind-8 op-8 attributes query.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributesResult {
    /// Successful lookup.
    Ok {
        /// File size in bytes.
        size: u32,
        /// Creation time (host-defined epoch).
        created: u64,
        /// Last-modified time (host-defined epoch).
        modified: u64,
        /// Whether the path is a directory.
        is_dir: bool,
        /// Whether the path is read-only.
        is_read_only: bool,
    },
    /// The path does not exist.
    NoEntry,
    /// The lookup failed for another reason.
    Error,
}

/// The typed body of a [`Packet`], one variant per packet kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    /// Kind 0, server to client.
    ScreenUpdate(ScreenUpdate),
    /// Kind 1, client to server.
    KeyInput {
        /// Scancode, or (if `flags & CHARACTER`) the raw character byte.
        code: u8,
        /// See [`key_flags`].
        flags: u8,
    },
    /// Kind 2, client to server.
    MouseInput {
        /// See [`mouse_event`].
        event: u8,
        /// Button id; for scroll, 0=up / 1=down.
        button: u8,
        /// Pixel/cell x coordinate.
        x: u32,
        /// Pixel/cell y coordinate.
        y: u32,
    },
    /// Kind 3, client to server.
    EventQueue {
        /// Event name.
        name: String,
        /// Positional parameters.
        params: Vec<IbtValue>,
    },
    /// Kind 4, either direction.
    WindowInfo {
        /// See [`window_flags`].
        flags: u8,
        /// Computer id modulo 256, or 0 if this window is a monitor.
        secondary_id: u8,
        /// New width, or 0 if unchanged.
        width: u16,
        /// New height, or 0 if unchanged.
        height: u16,
        /// New title.
        title: String,
    },
    /// Kind 5, server to client.
    ServerMessage {
        /// See [`message_flags`].
        flags: u32,
        /// Dialog title.
        title: String,
        /// Dialog body.
        body: String,
    },
    /// Kind 6, either direction.
    Handshake {
        /// See `handshake::FEATURE_*`.
        feature_bits: u16,
    },
    /// Kind 7, client to server.
    FsRequest(FsRequest),
    /// Kind 8, server to client.
    FsResponse {
        /// Echoes the request's op.
        op: u8,
        /// Echoes the request's id.
        req_id: u8,
        /// Op-dependent body.
        body: FsResponseBody,
    },
    /// Kind 9, either direction.
    FsData {
        /// 0 = data, 1 = error-on-open-for-read.
        subtype: u8,
        /// Echoes the request's id.
        req_id: u8,
        /// Raw file bytes.
        data: Vec<u8>,
    },
}

impl Packet {
    /// The packet kind byte for this packet's body.
    #[must_use]
    pub fn kind(&self) -> u8 {
        match &self.body {
            PacketBody::ScreenUpdate(_) => kind::SCREEN_UPDATE,
            PacketBody::KeyInput { .. } => kind::KEY_INPUT,
            PacketBody::MouseInput { .. } => kind::MOUSE_INPUT,
            PacketBody::EventQueue { .. } => kind::EVENT_QUEUE,
            PacketBody::WindowInfo { .. } => kind::WINDOW_INFO,
            PacketBody::ServerMessage { .. } => kind::SERVER_MESSAGE,
            PacketBody::Handshake { .. } => kind::HANDSHAKE,
            PacketBody::FsRequest(_) => kind::FS_REQUEST,
            PacketBody::FsResponse { .. } => kind::FS_RESPONSE,
            PacketBody::FsData { .. } => kind::FS_DATA,
        }
    }

    /// Encodes this packet into `[kind][window][body...]`, ready to hand to
    /// [`crate::framing::encode_frame`].
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(self.kind());
        buf.put_u8(self.window);
        self.body.encode(&mut buf);
        buf
    }

    /// Decodes `[kind][window][body...]` produced by
    /// [`crate::framing::decode_frame`].
    ///
    /// Returns `Ok(None)` for an unrecognized kind byte (spec §7: "ignore
    /// frame"), and `Err` for a recognized kind whose body is malformed.
    pub fn decode(mut bytes: BytesMut) -> Result<Option<Self>, ProtocolError> {
        if bytes.len() < 2 {
            return Err(ProtocolError::InvalidArgument("packet shorter than header".into()));
        }
        let kind = bytes.get_u8();
        let window = bytes.get_u8();
        let Some(body) = PacketBody::decode(kind, &mut bytes)? else {
            return Ok(None);
        };
        Ok(Some(Packet { window, body }))
    }
}

impl PacketBody {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            PacketBody::ScreenUpdate(update) => update.encode(buf),
            PacketBody::KeyInput { code, flags } => {
                buf.put_u8(*code);
                buf.put_u8(*flags);
            }
            PacketBody::MouseInput { event, button, x, y } => {
                buf.put_u8(*event);
                buf.put_u8(*button);
                buf.put_u32_le(*x);
                buf.put_u32_le(*y);
            }
            PacketBody::EventQueue { name, params } => {
                debug_assert!(params.len() <= 255);
                buf.put_u8(params.len() as u8);
                put_cstring(buf, name);
                for p in params {
                    p.encode(buf);
                }
            }
            PacketBody::WindowInfo { flags, secondary_id, width, height, title } => {
                buf.put_u8(*flags);
                buf.put_u8(*secondary_id);
                buf.put_u16_le(*width);
                buf.put_u16_le(*height);
                put_cstring(buf, title);
            }
            PacketBody::ServerMessage { flags, title, body } => {
                buf.put_u32_le(*flags);
                put_cstring(buf, title);
                put_cstring(buf, body);
            }
            PacketBody::Handshake { feature_bits } => buf.put_u16_le(*feature_bits),
            PacketBody::FsRequest(req) => {
                buf.put_u8(req.op);
                buf.put_u8(req.req_id);
                put_cstring(buf, &req.path);
                if let Some(path2) = &req.path2 {
                    put_cstring(buf, path2);
                }
            }
            PacketBody::FsResponse { op, req_id, body } => {
                buf.put_u8(*op);
                buf.put_u8(*req_id);
                body.encode(buf);
            }
            PacketBody::FsData { subtype, req_id, data } => {
                buf.put_u8(*subtype);
                buf.put_u8(*req_id);
                buf.put_u32_le(data.len() as u32);
                buf.put_slice(data);
            }
        }
    }

    fn decode(kind: u8, buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        match kind {
            kind::SCREEN_UPDATE => Ok(Some(PacketBody::ScreenUpdate(ScreenUpdate::decode(buf)?))),
            kind::KEY_INPUT => {
                need(buf, 2, "KeyInput")?;
                Ok(Some(PacketBody::KeyInput { code: buf.get_u8(), flags: buf.get_u8() }))
            }
            kind::MOUSE_INPUT => {
                need(buf, 10, "MouseInput")?;
                Ok(Some(PacketBody::MouseInput {
                    event: buf.get_u8(),
                    button: buf.get_u8(),
                    x: buf.get_u32_le(),
                    y: buf.get_u32_le(),
                }))
            }
            kind::EVENT_QUEUE => {
                need(buf, 1, "EventQueue count")?;
                let nparam = buf.get_u8() as usize;
                let name = read_cstring(buf)?;
                let mut params = Vec::with_capacity(nparam);
                for _ in 0..nparam {
                    params.push(IbtValue::decode(buf)?);
                }
                Ok(Some(PacketBody::EventQueue { name, params }))
            }
            kind::WINDOW_INFO => {
                need(buf, 6, "WindowInfo")?;
                let flags = buf.get_u8();
                let secondary_id = buf.get_u8();
                let width = buf.get_u16_le();
                let height = buf.get_u16_le();
                let title = read_cstring(buf)?;
                Ok(Some(PacketBody::WindowInfo { flags, secondary_id, width, height, title }))
            }
            kind::SERVER_MESSAGE => {
                need(buf, 4, "ServerMessage")?;
                let flags = buf.get_u32_le();
                let title = read_cstring(buf)?;
                let body = read_cstring(buf)?;
                Ok(Some(PacketBody::ServerMessage { flags, title, body }))
            }
            kind::HANDSHAKE => {
                need(buf, 2, "Handshake")?;
                Ok(Some(PacketBody::Handshake { feature_bits: buf.get_u16_le() }))
            }
            kind::FS_REQUEST => {
                need(buf, 2, "FSRequest")?;
                let op = buf.get_u8();
                let req_id = buf.get_u8();
                let path = read_cstring(buf)?;
                let path2 = if matches!(op, fs_op::COPY | fs_op::MOVE) {
                    Some(read_cstring(buf)?)
                } else {
                    None
                };
                Ok(Some(PacketBody::FsRequest(FsRequest { op, req_id, path, path2 })))
            }
            kind::FS_RESPONSE => {
                need(buf, 2, "FSResponse")?;
                let op = buf.get_u8();
                let req_id = buf.get_u8();
                let body = FsResponseBody::decode(op, buf)?;
                Ok(Some(PacketBody::FsResponse { op, req_id, body }))
            }
            kind::FS_DATA => {
                need(buf, 6, "FSData")?;
                let subtype = buf.get_u8();
                let req_id = buf.get_u8();
                let len = buf.get_u32_le() as usize;
                need(buf, len, "FSData payload")?;
                let data = buf.split_to(len).to_vec();
                Ok(Some(PacketBody::FsData { subtype, req_id, data }))
            }
            _ => Ok(None),
        }
    }
}

impl FsResponseBody {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            FsResponseBody::Boolean(b) => buf.put_u8(match b {
                BoolResult::False => 0,
                BoolResult::True => 1,
                BoolResult::Error => 2,
            }),
            FsResponseBody::Numeric(v) => buf.put_u32_le(v.unwrap_or(u32::MAX)),
            FsResponseBody::Strings(items) => {
                buf.put_u32_le(items.len() as u32);
                for item in items {
                    put_cstring(buf, item);
                }
            }
            FsResponseBody::Attributes(attrs) => match attrs {
                AttributesResult::Ok { size, created, modified, is_dir, is_read_only } => {
                    buf.put_u32_le(*size);
                    buf.put_u64_le(*created);
                    buf.put_u64_le(*modified);
                    buf.put_u8(u8::from(*is_dir));
                    buf.put_u8(u8::from(*is_read_only));
                    buf.put_u8(0);
                    buf.put_u8(0);
                }
                AttributesResult::NoEntry => {
                    buf.put_u32_le(0);
                    buf.put_u64_le(0);
                    buf.put_u64_le(0);
                    buf.put_u8(0);
                    buf.put_u8(0);
                    buf.put_u8(1);
                    buf.put_u8(0);
                }
                AttributesResult::Error => {
                    buf.put_u32_le(0);
                    buf.put_u64_le(0);
                    buf.put_u64_le(0);
                    buf.put_u8(0);
                    buf.put_u8(0);
                    buf.put_u8(2);
                    buf.put_u8(0);
                }
            },
            FsResponseBody::Void(err) => put_cstring(buf, err),
        }
    }

    fn decode(op: u8, buf: &mut BytesMut) -> Result<Self, ProtocolError> {
        match op {
            fs_op::EXISTS | fs_op::IS_DIR | fs_op::IS_READ_ONLY => {
                need(buf, 1, "FSResponse boolean")?;
                Ok(FsResponseBody::Boolean(match buf.get_u8() {
                    0 => BoolResult::False,
                    1 => BoolResult::True,
                    _ => BoolResult::Error,
                }))
            }
            fs_op::GET_SIZE | fs_op::GET_CAPACITY | fs_op::GET_FREE_SPACE => {
                need(buf, 4, "FSResponse numeric")?;
                let raw = buf.get_u32_le();
                Ok(FsResponseBody::Numeric(if raw == u32::MAX { None } else { Some(raw) }))
            }
            fs_op::GET_DRIVE | fs_op::LIST | fs_op::FIND => {
                need(buf, 4, "FSResponse string count")?;
                let count = buf.get_u32_le() as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(read_cstring(buf)?);
                }
                Ok(FsResponseBody::Strings(items))
            }
            fs_op::ATTRIBUTES => {
                need(buf, 23, "FSResponse attributes")?;
                let size = buf.get_u32_le();
                let created = buf.get_u64_le();
                let modified = buf.get_u64_le();
                let is_dir = buf.get_u8() != 0;
                let is_read_only = buf.get_u8() != 0;
                let error_code = buf.get_u8();
                buf.get_u8(); // pad
                Ok(FsResponseBody::Attributes(match error_code {
                    0 => AttributesResult::Ok { size, created, modified, is_dir, is_read_only },
                    1 => AttributesResult::NoEntry,
                    _ => AttributesResult::Error,
                }))
            }
            _ => Ok(FsResponseBody::Void(read_cstring(buf)?)),
        }
    }
}

fn need(buf: &BytesMut, n: usize, what: &str) -> Result<(), ProtocolError> {
    if buf.len() < n {
        Err(ProtocolError::InvalidArgument(format!("{what} truncated")))
    } else {
        Ok(())
    }
}

/// Run-length encodes `flat` as `(value, count)` byte pairs, `count` in
/// `1..=255`; runs longer than 255 are cut into multiple pairs.
#[must_use]
pub fn rle_encode(flat: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = flat.iter().peekable();
    while let Some(&value) = iter.next() {
        let mut run = 1u16;
        while run < 255 && iter.peek() == Some(&&value) {
            iter.next();
            run += 1;
        }
        out.push(value);
        out.push(run as u8);
    }
    out
}

/// Inverse of [`rle_encode`]; `expected_len` guards against a truncated or
/// corrupt stream overrunning the destination grid.
pub fn rle_decode(encoded: &[u8], expected_len: usize) -> Result<Vec<u8>, ProtocolError> {
    if encoded.len() % 2 != 0 {
        return Err(ProtocolError::InvalidArgument("RLE stream has odd length".into()));
    }
    let mut out = Vec::with_capacity(expected_len);
    for pair in encoded.chunks_exact(2) {
        let (value, count) = (pair[0], pair[1]);
        out.extend(std::iter::repeat(value).take(count as usize));
    }
    if out.len() != expected_len {
        return Err(ProtocolError::InvalidArgument(format!(
            "RLE stream decoded to {} bytes, expected {expected_len}",
            out.len()
        )));
    }
    Ok(out)
}

impl ScreenUpdate {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.header.mode);
        buf.put_u8(u8::from(self.header.blink));
        buf.put_u16_le(self.header.width);
        buf.put_u16_le(self.header.height);
        buf.put_u16_le(self.header.cursor_x);
        buf.put_u16_le(self.header.cursor_y);
        buf.put_u8(u8::from(self.header.grayscale));
        buf.put_bytes(0, 3); // pad

        for stream in &self.rle_streams {
            buf.put_slice(stream);
        }
        for &(r, g, b) in &self.palette {
            buf.put_u8(r);
            buf.put_u8(g);
            buf.put_u8(b);
        }
    }

    /// Splits the next RLE-encoded stream off the front of `buf`, stopping
    /// once its decoded length reaches `expected_len` (there is no explicit
    /// length prefix on the wire; streams are delimited implicitly by the
    /// header-derived cell/pixel count, per spec §4.3/§6).
    fn split_rle_stream(buf: &mut BytesMut, expected_len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut decoded_len = 0usize;
        let mut consumed = 0usize;
        while decoded_len < expected_len {
            need(buf, consumed + 2, "ScreenUpdate RLE pair")?;
            decoded_len += buf[consumed + 1] as usize;
            consumed += 2;
        }
        if decoded_len != expected_len {
            return Err(ProtocolError::InvalidArgument(format!(
                "RLE stream decoded to {decoded_len} bytes, expected {expected_len}"
            )));
        }
        Ok(buf.split_to(consumed).to_vec())
    }

    fn decode(buf: &mut BytesMut) -> Result<Self, ProtocolError> {
        need(buf, 11, "ScreenUpdate header")?;
        let mode = buf.get_u8();
        let blink = buf.get_u8() != 0;
        let width = buf.get_u16_le();
        let height = buf.get_u16_le();
        let cursor_x = buf.get_u16_le();
        let cursor_y = buf.get_u16_le();
        let grayscale = buf.get_u8() != 0;
        need(buf, 3, "ScreenUpdate pad")?;
        buf.advance(3);

        let cell_count = width as usize * height as usize;
        let rle_streams = if mode == 0 {
            let chars = Self::split_rle_stream(buf, cell_count)?;
            let colors = Self::split_rle_stream(buf, cell_count)?;
            vec![chars, colors]
        } else {
            let pixel_count = (width as u32 * PIXELS_PER_CELL_X) as usize * (height as u32 * PIXELS_PER_CELL_Y) as usize;
            vec![Self::split_rle_stream(buf, pixel_count)?]
        };

        let palette_len = if mode == 2 { 256 } else { 16 };
        need(buf, palette_len * 3, "ScreenUpdate palette")?;
        let mut palette = Vec::with_capacity(palette_len);
        for _ in 0..palette_len {
            palette.push((buf.get_u8(), buf.get_u8(), buf.get_u8()));
        }

        Ok(ScreenUpdate {
            header: ScreenUpdateHeader { mode, blink, width, height, cursor_x, cursor_y, grayscale },
            rle_streams,
            palette,
        })
    }
}
