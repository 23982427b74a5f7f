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

//! Per-window server-side terminal state: the character/color/pixel grids,
//! the 256-entry palette, cursor, and the draw operations that mutate them.
//!
//! This module is pure state: it never touches a [`crate::transport::Transport`]
//! directly. [`ServerTerminal::repaint`] produces a [`Packet`] the caller is
//! responsible for framing and sending; [`ServerTerminal::dispatch`] consumes
//! an incoming `Packet` and reports what happened.

use crate::display::MessageKind;
use crate::error::{ProtocolError, Result};
use crate::events::{MouseEvent, ServerEvent};
use crate::handshake::{observe_peer_bits, CapabilityFlags, HandshakeOutcome, LocalFeatures};
use crate::protocol::{
    fs_op, key_flags, message_flags, mouse_event, rle_encode, window_flags, FsRequest, Packet,
    PacketBody, ScreenUpdate, ScreenUpdateHeader,
};

const PIXELS_PER_CELL_X: u32 = 6;
const PIXELS_PER_CELL_Y: u32 = 9;
const DEFAULT_CHAR: u8 = b' ';
const DEFAULT_PIXEL: u8 = 0x0F;

/// Standard 16-entry CGA-style palette every window starts with.
pub const DEFAULT_PALETTE_16: [(u8, u8, u8); 16] = [
    (0xF0, 0xF0, 0xF0), // 0 white
    (0xF2, 0xB2, 0x33), // 1 orange
    (0xE5, 0x7F, 0xD8), // 2 magenta
    (0x99, 0xB2, 0xF2), // 3 light blue
    (0xDE, 0xDE, 0x6C), // 4 yellow
    (0x7F, 0xCC, 0x19), // 5 lime
    (0xF2, 0xB2, 0xCC), // 6 pink
    (0x4C, 0x4C, 0x4C), // 7 gray
    (0x99, 0x99, 0x99), // 8 light gray
    (0x4C, 0x99, 0x99), // 9 cyan
    (0xb2, 0x66, 0xe5), // 10 purple
    (0x33, 0x66, 0xcc), // 11 blue
    (0x7F, 0x66, 0x4C), // 12 brown
    (0x57, 0xA6, 0x4E), // 13 green
    (0xCC, 0x4C, 0x4C), // 14 red
    (0x19, 0x19, 0x19), // 15 black
];

/// Terminal rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Text = 0,
    Pixel16 = 1,
    Pixel256 = 2,
}

impl Mode {
    fn from_wire(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Mode::Text),
            1 => Ok(Mode::Pixel16),
            2 => Ok(Mode::Pixel256),
            other => Err(ProtocolError::InvalidArgument(format!("unknown mode {other}"))),
        }
    }
}

/// Per-window server-side terminal state, as described in spec §3.
pub struct ServerTerminal {
    mode: Mode,
    width: u16,
    height: u16,
    cursor_x: u16,
    cursor_y: u16,
    blink: bool,
    visible: bool,
    closed: bool,
    current_color: u8,
    screen: Vec<Vec<u8>>,
    colors: Vec<Vec<u8>>,
    pixels: Vec<Vec<u8>>,
    palette: Vec<(u8, u8, u8)>,
    title: String,
    is_monitor: bool,
    computer_id: u8,
    changed: bool,
}

impl ServerTerminal {
    /// Creates a new text-mode window of the given size, cursor at (1,1),
    /// default palette, visible, not yet changed. Defaults to a non-monitor
    /// window with computer id 0; see [`Self::with_identity`] to override.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let mut palette = vec![(0u8, 0u8, 0u8); 256];
        palette[..16].copy_from_slice(&DEFAULT_PALETTE_16);
        ServerTerminal {
            mode: Mode::Text,
            width,
            height,
            cursor_x: 1,
            cursor_y: 1,
            blink: true,
            visible: true,
            closed: false,
            current_color: 0xF0,
            screen: vec![vec![DEFAULT_CHAR; width as usize]; height as usize],
            colors: vec![vec![0xF0; width as usize]; height as usize],
            pixels: vec![vec![DEFAULT_PIXEL; (width as u32 * PIXELS_PER_CELL_X) as usize]; (height as u32 * PIXELS_PER_CELL_Y) as usize],
            palette,
            title: String::new(),
            is_monitor: false,
            computer_id: 0,
            changed: true,
        }
    }

    /// Like [`Self::new`], but sets whether this window represents a
    /// monitor peripheral (secondary id always 0) versus a computer
    /// console (secondary id is `computer_id`), per spec §4.5.
    #[must_use]
    pub fn with_identity(width: u16, height: u16, is_monitor: bool, computer_id: u8) -> Self {
        let mut terminal = Self::new(width, height);
        terminal.is_monitor = is_monitor;
        terminal.computer_id = computer_id;
        terminal
    }

    /// The secondary id byte WindowInfo packets carry: 0 for a monitor,
    /// the computer id otherwise.
    pub(crate) fn secondary_id(&self) -> u8 {
        if self.is_monitor {
            0
        } else {
            self.computer_id
        }
    }

    /// Sets the initial title without marking the window dirty or
    /// producing a packet, for use at construction time before any
    /// handshake has been sent.
    pub(crate) fn set_initial_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    /// Current width in character cells.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Current height in character cells.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Whether a repaint is pending.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Whether the client requested this window be torn down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn assert_row_invariants(&self) {
        debug_assert!(self.screen.iter().all(|row| row.len() == self.width as usize));
        debug_assert!(self.colors.iter().all(|row| row.len() == self.width as usize));
        debug_assert!(self.pixels.iter().all(|row| row.len() == (self.width as u32 * PIXELS_PER_CELL_X) as usize));
    }

    /// Writes `text` starting at 1-indexed `(x, y)`, using `colors[i]` as the
    /// packed `(bg<<4)|fg` byte for each character. Clips to the visible
    /// area; out-of-range writes still move the cursor but draw nothing.
    ///
    /// `text.chars().count()` must equal `colors.len()`; a mismatch is a
    /// fatal caller error (spec §7).
    pub fn write(&mut self, x: u16, y: u16, text: &str, colors: &[u8]) -> Result<()> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() != colors.len() {
            return Err(ProtocolError::InvalidArgument(format!(
                "write: {} characters but {} colors",
                chars.len(),
                colors.len()
            )));
        }
        if y >= 1 && (y as usize - 1) < self.height as usize {
            let row_idx = y as usize - 1;
            for (i, (&ch, &color)) in chars.iter().zip(colors.iter()).enumerate() {
                let col = x as usize - 1 + i;
                if x >= 1 && col < self.width as usize {
                    self.screen[row_idx][col] = ch as u8;
                    self.colors[row_idx][col] = color;
                    self.current_color = color;
                }
            }
        }
        self.cursor_x = x + chars.len() as u16;
        self.cursor_y = y;
        self.changed = true;
        self.assert_row_invariants();
        Ok(())
    }

    /// Blits one row of pixel-grid palette indices at pixel coordinates
    /// `(x, y)` (0-indexed, unlike character coordinates).
    pub fn blit_pixel_row(&mut self, x: u32, y: u32, indices: &[u8]) -> Result<()> {
        let pixel_height = self.height as u32 * PIXELS_PER_CELL_Y;
        let pixel_width = self.width as u32 * PIXELS_PER_CELL_X;
        if y < pixel_height {
            let row = &mut self.pixels[y as usize];
            for (i, &value) in indices.iter().enumerate() {
                let col = x as usize + i;
                if (col as u32) < pixel_width {
                    row[col] = value;
                }
            }
        }
        self.changed = true;
        Ok(())
    }

    /// Scrolls content: positive `n` scrolls up by `n` rows, negative scrolls
    /// down; `|n| >= height` clears the whole buffer. Rows scrolled in take
    /// the current background color.
    pub fn scroll(&mut self, n: i32) {
        let height = self.height as usize;
        let bg = (self.current_color >> 4) & 0x0F;
        let blank_color = (bg << 4) | bg;
        if n.unsigned_abs() as usize >= height {
            for row in &mut self.screen {
                row.iter_mut().for_each(|c| *c = DEFAULT_CHAR);
            }
            for row in &mut self.colors {
                row.iter_mut().for_each(|c| *c = blank_color);
            }
        } else if n > 0 {
            self.screen.rotate_left(n as usize);
            self.colors.rotate_left(n as usize);
            for row in &mut self.screen[height - n as usize..] {
                row.iter_mut().for_each(|c| *c = DEFAULT_CHAR);
            }
            for row in &mut self.colors[height - n as usize..] {
                row.iter_mut().for_each(|c| *c = blank_color);
            }
        } else if n < 0 {
            let n = (-n) as usize;
            self.screen.rotate_right(n);
            self.colors.rotate_right(n);
            for row in &mut self.screen[..n] {
                row.iter_mut().for_each(|c| *c = DEFAULT_CHAR);
            }
            for row in &mut self.colors[..n] {
                row.iter_mut().for_each(|c| *c = blank_color);
            }
        }
        self.changed = true;
    }

    /// Resizes the window, truncating or padding the screen/color/pixel
    /// grids, and returns the `WindowInfo` update packet announcing the new
    /// dimensions.
    pub fn resize(&mut self, window: u8, width: u16, height: u16) -> Packet {
        let mut new_screen = vec![vec![DEFAULT_CHAR; width as usize]; height as usize];
        let mut new_colors = vec![vec![0xF0u8; width as usize]; height as usize];
        for y in 0..height.min(self.height) as usize {
            let copy_w = width.min(self.width) as usize;
            new_screen[y][..copy_w].copy_from_slice(&self.screen[y][..copy_w]);
            new_colors[y][..copy_w].copy_from_slice(&self.colors[y][..copy_w]);
        }
        let mut new_pixels = vec![vec![DEFAULT_PIXEL; (width as u32 * PIXELS_PER_CELL_X) as usize]; (height as u32 * PIXELS_PER_CELL_Y) as usize];
        let old_pixel_h = self.height as u32 * PIXELS_PER_CELL_Y;
        let new_pixel_h = height as u32 * PIXELS_PER_CELL_Y;
        let copy_pw = (width.min(self.width) as u32 * PIXELS_PER_CELL_X) as usize;
        for y in 0..new_pixel_h.min(old_pixel_h) as usize {
            new_pixels[y][..copy_pw].copy_from_slice(&self.pixels[y][..copy_pw]);
        }

        self.screen = new_screen;
        self.colors = new_colors;
        self.pixels = new_pixels;
        self.width = width;
        self.height = height;
        self.changed = true;

        Packet {
            window,
            body: PacketBody::WindowInfo {
                flags: window_flags::UPDATE,
                secondary_id: self.secondary_id(),
                width,
                height,
                title: self.title.clone(),
            },
        }
    }

    /// Sets one palette entry. In text/pixel-16 mode, `index_or_bits` is a
    /// power-of-two color bit (as sent by the wire callers); in pixel-256
    /// mode it is a raw 0..255 index.
    pub fn set_palette(&mut self, index_or_bits: u16, rgb: (u8, u8, u8)) -> Result<()> {
        let index = self.resolve_palette_index(index_or_bits)?;
        self.palette[index as usize] = rgb;
        self.changed = true;
        Ok(())
    }

    /// Inverse of [`Self::set_palette`].
    pub fn get_palette(&self, index_or_bits: u16) -> Result<(u8, u8, u8)> {
        let index = self.resolve_palette_index(index_or_bits)?;
        Ok(self.palette[index as usize])
    }

    fn resolve_palette_index(&self, index_or_bits: u16) -> Result<u8> {
        match self.mode {
            Mode::Pixel256 => {
                if index_or_bits > 255 {
                    return Err(ProtocolError::InvalidArgument("palette index out of range".into()));
                }
                Ok(index_or_bits as u8)
            }
            Mode::Text | Mode::Pixel16 => {
                if index_or_bits == 0 || !index_or_bits.is_power_of_two() || index_or_bits > 0x8000 {
                    return Err(ProtocolError::InvalidArgument("palette bit value must be a power of two in 1..=32768".into()));
                }
                Ok(index_or_bits.trailing_zeros() as u8)
            }
        }
    }

    /// Sets the window title and returns the `WindowInfo` update packet.
    pub fn push_title(&mut self, window: u8, title: &str) -> Packet {
        self.title = title.to_string();
        self.changed = true;
        Packet {
            window,
            body: PacketBody::WindowInfo {
                flags: window_flags::UPDATE,
                secondary_id: self.secondary_id(),
                width: 0,
                height: 0,
                title: self.title.clone(),
            },
        }
    }

    /// Builds a `ServerMessage` packet; does not mutate terminal state.
    #[must_use]
    pub fn build_message(window: u8, kind: MessageKind, title: &str, body: &str) -> Packet {
        let flags = match kind {
            MessageKind::Error => message_flags::ERROR,
            MessageKind::Warning => message_flags::WARNING,
            MessageKind::Info => message_flags::INFO,
        };
        Packet { window, body: PacketBody::ServerMessage { flags, title: title.to_string(), body: body.to_string() } }
    }

    /// Emits a kind-0 repaint packet if `visible && changed`, clearing the
    /// dirty flag. Returns `None` otherwise (spec §4.4).
    pub fn repaint(&mut self, window: u8) -> Option<Packet> {
        if !self.visible || !self.changed {
            return None;
        }
        let header = ScreenUpdateHeader {
            mode: self.mode as u8,
            blink: self.blink,
            width: self.width,
            height: self.height,
            cursor_x: self.cursor_x,
            cursor_y: self.cursor_y,
            grayscale: false,
        };
        let rle_streams = match self.mode {
            Mode::Text => {
                let flat_chars: Vec<u8> = self.screen.iter().flatten().copied().collect();
                let flat_colors: Vec<u8> = self.colors.iter().flatten().copied().collect();
                vec![rle_encode(&flat_chars), rle_encode(&flat_colors)]
            }
            Mode::Pixel16 | Mode::Pixel256 => {
                let flat: Vec<u8> = self.pixels.iter().flatten().copied().collect();
                vec![rle_encode(&flat)]
            }
        };
        let palette_len = if matches!(self.mode, Mode::Pixel256) { 256 } else { 16 };
        let palette = self.palette[..palette_len].to_vec();

        self.changed = false;
        Some(Packet { window, body: PacketBody::ScreenUpdate(ScreenUpdate { header, rle_streams, palette }) })
    }

    /// Emits the close packet (flags=1 keep-alive or flags=2 teardown) and
    /// marks this window closed when `teardown` is set.
    pub fn close(&mut self, window: u8, teardown: bool) -> Packet {
        if teardown {
            self.closed = true;
        }
        Packet {
            window,
            body: PacketBody::WindowInfo {
                flags: if teardown { window_flags::CLOSE_TEARDOWN } else { window_flags::CLOSE_KEEPALIVE },
                secondary_id: self.secondary_id(),
                width: 0,
                height: 0,
                title: self.title.clone(),
            },
        }
    }

    /// Dispatches one incoming packet per spec §4.4's input pump, mutating
    /// `flags` on a handshake and returning whatever the caller needs to act
    /// on next.
    pub fn dispatch(&mut self, packet: Packet, flags: &CapabilityFlags, local: LocalFeatures) -> Dispatch {
        match packet.body {
            PacketBody::KeyInput { code, flags: key_bits } => {
                let up = key_bits & key_flags::KEY_UP != 0;
                let repeat = key_bits & key_flags::REPEAT != 0;
                if key_bits & key_flags::CHARACTER != 0 {
                    Dispatch::Event(ServerEvent::Char(code as char))
                } else {
                    match crate::keymap::key_for_scancode(code) {
                        Some(key) => Dispatch::Event(ServerEvent::Key { key, up, repeat }),
                        None => Dispatch::Ignored,
                    }
                }
            }
            PacketBody::MouseInput { event, button, x, y } => {
                let mouse = match event {
                    mouse_event::CLICK => MouseEvent::Click { button, x, y },
                    mouse_event::UP => MouseEvent::Up { button, x, y },
                    mouse_event::SCROLL => {
                        MouseEvent::Scroll { direction: if button == 0 { -1 } else { 1 }, x, y }
                    }
                    mouse_event::DRAG => MouseEvent::Drag { button, x, y },
                    _ => return Dispatch::Ignored,
                };
                Dispatch::Event(ServerEvent::Mouse(mouse))
            }
            PacketBody::EventQueue { name, params } => Dispatch::Event(ServerEvent::Custom { name, params }),
            PacketBody::WindowInfo { flags: wflags, .. } => match wflags {
                window_flags::CLOSE_KEEPALIVE => Dispatch::Ignored,
                window_flags::CLOSE_TEARDOWN => {
                    self.closed = true;
                    Dispatch::Event(ServerEvent::WindowClosed)
                }
                _ => Dispatch::Ignored,
            },
            PacketBody::Handshake { feature_bits } => {
                let outcome = observe_peer_bits(flags, local, feature_bits);
                Dispatch::HandshakeObserved(outcome)
            }
            PacketBody::FsRequest(req) => Dispatch::FsRequest(req),
            PacketBody::FsData { req_id, data, .. } => Dispatch::FsWriteCommit { req_id, data },
            _ => Dispatch::Ignored,
        }
    }
}

/// What [`ServerTerminal::dispatch`] determined about an incoming packet.
#[derive(Debug)]
pub enum Dispatch {
    /// Deliver this event to the server application.
    Event(ServerEvent),
    /// A handshake packet was observed; capability flags were updated.
    HandshakeObserved(HandshakeOutcome),
    /// A filesystem request needs handling by `fsbridge`.
    FsRequest(FsRequest),
    /// A write-class file open's commit payload arrived.
    FsWriteCommit { req_id: u8, data: Vec<u8> },
    /// The packet carried no actionable information for this layer.
    Ignored,
}

/// Maps a filesystem op's high-nibble bit to whether it is a file-open
/// request, and if so which of [`crate::protocol::OPEN_MODES`] to use.
#[must_use]
pub fn fs_open_mode(op: u8) -> Option<u8> {
    if op & fs_op::OPEN_MASK != 0 {
        Some(op & 0x07)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_terminal_satisfies_row_invariants() {
        let term = ServerTerminal::new(10, 5);
        assert!(term.screen.iter().all(|r| r.len() == 10));
        assert!(term.colors.iter().all(|r| r.len() == 10));
        assert!(term.pixels.iter().all(|r| r.len() == 60));
        assert_eq!(term.pixels.len(), 45);
    }

    #[test]
    fn write_clips_and_preserves_cursor() {
        let mut term = ServerTerminal::new(5, 2);
        term.write(4, 1, "hello", &[0xF0; 5]).unwrap();
        assert_eq!(term.screen[0], vec![b' ', b' ', b' ', b'h', b'e']);
        assert_eq!(term.cursor_x, 9);
        assert_eq!(term.cursor_y, 1);
    }

    #[test]
    fn write_mismatched_lengths_is_fatal() {
        let mut term = ServerTerminal::new(5, 2);
        assert!(term.write(1, 1, "ab", &[0xF0]).is_err());
    }

    #[test]
    fn monitor_windows_always_report_secondary_id_zero() {
        let monitor = ServerTerminal::with_identity(5, 2, true, 7);
        assert_eq!(monitor.secondary_id(), 0);
        let computer = ServerTerminal::with_identity(5, 2, false, 7);
        assert_eq!(computer.secondary_id(), 7);
    }

    #[test]
    fn resize_carries_computer_id_in_secondary_id() {
        let mut term = ServerTerminal::with_identity(5, 2, false, 3);
        let packet = term.resize(0, 6, 2);
        match packet.body {
            PacketBody::WindowInfo { secondary_id, .. } => assert_eq!(secondary_id, 3),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn scroll_up_blanks_trailing_rows() {
        let mut term = ServerTerminal::new(3, 3);
        term.write(1, 1, "aaa", &[0xF0; 3]).unwrap();
        term.write(1, 2, "bbb", &[0xF0; 3]).unwrap();
        term.write(1, 3, "ccc", &[0xF0; 3]).unwrap();
        term.scroll(1);
        assert_eq!(term.screen[0], vec![b'b', b'b', b'b']);
        assert_eq!(term.screen[1], vec![b'c', b'c', b'c']);
        assert_eq!(term.screen[2], vec![b' ', b' ', b' ']);
    }

    #[test]
    fn scroll_beyond_height_clears_buffer() {
        let mut term = ServerTerminal::new(3, 3);
        term.write(1, 1, "aaa", &[0xF0; 3]).unwrap();
        term.scroll(10);
        assert!(term.screen.iter().all(|row| row.iter().all(|&c| c == b' ')));
    }

    #[test]
    fn resize_preserves_overlapping_region() {
        let mut term = ServerTerminal::new(4, 4);
        term.write(1, 1, "ab", &[0xF0; 2]).unwrap();
        let _ = term.resize(0, 2, 2);
        assert_eq!(term.width(), 2);
        assert_eq!(term.height(), 2);
        assert_eq!(term.screen[0], vec![b'a', b'b']);
        assert!(term.screen.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn palette_bit_index_round_trip_in_text_mode() {
        let mut term = ServerTerminal::new(1, 1);
        term.set_palette(0x08, (1, 2, 3)).unwrap(); // bit index 3
        assert_eq!(term.get_palette(0x08).unwrap(), (1, 2, 3));
        assert_eq!(term.palette[3], (1, 2, 3));
    }

    #[test]
    fn palette_raw_index_in_pixel256_mode() {
        let mut term = ServerTerminal::new(1, 1);
        term.mode = Mode::Pixel256;
        term.set_palette(200, (9, 9, 9)).unwrap();
        assert_eq!(term.palette[200], (9, 9, 9));
    }

    #[test]
    fn repaint_idempotence_property_8() {
        let mut term = ServerTerminal::new(4, 2);
        term.write(1, 1, "hi", &[0xF0; 2]).unwrap();
        let first = term.repaint(0).unwrap();
        assert!(!term.is_changed());
        // No mutation since: a second repaint attempt yields nothing.
        assert!(term.repaint(0).is_none());
        term.write(1, 1, "hi", &[0xF0; 2]).unwrap();
        let second = term.repaint(0).unwrap();
        assert_eq!(first.body, second.body);
    }

    #[test]
    fn scenario_s1_write_then_repaint() {
        let mut term = ServerTerminal::new(80, 24);
        term.write(1, 1, "hi", &[0xF0, 0xF0]).unwrap();
        let packet = term.repaint(0).unwrap();
        match packet.body {
            PacketBody::ScreenUpdate(update) => {
                assert_eq!(update.palette[..16], DEFAULT_PALETTE_16);
                let chars = crate::protocol::rle_decode(&update.rle_streams[0], 80 * 24).unwrap();
                assert_eq!(&chars[..2], b"hi");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn close_with_teardown_marks_closed() {
        let mut term = ServerTerminal::new(1, 1);
        let packet = term.close(0, true);
        assert!(term.is_closed());
        match packet.body {
            PacketBody::WindowInfo { flags, .. } => assert_eq!(flags, window_flags::CLOSE_TEARDOWN),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn dispatch_key_input_scancode() {
        let mut term = ServerTerminal::new(1, 1);
        let flags = CapabilityFlags::new();
        let local = LocalFeatures { binary_checksum: false, filesystem: false, request_window_info: false };
        let packet = Packet { window: 0, body: PacketBody::KeyInput { code: 0x1E, flags: 0 } };
        match term.dispatch(packet, &flags, local) {
            Dispatch::Event(ServerEvent::Key { key, up, repeat }) => {
                assert_eq!(key, crate::keymap::Key::Letter(b'A'));
                assert!(!up);
                assert!(!repeat);
            }
            other => panic!("unexpected dispatch: {other:?}"),
        }
    }

    #[test]
    fn dispatch_close_teardown_produces_window_closed_event() {
        let mut term = ServerTerminal::new(1, 1);
        let flags = CapabilityFlags::new();
        let local = LocalFeatures { binary_checksum: false, filesystem: false, request_window_info: false };
        let packet = Packet {
            window: 0,
            body: PacketBody::WindowInfo { flags: window_flags::CLOSE_TEARDOWN, secondary_id: 0, width: 0, height: 0, title: String::new() },
        };
        match term.dispatch(packet, &flags, local) {
            Dispatch::Event(ServerEvent::WindowClosed) => assert!(term.is_closed()),
            other => panic!("unexpected dispatch: {other:?}"),
        }
    }
}
