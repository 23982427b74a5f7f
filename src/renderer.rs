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

//! Client-side: decodes server packets and drives a [`Display`], and
//! serializes host input into outgoing packets.

use crate::display::{Display, MessageKind};
use crate::error::{ProtocolError, Result};
use crate::events::{ClientEvent, HostEvent};
use crate::fsbridge::FsCaller;
use crate::handshake::{CapabilityFlags, LocalFeatures};
use crate::keymap::{scancode_for_key, Key};
use crate::protocol::{
    fs_op, key_flags, message_flags, mouse_event, rle_decode, Packet, PacketBody,
};

/// Decodes and applies one kind-0 packet to `display`.
///
/// Follows the sequence in spec §4.5: hide, switch mode, clear, blit rows,
/// apply palette, restore cursor, show.
pub async fn apply_screen_update(display: &dyn Display, packet: &PacketBody) -> Result<()> {
    let PacketBody::ScreenUpdate(update) = packet else {
        return Err(ProtocolError::InvalidArgument("apply_screen_update: not a ScreenUpdate".into()));
    };
    display.set_visible(false).await?;
    display.set_mode(update.header.mode).await?;

    match update.header.mode {
        0 => {
            let cell_count = update.header.width as usize * update.header.height as usize;
            let chars = rle_decode(&update.rle_streams[0], cell_count)?;
            let colors = rle_decode(&update.rle_streams[1], cell_count)?;
            for row in 0..update.header.height {
                for col in 0..update.header.width {
                    let idx = row as usize * update.header.width as usize + col as usize;
                    let packed = colors[idx];
                    let fg = packed & 0x0F;
                    let bg = (packed >> 4) & 0x0F;
                    display.blit_char(col + 1, row + 1, chars[idx], fg, bg).await?;
                }
            }
        }
        _ => {
            let pixel_width = update.header.width as u32 * 6;
            let pixel_height = update.header.height as u32 * 9;
            let flat = rle_decode(&update.rle_streams[0], (pixel_width * pixel_height) as usize)?;
            for row in 0..pixel_height {
                let start = (row * pixel_width) as usize;
                let end = start + pixel_width as usize;
                display.blit_pixel_row(0, row, &flat[start..end]).await?;
            }
        }
    }

    for (i, &rgb) in update.palette.iter().enumerate() {
        display.set_palette_entry(i as u8, rgb).await?;
    }

    display.set_cursor_pos(update.header.cursor_x, update.header.cursor_y).await?;
    display.set_cursor_blink(update.header.blink).await?;
    display.set_visible(true).await?;
    Ok(())
}

/// Decodes one incoming packet, applying it to `display`/`flags`/`fs_caller`
/// as appropriate, and returns a host-visible event if one resulted.
pub async fn apply_packet(
    display: &dyn Display,
    flags: &CapabilityFlags,
    local: LocalFeatures,
    fs_caller: &mut FsCaller,
    packet: Packet,
) -> Result<Option<ClientEvent>> {
    match &packet.body {
        PacketBody::ScreenUpdate(_) => {
            apply_screen_update(display, &packet.body).await?;
            Ok(None)
        }
        PacketBody::WindowInfo { flags: wflags, width, height, title, .. } => {
            match *wflags {
                crate::protocol::window_flags::CLOSE_TEARDOWN => Ok(Some(ClientEvent::WindowClosed)),
                crate::protocol::window_flags::CLOSE_KEEPALIVE => Ok(None),
                _ => {
                    if *width != 0 && *height != 0 {
                        // Resize notification; Display has no dedicated resize
                        // hook beyond what set_mode/blit already imply, but a
                        // title change is always forwarded.
                    }
                    display.set_title(title).await?;
                    Ok(None)
                }
            }
        }
        PacketBody::ServerMessage { flags: mflags, title, body } => {
            let kind = if mflags & message_flags::ERROR != 0 {
                MessageKind::Error
            } else if mflags & message_flags::WARNING != 0 {
                MessageKind::Warning
            } else {
                MessageKind::Info
            };
            display.show_message(kind, title, body).await?;
            Ok(Some(ClientEvent::Message { kind, title: title.clone(), body: body.clone() }))
        }
        PacketBody::Handshake { feature_bits } => {
            crate::handshake::observe_peer_bits(flags, local, *feature_bits);
            Ok(None)
        }
        PacketBody::FsResponse { req_id, .. } | PacketBody::FsData { req_id, .. } => {
            fs_caller.complete(*req_id, packet);
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Serializes one host input event into its outgoing packet (kind-1/2/3).
#[must_use]
pub fn encode_host_event(window: u8, event: &HostEvent) -> Packet {
    let body = match event {
        HostEvent::Key { key, up, repeat } => {
            let mut flags = 0u8;
            if *up {
                flags |= key_flags::KEY_UP;
            }
            if *repeat {
                flags |= key_flags::REPEAT;
            }
            let code = scancode_for_key(*key).unwrap_or(0);
            PacketBody::KeyInput { code, flags }
        }
        HostEvent::Char(ch) => {
            let mut buf = [0u8; 4];
            let encoded = ch.encode_utf8(&mut buf);
            PacketBody::KeyInput { code: encoded.as_bytes()[0], flags: key_flags::CHARACTER }
        }
        HostEvent::MouseClick { button, x, y } => {
            PacketBody::MouseInput { event: mouse_event::CLICK, button: *button, x: *x, y: *y }
        }
        HostEvent::MouseUp { button, x, y } => {
            PacketBody::MouseInput { event: mouse_event::UP, button: *button, x: *x, y: *y }
        }
        HostEvent::MouseScroll { direction, x, y } => {
            let button = if *direction < 0 { 0 } else { 1 };
            PacketBody::MouseInput { event: mouse_event::SCROLL, button, x: *x, y: *y }
        }
        HostEvent::MouseDrag { button, x, y } => {
            PacketBody::MouseInput { event: mouse_event::DRAG, button: *button, x: *x, y: *y }
        }
        HostEvent::Custom { name, params } => {
            PacketBody::EventQueue { name: name.clone(), params: params.clone() }
        }
    };
    Packet { window, body }
}

/// Builds the kind-6 handshake packet this endpoint advertises on attach.
#[must_use]
pub fn build_handshake_packet(window: u8, local: LocalFeatures) -> Packet {
    Packet { window, body: PacketBody::Handshake { feature_bits: local.to_bits() } }
}

/// Builds a kind-7 filesystem request for a non-open op.
#[must_use]
pub fn build_fs_request(window: u8, op: u8, req_id: u8, path: &str, path2: Option<&str>) -> Packet {
    Packet {
        window,
        body: PacketBody::FsRequest(crate::protocol::FsRequest {
            op,
            req_id,
            path: path.to_string(),
            path2: path2.map(str::to_string),
        }),
    }
}

/// Builds a kind-7 file-open request selecting `mode_bits` (0..=7, see
/// [`crate::protocol::OPEN_MODES`]).
#[must_use]
pub fn build_fs_open(window: u8, mode_bits: u8, req_id: u8, path: &str) -> Packet {
    build_fs_request(window, fs_op::OPEN_MASK | (mode_bits & 0x07), req_id, path, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s2_queue_char_event() {
        let packet = encode_host_event(0, &HostEvent::Char('A'));
        match packet.body {
            PacketBody::KeyInput { code, flags } => {
                assert_eq!(code, b'A');
                assert_eq!(flags, key_flags::CHARACTER);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn scenario_s3_queue_mouse_scroll_event() {
        let packet = encode_host_event(0, &HostEvent::MouseScroll { direction: -1, x: 5, y: 7 });
        assert_eq!(packet.encode()[..], [crate::protocol::kind::MOUSE_INPUT, 0, 0x02, 0x00, 5, 0, 0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn named_key_round_trips_through_scancode() {
        let packet = encode_host_event(0, &HostEvent::Key { key: Key::Letter(b'A'), up: false, repeat: false });
        match packet.body {
            PacketBody::KeyInput { code, flags } => {
                assert_eq!(code, 0x1E);
                assert_eq!(flags, 0);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn handshake_packet_carries_local_bits() {
        let local = LocalFeatures { binary_checksum: true, filesystem: false, request_window_info: true };
        let packet = build_handshake_packet(0, local);
        assert_eq!(packet.body, PacketBody::Handshake { feature_bits: local.to_bits() });
    }
}
