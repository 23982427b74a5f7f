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

//! Session wiring for the client side: races the Transport against host
//! input, applying server packets to a [`Display`] and serializing host
//! events back out.

use std::sync::Arc;

use log::warn;
use tokio::sync::mpsc;

use crate::display::Display;
use crate::error::Result;
use crate::events::{ClientEvent, HostEvent};
use crate::fsbridge::FsCaller;
use crate::framing::{decode_frame, encode_frame};
use crate::handshake::{CapabilityFlags, LocalFeatures};
use crate::protocol::Packet;
use crate::renderer;
use crate::transport::Transport;

const DEFAULT_WINDOW: u8 = 0;

/// One client-side session over a single `Transport`, driving one `Display`.
pub struct ClientSession {
    transport: Arc<dyn Transport>,
    display: Arc<dyn Display>,
    flags: CapabilityFlags,
    local: LocalFeatures,
    fs_caller: FsCaller,
    window: u8,
    recv_buf: String,
}

impl ClientSession {
    /// Creates a session driving `display` over `transport`.
    pub fn new(transport: Arc<dyn Transport>, display: Arc<dyn Display>, filesystem_enabled: bool) -> Self {
        let local = LocalFeatures { binary_checksum: true, filesystem: filesystem_enabled, request_window_info: true };
        ClientSession {
            transport,
            display,
            flags: CapabilityFlags::new(),
            local,
            fs_caller: FsCaller::new(),
            window: DEFAULT_WINDOW,
            recv_buf: String::new(),
        }
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        let bytes = packet.encode();
        let frame = encode_frame(&bytes, &self.flags)?;
        self.transport.send(frame).await
    }

    /// Sends this client's kind-6 handshake packet. Call once before
    /// [`Self::run`].
    pub async fn send_handshake(&self) -> Result<()> {
        self.send_packet(renderer::build_handshake_packet(self.window, self.local)).await
    }

    /// Queues one host input event as an outgoing packet.
    pub async fn queue_event(&self, event: &HostEvent) -> Result<()> {
        self.send_packet(renderer::encode_host_event(self.window, event)).await
    }

    /// Sends a filesystem request and returns a receiver for the eventual
    /// kind-8/9 response (see [`crate::fsbridge::FsCaller`]).
    pub async fn call_fs(&mut self, op: u8, path: &str, path2: Option<&str>) -> Result<tokio::sync::oneshot::Receiver<Packet>> {
        let (req_id, rx) = self.fs_caller.begin_call();
        let packet = renderer::build_fs_request(self.window, op, req_id, path, path2);
        self.send_packet(packet).await?;
        Ok(rx)
    }

    /// Runs the session until the Transport closes or the server tears the
    /// window down, forwarding host-visible notifications on `event_tx`.
    ///
    /// This races Transport reads against nothing else internally; the
    /// caller is expected to race [`Self::queue_event`] calls (driven by its
    /// own host-input source) concurrently with this loop, per spec §5's
    /// two-task model.
    pub async fn run(&mut self, event_tx: mpsc::Sender<ClientEvent>) -> Result<()> {
        loop {
            match self.transport.receive(None).await? {
                Some(frame) => {
                    if let Some(event) = self.on_frame(&frame).await? {
                        if matches!(event, ClientEvent::WindowClosed) {
                            let _ = event_tx.send(event).await;
                            self.transport.close().await?;
                            return Ok(());
                        }
                        let _ = event_tx.send(event).await;
                    }
                }
                None => return Ok(()),
            }
        }
    }

    async fn on_frame(&mut self, frame: &str) -> Result<Option<ClientEvent>> {
        self.recv_buf.push_str(frame);
        let mut last_event = None;
        loop {
            match decode_frame(&self.recv_buf, &self.flags) {
                Ok(Some((decoded, consumed))) => {
                    self.recv_buf.drain(..consumed);
                    let Some(packet) = Packet::decode(decoded.payload.into())? else {
                        continue;
                    };
                    if let Some(event) =
                        renderer::apply_packet(self.display.as_ref(), &self.flags, self.local, &mut self.fs_caller, packet).await?
                    {
                        last_event = Some(event);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("dropping malformed frame: {e}");
                    self.recv_buf.clear();
                    break;
                }
            }
        }
        Ok(last_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplaySize;
    use crate::protocol::PacketBody;
    use crate::terminal::ServerTerminal;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct MockTransport {
        outgoing: AsyncMutex<VecDeque<crate::transport::Frame>>,
        incoming: AsyncMutex<VecDeque<crate::transport::Frame>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, frame: crate::transport::Frame) -> Result<()> {
            self.outgoing.lock().await.push_back(frame);
            Ok(())
        }
        async fn receive(&self, _timeout: Option<std::time::Duration>) -> Result<Option<crate::transport::Frame>> {
            Ok(self.incoming.lock().await.pop_front())
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        blits: StdMutex<Vec<(u16, u16, u8)>>,
    }

    #[async_trait]
    impl Display for RecordingDisplay {
        async fn set_mode(&self, _mode: u8) -> Result<()> {
            Ok(())
        }
        async fn set_cursor_pos(&self, _x: u16, _y: u16) -> Result<()> {
            Ok(())
        }
        async fn set_cursor_blink(&self, _blink: bool) -> Result<()> {
            Ok(())
        }
        async fn set_visible(&self, _visible: bool) -> Result<()> {
            Ok(())
        }
        async fn set_palette_entry(&self, _index: u8, _rgb: (u8, u8, u8)) -> Result<()> {
            Ok(())
        }
        async fn blit_char(&self, x: u16, y: u16, ch: u8, _fg: u8, _bg: u8) -> Result<()> {
            self.blits.lock().unwrap().push((x, y, ch));
            Ok(())
        }
        async fn blit_pixel_row(&self, _x: u32, _y: u32, _indices: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn size(&self) -> Result<DisplaySize> {
            Ok(DisplaySize { cell_width: 2, cell_height: 1, pixel_width: 12, pixel_height: 9 })
        }
    }

    #[tokio::test]
    async fn send_handshake_emits_kind6_frame() {
        let transport = Arc::new(MockTransport::default());
        let client = ClientSession::new(transport.clone(), Arc::new(RecordingDisplay::default()), false);
        client.send_handshake().await.unwrap();
        let frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = crate::framing::decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload[0], crate::protocol::kind::HANDSHAKE);
    }

    #[tokio::test]
    async fn screen_update_from_server_blits_every_cell() {
        let transport = Arc::new(MockTransport::default());
        let display = Arc::new(RecordingDisplay::default());
        let mut client = ClientSession::new(transport.clone(), display.clone(), false);

        let mut terminal = ServerTerminal::new(2, 1);
        terminal.write(1, 1, "hi", &[0xF0, 0xF0]).unwrap();
        let packet = terminal.repaint(0).unwrap();
        let frame = crate::framing::encode_frame(&packet.encode(), &CapabilityFlags::new()).unwrap();

        let event = client.on_frame(&frame).await.unwrap();
        assert!(event.is_none());
        assert_eq!(*display.blits.lock().unwrap(), vec![(1, 1, b'h'), (2, 1, b'i')]);
    }

    #[tokio::test]
    async fn scenario_s6_close_teardown_surfaces_window_closed_event() {
        let transport = Arc::new(MockTransport::default());
        let client_display = Arc::new(RecordingDisplay::default());
        let mut client = ClientSession::new(transport, client_display, false);

        let packet = Packet {
            window: 0,
            body: PacketBody::WindowInfo {
                flags: crate::protocol::window_flags::CLOSE_TEARDOWN,
                secondary_id: 0,
                width: 0,
                height: 0,
                title: String::new(),
            },
        };
        let frame = crate::framing::encode_frame(&packet.encode(), &CapabilityFlags::new()).unwrap();
        let event = client.on_frame(&frame).await.unwrap();
        assert_eq!(event, Some(ClientEvent::WindowClosed));
    }
}
