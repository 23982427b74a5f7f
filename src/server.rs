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

//! Session wiring for the server side: owns one window's
//! [`ServerTerminal`], races the Transport against host input, and
//! coalesces repaints on a 50ms timer (spec §5).

use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::error::Result;
use crate::events::ServerEvent;
use crate::fsbridge::ServerFsState;
use crate::framing::{decode_frame, encode_frame};
use crate::handshake::{CapabilityFlags, LocalFeatures};
use crate::hostfs::HostFS;
use crate::protocol::{Packet, PacketBody};
use crate::terminal::{Dispatch, ServerTerminal};
use crate::transport::Transport;

const REPAINT_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_WINDOW: u8 = 0;

/// Construction-time configuration for a [`ServerSession`], in the spirit
/// of the teacher's `VncServer::new` + setter style: no config file or env
/// parsing, just constructor parameters and a small builder.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    width: u16,
    height: u16,
    title: String,
    is_monitor: bool,
    computer_id: u8,
    repaint_interval: Duration,
}

impl ServerConfig {
    /// Starts a config for a `width`x`height` text-mode window with the
    /// spec-default 50ms repaint interval.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        ServerConfig {
            width,
            height,
            title: String::new(),
            is_monitor: false,
            computer_id: 0,
            repaint_interval: REPAINT_INTERVAL,
        }
    }

    /// Sets the initial window title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Marks this window as a monitor peripheral rather than a computer
    /// console (affects the WindowInfo secondary id byte).
    #[must_use]
    pub fn monitor(mut self, is_monitor: bool) -> Self {
        self.is_monitor = is_monitor;
        self
    }

    /// Sets the computer id reported in the WindowInfo secondary id byte
    /// when this is not a monitor.
    #[must_use]
    pub fn computer_id(mut self, id: u8) -> Self {
        self.computer_id = id;
        self
    }

    /// Overrides the repaint coalescing interval (spec default: 50ms),
    /// for deterministic tests.
    #[must_use]
    pub fn repaint_interval(mut self, interval: Duration) -> Self {
        self.repaint_interval = interval;
        self
    }
}

/// One server-side session over a single `Transport`, owning one window.
pub struct ServerSession {
    transport: Arc<dyn Transport>,
    terminal: ServerTerminal,
    flags: CapabilityFlags,
    local: LocalFeatures,
    hostfs: Option<Arc<dyn HostFS>>,
    fs_state: ServerFsState,
    window: u8,
    recv_buf: String,
    repaint_interval: Duration,
}

impl ServerSession {
    /// Creates a session with a fresh text-mode window of `width`x`height`.
    pub fn new(
        transport: Arc<dyn Transport>,
        width: u16,
        height: u16,
        hostfs: Option<Arc<dyn HostFS>>,
    ) -> Self {
        Self::with_config(transport, ServerConfig::new(width, height), hostfs)
    }

    /// Creates a session from an explicit [`ServerConfig`].
    pub fn with_config(transport: Arc<dyn Transport>, config: ServerConfig, hostfs: Option<Arc<dyn HostFS>>) -> Self {
        let local = LocalFeatures { binary_checksum: true, filesystem: hostfs.is_some(), request_window_info: false };
        let mut terminal = ServerTerminal::with_identity(config.width, config.height, config.is_monitor, config.computer_id);
        if !config.title.is_empty() {
            terminal.set_initial_title(&config.title);
        }
        ServerSession {
            transport,
            terminal,
            flags: CapabilityFlags::new(),
            local,
            hostfs,
            fs_state: ServerFsState::new(),
            window: DEFAULT_WINDOW,
            recv_buf: String::new(),
            repaint_interval: config.repaint_interval,
        }
    }

    async fn send_packet(&self, packet: Packet) -> Result<()> {
        let bytes = packet.encode();
        let frame = encode_frame(&bytes, &self.flags)?;
        self.transport.send(frame).await
    }

    /// Sends the initial kind-6 handshake packet. Callers should invoke this
    /// once before [`Self::run`].
    pub async fn send_handshake(&self) -> Result<()> {
        self.send_packet(crate::renderer::build_handshake_packet(self.window, self.local)).await
    }

    /// Writes `text` into the terminal grid starting at 1-indexed `(x, y)`,
    /// one packed fg/bg color byte per character. Marks the window dirty
    /// for the next repaint tick; does not send a packet itself.
    pub fn write(&mut self, x: u16, y: u16, text: &str, colors: &[u8]) -> Result<()> {
        self.terminal.write(x, y, text, colors)
    }

    /// Overwrites one row of the pixel grid starting at `(x, y)`. Marks the
    /// window dirty; does not send a packet itself.
    pub fn blit_pixel_row(&mut self, x: u32, y: u32, indices: &[u8]) -> Result<()> {
        self.terminal.blit_pixel_row(x, y, indices)
    }

    /// Scrolls the terminal grid `n` rows (positive up, negative down).
    pub fn scroll(&mut self, n: i32) {
        self.terminal.scroll(n)
    }

    /// Sets one palette entry and sends the WindowInfo packet announcing it.
    pub fn set_palette(&mut self, index_or_bits: u16, rgb: (u8, u8, u8)) -> Result<()> {
        self.terminal.set_palette(index_or_bits, rgb)
    }

    /// Resizes the window and immediately sends the resulting WindowInfo
    /// packet.
    pub async fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        let packet = self.terminal.resize(self.window, width, height);
        self.send_packet(packet).await
    }

    /// Sets the window title and immediately sends the resulting WindowInfo
    /// packet.
    pub async fn set_title(&mut self, title: &str) -> Result<()> {
        let packet = self.terminal.push_title(self.window, title);
        self.send_packet(packet).await
    }

    /// Sends a ServerMessage dialog to the client.
    pub async fn show_message(&self, kind: crate::display::MessageKind, title: &str, body: &str) -> Result<()> {
        self.send_packet(ServerTerminal::build_message(self.window, kind, title, body)).await
    }

    /// Forces an immediate repaint, bypassing the 50ms timer, if the window
    /// has unsent changes.
    pub async fn flush(&mut self) -> Result<()> {
        if let Some(packet) = self.terminal.repaint(self.window) {
            self.send_packet(packet).await?;
        }
        Ok(())
    }

    /// Tears down the window, sending the final kind-4 close packet.
    pub async fn close(&mut self, teardown: bool) -> Result<()> {
        let packet = self.terminal.close(self.window, teardown);
        self.send_packet(packet).await
    }

    /// Runs the session until the Transport closes or the client tears the
    /// window down, forwarding decoded events on `event_tx`.
    ///
    /// Realizes spec §5's cooperative race: one logical task reads frames
    /// off the Transport, the other is this function's own 50ms repaint
    /// timer; `tokio::select!` implements the race-and-cancel combinator.
    pub async fn run(&mut self, event_tx: mpsc::Sender<ServerEvent>) -> Result<()> {
        let mut repaint_timer = interval(self.repaint_interval);

        loop {
            if self.terminal.is_closed() {
                return Ok(());
            }
            tokio::select! {
                frame = self.transport.receive(None) => {
                    match frame? {
                        Some(frame) => self.on_frame(&frame, &event_tx).await?,
                        None => {
                            debug!("transport closed, ending session");
                            return Ok(());
                        }
                    }
                }
                _ = repaint_timer.tick() => {
                    if let Some(packet) = self.terminal.repaint(self.window) {
                        self.send_packet(packet).await?;
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: &str, event_tx: &mpsc::Sender<ServerEvent>) -> Result<()> {
        self.recv_buf.push_str(frame);
        loop {
            match decode_frame(&self.recv_buf, &self.flags) {
                Ok(Some((decoded, consumed))) => {
                    self.recv_buf.drain(..consumed);
                    self.handle_payload(decoded.payload, event_tx).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("dropping malformed frame: {e}");
                    self.recv_buf.clear();
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle_payload(&mut self, payload: Vec<u8>, event_tx: &mpsc::Sender<ServerEvent>) -> Result<()> {
        let Some(packet) = Packet::decode(payload.into())? else {
            trace!("ignoring unrecognized packet kind");
            return Ok(());
        };
        match self.terminal.dispatch(packet, &self.flags, self.local) {
            Dispatch::Event(event) => {
                let _ = event_tx.send(event).await;
            }
            Dispatch::HandshakeObserved(outcome) => {
                let reply_bits = crate::handshake::server_reply_bits(outcome.peer_bits, self.hostfs.is_some());
                let reply = Packet { window: self.window, body: PacketBody::Handshake { feature_bits: reply_bits } };
                self.send_packet(reply).await?;
                if outcome.peer_requested_window_info {
                    let info = Packet {
                        window: self.window,
                        body: PacketBody::WindowInfo {
                            flags: crate::protocol::window_flags::UPDATE,
                            secondary_id: self.terminal.secondary_id(),
                            width: self.terminal.width(),
                            height: self.terminal.height(),
                            title: String::new(),
                        },
                    };
                    self.send_packet(info).await?;
                }
            }
            Dispatch::FsRequest(req) => {
                if !self.flags.filesystem() || self.hostfs.is_none() {
                    return Ok(());
                }
                let hostfs = self.hostfs.as_ref().unwrap().clone();
                let replies = self.fs_state.dispatch_request(hostfs.as_ref(), self.window, &req).await?;
                for reply in replies {
                    self.send_packet(reply).await?;
                }
            }
            Dispatch::FsWriteCommit { req_id, data } => {
                if !self.flags.filesystem() || self.hostfs.is_none() {
                    return Ok(());
                }
                let hostfs = self.hostfs.as_ref().unwrap().clone();
                if let Some(reply) = self.fs_state.commit_write(hostfs.as_ref(), self.window, req_id, &data).await? {
                    self.send_packet(reply).await?;
                }
            }
            Dispatch::Ignored => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Frame;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct MockTransport {
        outgoing: AsyncMutex<VecDeque<Frame>>,
        incoming: AsyncMutex<VecDeque<Frame>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, frame: Frame) -> Result<()> {
            self.outgoing.lock().await.push_back(frame);
            Ok(())
        }
        async fn receive(&self, _timeout: Option<Duration>) -> Result<Option<Frame>> {
            Ok(self.incoming.lock().await.pop_front())
        }
    }

    #[tokio::test]
    async fn send_handshake_emits_kind6_frame() {
        let transport = Arc::new(MockTransport::default());
        let session = ServerSession::new(transport.clone(), 5, 2, None);
        session.send_handshake().await.unwrap();
        let frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload[0], crate::protocol::kind::HANDSHAKE);
    }

    #[tokio::test]
    async fn monitor_config_yields_zero_secondary_id_on_resize() {
        let transport = Arc::new(MockTransport::default());
        let config = ServerConfig::new(5, 2).monitor(true).computer_id(9);
        let mut session = ServerSession::with_config(transport.clone(), config, None);
        session.resize(6, 2).await.unwrap();
        let frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        let packet = Packet::decode(decoded.payload.into()).unwrap().unwrap();
        match packet.body {
            PacketBody::WindowInfo { secondary_id, .. } => assert_eq!(secondary_id, 0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn computer_config_reports_its_id_on_resize() {
        let transport = Arc::new(MockTransport::default());
        let config = ServerConfig::new(5, 2).computer_id(9);
        let mut session = ServerSession::with_config(transport.clone(), config, None);
        session.resize(6, 2).await.unwrap();
        let frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        let packet = Packet::decode(decoded.payload.into()).unwrap().unwrap();
        match packet.body {
            PacketBody::WindowInfo { secondary_id, .. } => assert_eq!(secondary_id, 9),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_then_flush_emits_screen_update() {
        let transport = Arc::new(MockTransport::default());
        let mut session = ServerSession::new(transport.clone(), 5, 2, None);
        session.write(1, 1, "hi", &[0xF0, 0xF0]).unwrap();
        session.flush().await.unwrap();
        let frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = decode_frame(&frame, &flags).unwrap().unwrap();
        assert_eq!(decoded.payload[0], crate::protocol::kind::SCREEN_UPDATE);
    }

    #[tokio::test]
    async fn handshake_reply_is_client_bits_anded_with_server_allowed() {
        let transport = Arc::new(MockTransport::default());
        let mut session = ServerSession::new(transport.clone(), 5, 2, None);
        let packet = Packet { window: 0, body: PacketBody::Handshake { feature_bits: 0x07 } };
        let frame = encode_frame(&packet.encode(), &CapabilityFlags::new()).unwrap();

        let (tx, _rx) = mpsc::channel(1);
        session.on_frame(&frame, &tx).await.unwrap();

        let reply_frame = transport.outgoing.lock().await.pop_front().unwrap();
        let flags = CapabilityFlags::new();
        let (decoded, _) = decode_frame(&reply_frame, &flags).unwrap().unwrap();
        let reply = Packet::decode(decoded.payload.into()).unwrap().unwrap();
        match reply.body {
            PacketBody::Handshake { feature_bits } => assert_eq!(feature_bits, 0x01),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn key_input_frame_is_forwarded_as_event() {
        let transport = Arc::new(MockTransport::default());
        let mut session = ServerSession::new(transport.clone(), 5, 2, None);
        let packet = Packet { window: 0, body: PacketBody::KeyInput { code: 0x1E, flags: 0 } };
        let frame = encode_frame(&packet.encode(), &CapabilityFlags::new()).unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        session.on_frame(&frame, &tx).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event, ServerEvent::Key { key: crate::keymap::Key::Letter(b'A'), up: false, repeat: false });
    }
}
