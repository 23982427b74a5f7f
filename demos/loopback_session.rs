//! In-memory server/client session over a channel-backed Transport.
//!
//! This example wires a `ServerSession` and a `ClientSession` together
//! without any real socket, to exercise the full handshake, repaint, and
//! host-input path in one process.
//!
//! Usage:
//!   cargo run --example loopback_session

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpc_rawmode::client::ClientSession;
use cpc_rawmode::display::{Display, DisplaySize, MessageKind};
use cpc_rawmode::error::Result;
use cpc_rawmode::events::HostEvent;
use cpc_rawmode::keymap::Key;
use cpc_rawmode::server::ServerSession;
use cpc_rawmode::transport::{Frame, Transport};
use tokio::sync::{mpsc, Mutex};

/// One direction of an in-memory loopback pipe.
struct ChannelTransport {
    tx: mpsc::UnboundedSender<Frame>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).map_err(|_| cpc_rawmode::error::ProtocolError::ConnectionClosed)
    }

    async fn receive(&self, _timeout: Option<Duration>) -> Result<Option<Frame>> {
        Ok(self.rx.lock().await.recv().await)
    }
}

fn loopback_pair() -> (ChannelTransport, ChannelTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport { tx: a_tx, rx: Mutex::new(b_rx) },
        ChannelTransport { tx: b_tx, rx: Mutex::new(a_rx) },
    )
}

/// A `Display` that prints every draw call to stdout.
struct StdoutDisplay;

#[async_trait]
impl Display for StdoutDisplay {
    async fn set_mode(&self, mode: u8) -> Result<()> {
        println!("[client] mode -> {mode}");
        Ok(())
    }
    async fn set_cursor_pos(&self, x: u16, y: u16) -> Result<()> {
        println!("[client] cursor -> ({x}, {y})");
        Ok(())
    }
    async fn set_cursor_blink(&self, _blink: bool) -> Result<()> {
        Ok(())
    }
    async fn set_visible(&self, visible: bool) -> Result<()> {
        println!("[client] visible = {visible}");
        Ok(())
    }
    async fn set_palette_entry(&self, _index: u8, _rgb: (u8, u8, u8)) -> Result<()> {
        Ok(())
    }
    async fn blit_char(&self, x: u16, y: u16, ch: u8, _fg: u8, _bg: u8) -> Result<()> {
        print!("{}", ch as char);
        if x == 80 {
            println!();
        }
        let _ = y;
        Ok(())
    }
    async fn blit_pixel_row(&self, _x: u32, _y: u32, _indices: &[u8]) -> Result<()> {
        Ok(())
    }
    async fn size(&self) -> Result<DisplaySize> {
        Ok(DisplaySize { cell_width: 51, cell_height: 19, pixel_width: 306, pixel_height: 171 })
    }
    async fn show_message(&self, kind: MessageKind, title: &str, body: &str) -> Result<()> {
        println!("[client] message {kind:?} {title}: {body}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (server_side, client_side) = loopback_pair();
    let mut server = ServerSession::new(Arc::new(server_side), 51, 19, None);
    let mut client = ClientSession::new(Arc::new(client_side), Arc::new(StdoutDisplay), false);

    server.send_handshake().await?;
    client.send_handshake().await?;

    server.write(1, 1, "hello, craftos", &vec![0x0Fu8; 14])?;
    server.flush().await?;

    client.queue_event(&HostEvent::Key { key: Key::Enter, up: false, repeat: false }).await?;

    let (server_tx, mut server_rx) = mpsc::channel(8);
    let (client_tx, mut client_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        while let Some(event) = server_rx.recv().await {
            println!("[server] event: {event:?}");
        }
    });
    tokio::spawn(async move {
        while let Some(event) = client_rx.recv().await {
            println!("[client] event: {event:?}");
        }
    });

    tokio::select! {
        _ = server.run(server_tx) => {}
        _ = client.run(client_tx) => {}
        _ = tokio::time::sleep(Duration::from_millis(200)) => {}
    }

    Ok(())
}
