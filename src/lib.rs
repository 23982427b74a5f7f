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


//! # cpc-rawmode
//!
//! A pure Rust implementation of the CraftOS-PC "raw mode" remote terminal
//! protocol, versions 1.0 and 1.1.
//!
//! The protocol carries an interactive terminal session — text and
//! pixel-graphics screen updates, keyboard/mouse input, palette and window
//! control, custom events, and (in v1.1) remote filesystem access — over an
//! arbitrary bidirectional message transport. This crate implements the
//! wire format and session state machines; it has no opinion on the
//! concrete transport medium, the host display, or the host filesystem.
//!
//! ## Features
//!
//! - **Textual framing**: `!CPC`/`!CPD` magic, hex length, base64 payload,
//!   hex CRC-32 checksum, with the v1.1 long-frame extension for payloads
//!   beyond 65535 bytes
//! - **10 packet kinds**: screen updates, key/mouse input, custom events,
//!   window info, server messages, handshake, and the three filesystem
//!   packet kinds
//! - **RLE repaint compression** for screen and pixel grids
//! - **IBT (Interchange Binary Table)** type-tagged value encoding for
//!   custom event parameters
//! - **Async I/O**: built on Tokio, with `Transport`/`Display`/`HostFS`
//!   trait boundaries so a caller supplies the actual socket, terminal
//!   renderer, and filesystem
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cpc_rawmode::server::ServerSession;
//! use cpc_rawmode::transport::Transport;
//!
//! # async fn run(transport: Arc<dyn Transport>) -> cpc_rawmode::error::Result<()> {
//! let mut session = ServerSession::new(transport, 51, 19, None);
//! session.send_handshake().await?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(32);
//! tokio::spawn(async move { while rx.recv().await.is_some() {} });
//! session.run(tx).await
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Transport bytes -> Framing -> Packet codec -> ServerTerminal / FSBridge   (server)
//! Transport bytes -> Framing -> Packet codec -> renderer / FSBridge        (client)
//! ```
//!
//! `Handshake` sits astride the codec: observing the peer's kind-6 packet
//! flips the capability flags that framing (long frames, binary checksum)
//! and filesystem dispatch consult for the rest of the session.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytecodec;
pub mod client;
pub mod display;
pub mod error;
pub mod events;
pub mod framing;
pub mod fsbridge;
pub mod handshake;
pub mod hostfs;
pub mod keymap;
pub mod protocol;
pub mod renderer;
pub mod server;
pub mod terminal;
pub mod transport;

// Re-exports
pub use client::ClientSession;
pub use display::Display;
pub use error::{ProtocolError, Result};
pub use events::{ClientEvent, HostEvent, ServerEvent};
pub use hostfs::HostFS;
pub use server::ServerSession;
pub use transport::Transport;

/// Highest protocol version this crate understands.
pub const PROTOCOL_VERSION: &str = "1.1";
