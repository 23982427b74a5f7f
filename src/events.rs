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

//! The local event model produced and consumed at the two ends of a
//! session: what a server's input pump delivers to its application, and
//! what a client queues toward the server or surfaces to its host.

use crate::bytecodec::IbtValue;
use crate::display::MessageKind;
use crate::keymap::Key;

/// A host-side input event the client serializes into a wire packet via
/// [`crate::client::ClientSession::queue_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A named (non-character) key transition.
    Key {
        /// Which key.
        key: Key,
        /// `true` for key-up, `false` for key-down.
        up: bool,
        /// Whether this is an auto-repeat of a held key.
        repeat: bool,
    },
    /// A character was typed (composed, not a raw scancode).
    Char(char),
    /// Mouse button pressed.
    MouseClick { button: u8, x: u32, y: u32 },
    /// Mouse button released.
    MouseUp { button: u8, x: u32, y: u32 },
    /// Mouse wheel moved; `direction` is -1 (up) or +1 (down).
    MouseScroll { direction: i8, x: u32, y: u32 },
    /// Mouse moved while a button was held.
    MouseDrag { button: u8, x: u32, y: u32 },
    /// An application-defined event with positional parameters.
    Custom { name: String, params: Vec<IbtValue> },
}

/// An event delivered to a server application by
/// [`crate::terminal::ServerTerminal`]'s input pump.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Mirrors [`HostEvent::Key`], originated by the remote client.
    Key {
        /// Which key.
        key: Key,
        /// `true` for key-up, `false` for key-down.
        up: bool,
        /// Whether this is an auto-repeat of a held key.
        repeat: bool,
    },
    /// Mirrors [`HostEvent::Char`].
    Char(char),
    /// Mirrors the click/up/scroll/drag mouse events.
    Mouse(MouseEvent),
    /// Mirrors [`HostEvent::Custom`], decoded from a kind-3 packet.
    Custom {
        /// Event name.
        name: String,
        /// Positional parameters.
        params: Vec<IbtValue>,
    },
    /// The client requested the window be torn down (kind-4, flags=2).
    WindowClosed,
}

/// One mouse transition, shared by [`HostEvent`] and [`ServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEvent {
    /// Button pressed.
    Click { button: u8, x: u32, y: u32 },
    /// Button released.
    Up { button: u8, x: u32, y: u32 },
    /// Wheel moved; `direction` is -1 (up) or +1 (down).
    Scroll { direction: i8, x: u32, y: u32 },
    /// Moved while a button was held.
    Drag { button: u8, x: u32, y: u32 },
}

/// An event surfaced to the client's host application by
/// [`crate::client::ClientSession::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The server closed the window (scenario S6); the host should tear
    /// down its `Transport`.
    WindowClosed,
    /// A kind-5 `ServerMessage` that the attached `Display` did not (or
    /// could not) show directly.
    Message {
        /// Severity.
        kind: MessageKind,
        /// Dialog title.
        title: String,
        /// Dialog body.
        body: String,
    },
}
