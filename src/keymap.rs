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

//! Bidirectional mapping between the wire's 8-bit scancode space (kind-1
//! `KeyInput`, non-character events) and a canonical named key.
//!
//! Scancodes follow the historical PC/AT set-1 layout, the convention the
//! wire format inherits; they are a closed, stable enumeration independent
//! of host keyboard-layout concerns (those belong to the `Display`/host
//! input side, not this crate).

/// A canonical, layout-independent key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Key {
    /// `A`..`Z`.
    Letter(u8),
    /// Top-row digits `0`..`9` (not the numpad).
    Digit(u8),
    /// `F1`..`F12`.
    Function(u8),
    Escape,
    Tab,
    CapsLock,
    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    Backspace,
    Enter,
    Space,
    Minus,
    Equals,
    LeftBracket,
    RightBracket,
    Semicolon,
    Apostrophe,
    Grave,
    Backslash,
    Comma,
    Period,
    Slash,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
}

const SCANCODE_TABLE: &[(u8, Key)] = &[
    (0x01, Key::Escape),
    (0x02, Key::Digit(1)),
    (0x03, Key::Digit(2)),
    (0x04, Key::Digit(3)),
    (0x05, Key::Digit(4)),
    (0x06, Key::Digit(5)),
    (0x07, Key::Digit(6)),
    (0x08, Key::Digit(7)),
    (0x09, Key::Digit(8)),
    (0x0A, Key::Digit(9)),
    (0x0B, Key::Digit(0)),
    (0x0C, Key::Minus),
    (0x0D, Key::Equals),
    (0x0E, Key::Backspace),
    (0x0F, Key::Tab),
    (0x10, Key::Letter(b'Q')),
    (0x11, Key::Letter(b'W')),
    (0x12, Key::Letter(b'E')),
    (0x13, Key::Letter(b'R')),
    (0x14, Key::Letter(b'T')),
    (0x15, Key::Letter(b'Y')),
    (0x16, Key::Letter(b'U')),
    (0x17, Key::Letter(b'I')),
    (0x18, Key::Letter(b'O')),
    (0x19, Key::Letter(b'P')),
    (0x1A, Key::LeftBracket),
    (0x1B, Key::RightBracket),
    (0x1C, Key::Enter),
    (0x1D, Key::LeftControl),
    (0x1E, Key::Letter(b'A')),
    (0x1F, Key::Letter(b'S')),
    (0x20, Key::Letter(b'D')),
    (0x21, Key::Letter(b'F')),
    (0x22, Key::Letter(b'G')),
    (0x23, Key::Letter(b'H')),
    (0x24, Key::Letter(b'J')),
    (0x25, Key::Letter(b'K')),
    (0x26, Key::Letter(b'L')),
    (0x27, Key::Semicolon),
    (0x28, Key::Apostrophe),
    (0x29, Key::Grave),
    (0x2A, Key::LeftShift),
    (0x2B, Key::Backslash),
    (0x2C, Key::Letter(b'Z')),
    (0x2D, Key::Letter(b'X')),
    (0x2E, Key::Letter(b'C')),
    (0x2F, Key::Letter(b'V')),
    (0x30, Key::Letter(b'B')),
    (0x31, Key::Letter(b'N')),
    (0x32, Key::Letter(b'M')),
    (0x33, Key::Comma),
    (0x34, Key::Period),
    (0x35, Key::Slash),
    (0x36, Key::RightShift),
    (0x38, Key::LeftAlt),
    (0x39, Key::Space),
    (0x3A, Key::CapsLock),
    (0x3B, Key::Function(1)),
    (0x3C, Key::Function(2)),
    (0x3D, Key::Function(3)),
    (0x3E, Key::Function(4)),
    (0x3F, Key::Function(5)),
    (0x40, Key::Function(6)),
    (0x41, Key::Function(7)),
    (0x42, Key::Function(8)),
    (0x43, Key::Function(9)),
    (0x44, Key::Function(10)),
    (0x45, Key::NumLock),
    (0x46, Key::ScrollLock),
    (0x47, Key::Home),
    (0x48, Key::Up),
    (0x49, Key::PageUp),
    (0x4B, Key::Left),
    (0x4D, Key::Right),
    (0x4F, Key::End),
    (0x50, Key::Down),
    (0x51, Key::PageDown),
    (0x52, Key::Insert),
    (0x53, Key::Delete),
    (0x57, Key::Function(11)),
    (0x58, Key::Function(12)),
    (0x9D, Key::RightControl),
    (0xB8, Key::RightAlt),
    (0xE1, Key::Pause),
    (0xE2, Key::PrintScreen),
];

/// Looks up the canonical key for a wire scancode, if recognized.
#[must_use]
pub fn key_for_scancode(code: u8) -> Option<Key> {
    SCANCODE_TABLE.iter().find(|&&(c, _)| c == code).map(|&(_, k)| k)
}

/// Looks up the wire scancode for a canonical key, if representable.
#[must_use]
pub fn scancode_for_key(key: Key) -> Option<u8> {
    SCANCODE_TABLE.iter().find(|&&(_, k)| k == key).map(|&(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_a_round_trips_to_scancode_30() {
        assert_eq!(scancode_for_key(Key::Letter(b'A')), Some(0x1E));
        assert_eq!(key_for_scancode(0x1E), Some(Key::Letter(b'A')));
    }

    #[test]
    fn every_table_entry_round_trips() {
        for &(code, key) in SCANCODE_TABLE {
            assert_eq!(key_for_scancode(code), Some(key));
            assert_eq!(scancode_for_key(key), Some(code));
        }
    }

    #[test]
    fn unknown_scancode_is_none() {
        assert_eq!(key_for_scancode(0xFF), None);
    }
}
