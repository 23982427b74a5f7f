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

//! The host display [`crate::renderer::apply_packet`] draws to, and that a
//! server may optionally mirror to as a "parent" surface.

use async_trait::async_trait;

use crate::error::Result;

/// Severity of a [`Display::show_message`] dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Corresponds to `ServerMessage` flag bit 0x10.
    Error,
    /// Corresponds to `ServerMessage` flag bit 0x20.
    Warning,
    /// Corresponds to `ServerMessage` flag bit 0x40.
    Info,
}

/// Cell-grid size in characters and the corresponding pixel-grid size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    /// Width in character cells.
    pub cell_width: u16,
    /// Height in character cells.
    pub cell_height: u16,
    /// Width in pixels (`cell_width * 6`).
    pub pixel_width: u32,
    /// Height in pixels (`cell_height * 9`).
    pub pixel_height: u32,
}

/// The drawing surface driven by [`crate::renderer::apply_packet`], or
/// mirrored to by a [`crate::terminal::ServerTerminal`]'s optional parent.
#[async_trait]
pub trait Display: Send + Sync {
    /// Switches rendering mode: 0 text, 1 pixel-16, 2 pixel-256.
    async fn set_mode(&self, mode: u8) -> Result<()>;

    /// Moves the cursor to a 1-indexed `(x, y)` cell position.
    async fn set_cursor_pos(&self, x: u16, y: u16) -> Result<()>;

    /// Sets cursor blink state.
    async fn set_cursor_blink(&self, blink: bool) -> Result<()>;

    /// Shows or hides the display output entirely (used to batch a repaint).
    async fn set_visible(&self, visible: bool) -> Result<()>;

    /// Sets one palette entry, 0-indexed, to an `(r, g, b)` triplet.
    async fn set_palette_entry(&self, index: u8, rgb: (u8, u8, u8)) -> Result<()>;

    /// Draws one character cell with the given foreground/background
    /// palette indices.
    async fn blit_char(&self, x: u16, y: u16, ch: u8, fg: u8, bg: u8) -> Result<()>;

    /// Draws one row of pixel-grid palette indices starting at `(x, y)`.
    async fn blit_pixel_row(&self, x: u32, y: u32, indices: &[u8]) -> Result<()>;

    /// Returns the current cell and pixel dimensions.
    async fn size(&self) -> Result<DisplaySize>;

    /// Sets the window title, if the host surface supports one.
    async fn set_title(&self, _title: &str) -> Result<()> {
        Ok(())
    }

    /// Surfaces a `ServerMessage` dialog, if the host surface supports one.
    async fn show_message(&self, _kind: MessageKind, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    /// Notified when a kind-4 packet references a window id this renderer
    /// does not recognize.
    async fn window_notification(&self, _window: u8) -> Result<()> {
        Ok(())
    }
}
