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

//! The host filesystem a server optionally exposes to clients over
//! [`crate::fsbridge`].

use async_trait::async_trait;

use crate::error::Result;

/// One of the eight file-open modes from [`crate::protocol::OPEN_MODES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `"r"` — read, text.
    Read,
    /// `"w"` — write (truncate), text.
    Write,
    /// `"a"` — append, text.
    Append,
    /// `"rb"` — read, binary.
    ReadBinary,
    /// `"wb"` — write (truncate), binary.
    WriteBinary,
    /// `"ab"` — append, binary.
    AppendBinary,
}

impl OpenMode {
    /// True for the write-class modes (`w`, `a`, `wb`, `ab`).
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::Append | OpenMode::WriteBinary | OpenMode::AppendBinary)
    }
}

/// Attributes of one filesystem entry, as reported by `attributes`.
///
/// Fields the host cannot determine default to `0`/`false` per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    /// Size in bytes.
    pub size: u32,
    /// Creation timestamp (host-defined epoch).
    pub created: u64,
    /// Last-modified timestamp (host-defined epoch).
    pub modified: u64,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Whether the entry is read-only.
    pub is_read_only: bool,
}

/// The host filesystem surface a server exposes through [`crate::fsbridge`].
///
/// Every method returns `Err` only for a transport/host-level failure; a
/// missing path or other ordinary filesystem condition is expressed in the
/// method's own `Ok` return shape, since [`crate::fsbridge`] is responsible
/// for translating those into the wire's error sentinels.
#[async_trait]
pub trait HostFS: Send + Sync {
    /// Whether `path` exists.
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Whether `path` is a directory.
    async fn is_dir(&self, path: &str) -> Result<bool>;
    /// Whether `path` is read-only.
    async fn is_read_only(&self, path: &str) -> Result<bool>;
    /// Size of `path` in bytes, if it exists.
    async fn get_size(&self, path: &str) -> Result<Option<u32>>;
    /// Drive/mount identifier that owns `path`.
    async fn get_drive(&self, path: &str) -> Result<Option<String>>;
    /// Total capacity of the drive owning `path`, in bytes.
    async fn get_capacity(&self, path: &str) -> Result<Option<u32>>;
    /// Free space on the drive owning `path`, in bytes.
    async fn get_free_space(&self, path: &str) -> Result<Option<u32>>;
    /// Directory listing (entry names, not full paths) for `path`.
    async fn list(&self, path: &str) -> Result<Vec<String>>;
    /// Attributes of `path`, or `None` if it does not exist.
    async fn attributes(&self, path: &str) -> Result<Option<Attributes>>;
    /// Glob-style search rooted at `path`.
    async fn find(&self, path: &str) -> Result<Vec<String>>;
    /// Creates `path` and any missing parent directories.
    async fn make_dir(&self, path: &str) -> Result<()>;
    /// Deletes `path` (file or directory, recursively).
    async fn delete(&self, path: &str) -> Result<()>;
    /// Copies `src` to `dst`.
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;
    /// Moves/renames `src` to `dst`.
    async fn move_path(&self, src: &str, dst: &str) -> Result<()>;
    /// Opens `path` in `mode`, returning the file's current bytes for a
    /// read-class mode or an empty buffer ready to accumulate writes for a
    /// write-class mode.
    async fn open(&self, path: &str, mode: OpenMode) -> Result<Vec<u8>>;
    /// Commits `data` to `path` opened in a write-class mode.
    async fn commit_write(&self, path: &str, mode: OpenMode, data: &[u8]) -> Result<()>;
}
