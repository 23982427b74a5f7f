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

//! The message transport boundary both server and client sit on top of.
//!
//! The core never assumes a socket, a WebSocket, or any other concrete
//! medium; it only needs frame-at-a-time send/receive over an ordered,
//! reliable channel.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// One complete textual frame as produced by [`crate::framing::encode_frame`].
pub type Frame = String;

/// A message transport carrying complete frames in both directions.
///
/// Implementations are expected to preserve ordering and not to split or
/// coalesce frames; `receive` returns exactly one frame per call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one frame, returning once it has been handed to the medium.
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Waits for and returns the next frame, or `Ok(None)` at end-of-stream.
    ///
    /// `timeout` bounds the wait; `None` waits indefinitely.
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Frame>>;

    /// Closes the transport. The default implementation is a no-op for
    /// transports with no explicit teardown (e.g. an in-memory loopback).
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
