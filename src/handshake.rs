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

//! Version/feature handshake (protocol kind 6) and the capability flags it
//! gates.
//!
//! Both endpoints send a kind-6 packet on attach advertising the feature
//! bits they support. Receiving the peer's kind-6 flips
//! [`CapabilityFlags::is_version_11`] on and enables, for each bit both
//! sides set, the matching capability for the rest of the session.

use std::sync::atomic::{AtomicBool, Ordering};

/// Feature bit: peer supports checksumming the pre-base64 binary payload
/// rather than the base64 text (long frames are gated by
/// [`CapabilityFlags::is_version_11`], not this bit).
pub const FEATURE_BINARY_CHECKSUM: u16 = 0x01;
/// Feature bit: peer supports filesystem request/response packets.
pub const FEATURE_FILESYSTEM: u16 = 0x02;
/// Feature bit: peer is asking for an immediate window-info (kind 4) reply.
pub const FEATURE_REQUEST_WINDOW_INFO: u16 = 0x04;

/// Capability flags shared between both endpoints of one [`Transport`]
/// (see `transport.rs`). Updates are monotone: once a bit turns on it never
/// turns back off, so a single writer can publish them without additional
/// synchronization beyond what `AtomicBool` gives for free.
///
/// [`Transport`]: crate::transport::Transport
#[derive(Debug, Default)]
pub struct CapabilityFlags {
    is_version_11: AtomicBool,
    binary_checksum: AtomicBool,
    filesystem: AtomicBool,
}

impl CapabilityFlags {
    /// Creates a flag set with nothing negotiated yet (v1.0 behavior).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any kind-6 packet has been observed from the peer.
    #[must_use]
    pub fn is_version_11(&self) -> bool {
        self.is_version_11.load(Ordering::Relaxed)
    }

    /// True if the CRC domain for new frames is the pre-base64 binary
    /// octets rather than the base64 text.
    #[must_use]
    pub fn binary_checksum(&self) -> bool {
        self.binary_checksum.load(Ordering::Relaxed)
    }

    /// True if kind 7/8/9 (filesystem) packets are recognized.
    #[must_use]
    pub fn filesystem(&self) -> bool {
        self.filesystem.load(Ordering::Relaxed)
    }

    fn mark_version_11(&self) {
        self.is_version_11.store(true, Ordering::Relaxed);
    }

    fn enable_binary_checksum(&self) {
        self.binary_checksum.store(true, Ordering::Relaxed);
    }

    fn enable_filesystem(&self) {
        self.filesystem.store(true, Ordering::Relaxed);
    }
}

/// Feature bits this endpoint is prepared to advertise, independent of what
/// the peer supports.
#[derive(Debug, Clone, Copy)]
pub struct LocalFeatures {
    /// Offer long-frame / binary-checksum support.
    pub binary_checksum: bool,
    /// Offer filesystem access (server: only if a `HostFS` is attached;
    /// client: only if an `FSBridge` caller exists).
    pub filesystem: bool,
    /// Ask the peer to send a window-info packet immediately.
    pub request_window_info: bool,
}

impl LocalFeatures {
    /// Packs these features into the kind-6 wire representation.
    #[must_use]
    pub fn to_bits(self) -> u16 {
        let mut bits = 0u16;
        if self.binary_checksum {
            bits |= FEATURE_BINARY_CHECKSUM;
        }
        if self.filesystem {
            bits |= FEATURE_FILESYSTEM;
        }
        if self.request_window_info {
            bits |= FEATURE_REQUEST_WINDOW_INFO;
        }
        bits
    }
}

/// Outcome of observing a peer's kind-6 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// Whether the peer asked for an immediate window-info reply.
    pub peer_requested_window_info: bool,
    /// The peer's raw feature bits, for computing a server reply via
    /// [`server_reply_bits`].
    pub peer_bits: u16,
}

/// Applies a peer's advertised feature bits to the shared `flags`, enabling
/// each capability both sides support, and returns what the caller should
/// do next (e.g. reply with a window-info packet).
pub fn observe_peer_bits(flags: &CapabilityFlags, local: LocalFeatures, peer_bits: u16) -> HandshakeOutcome {
    flags.mark_version_11();
    if local.binary_checksum && peer_bits & FEATURE_BINARY_CHECKSUM != 0 {
        flags.enable_binary_checksum();
    }
    if local.filesystem && peer_bits & FEATURE_FILESYSTEM != 0 {
        flags.enable_filesystem();
    }
    HandshakeOutcome {
        peer_requested_window_info: peer_bits & FEATURE_REQUEST_WINDOW_INFO != 0,
        peer_bits,
    }
}

/// Computes the bits the server replies with: the client's bits ANDed with
/// the server's allowed set. Per spec §4.3, the source always ORs the reply
/// with bit 0 (binary-checksum) and additionally with bit 1 (filesystem) if
/// filesystem access is not blocked locally.
#[must_use]
pub fn server_reply_bits(client_bits: u16, filesystem_allowed: bool) -> u16 {
    let allowed = FEATURE_BINARY_CHECKSUM | if filesystem_allowed { FEATURE_FILESYSTEM } else { 0 };
    (client_bits & allowed) | FEATURE_BINARY_CHECKSUM | if filesystem_allowed { FEATURE_FILESYSTEM } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_converges_to_intersection() {
        let server_flags = CapabilityFlags::new();
        let client_flags = CapabilityFlags::new();

        let server_local = LocalFeatures {
            binary_checksum: true,
            filesystem: true,
            request_window_info: false,
        };
        let client_local = LocalFeatures {
            binary_checksum: true,
            filesystem: false,
            request_window_info: false,
        };

        let server_bits = server_local.to_bits();
        let client_bits = client_local.to_bits();

        observe_peer_bits(&client_flags, client_local, server_bits);
        observe_peer_bits(&server_flags, server_local, client_bits);

        assert!(client_flags.is_version_11());
        assert!(server_flags.is_version_11());
        assert!(client_flags.binary_checksum());
        assert!(server_flags.binary_checksum());
        // Client never offered filesystem, so neither side enables it.
        assert!(!client_flags.filesystem());
        assert!(!server_flags.filesystem());
    }

    #[test]
    fn server_reply_bits_matches_scenario_s4() {
        // S4: client sends 0x07 (binary_checksum|filesystem|request_info),
        // server (filesystem permitted) replies 0x03.
        assert_eq!(server_reply_bits(0x07, true), 0x03);
    }

    #[test]
    fn server_reply_bits_without_filesystem() {
        assert_eq!(server_reply_bits(0x07, false), FEATURE_BINARY_CHECKSUM);
    }

    #[test]
    fn request_window_info_bit_is_observed() {
        let flags = CapabilityFlags::new();
        let local = LocalFeatures {
            binary_checksum: false,
            filesystem: false,
            request_window_info: false,
        };
        let outcome = observe_peer_bits(&flags, local, FEATURE_REQUEST_WINDOW_INFO);
        assert!(outcome.peer_requested_window_info);
    }
}
