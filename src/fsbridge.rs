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

//! Filesystem request/response correlation.
//!
//! Server side: [`dispatch_request`] looks up the handler for a kind-7 op
//! against a [`HostFS`] and returns the kind-8/9 packets to send back.
//! Client side: [`FsCaller`] hands out request ids and matches kind-8/9
//! responses back to the call that is waiting on them.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{ProtocolError, Result};
use crate::hostfs::{Attributes, HostFS, OpenMode};
use crate::protocol::{
    fs_op, AttributesResult, BoolResult, FsRequest, FsResponseBody, Packet, PacketBody,
};

fn open_mode_from_bits(bits: u8) -> Option<OpenMode> {
    match bits & 0x07 {
        0 => Some(OpenMode::Read),
        1 => Some(OpenMode::Write),
        2 => Some(OpenMode::Read),
        3 => Some(OpenMode::Append),
        4 => Some(OpenMode::ReadBinary),
        5 => Some(OpenMode::WriteBinary),
        6 => Some(OpenMode::ReadBinary),
        7 => Some(OpenMode::AppendBinary),
        _ => None,
    }
}

/// Tracks one in-progress write-class file open on the server, from its
/// kind-7 open request until the matching kind-9 commit arrives.
#[derive(Debug, Clone)]
pub struct FileWriteBuffer {
    /// The request id the open and its eventual commit correlate on.
    pub req_id: u8,
    /// Path passed to the original open request.
    pub path: String,
    /// The open mode, as the low 3 bits of the original op byte.
    pub mode_bits: u8,
}

/// Server-side dispatch table state: open write handles awaiting their
/// commit, keyed by request id.
#[derive(Debug, Default)]
pub struct ServerFsState {
    write_buffers: HashMap<u8, FileWriteBuffer>,
}

impl ServerFsState {
    /// Creates empty dispatch state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one kind-7 request against `hostfs`, returning the reply
    /// packet(s) (kind-8, and for a read-class open also a kind-9 carrying
    /// the file body).
    pub async fn dispatch_request(
        &mut self,
        hostfs: &dyn HostFS,
        window: u8,
        req: &FsRequest,
    ) -> Result<Vec<Packet>> {
        if let Some(mode_bits) = (req.op & fs_op::OPEN_MASK != 0).then_some(req.op & 0x07) {
            return self.dispatch_open(hostfs, window, req, mode_bits).await;
        }
        let body = self.dispatch_plain(hostfs, req).await?;
        Ok(vec![Packet { window, body: PacketBody::FsResponse { op: req.op, req_id: req.req_id, body } }])
    }

    async fn dispatch_open(
        &mut self,
        hostfs: &dyn HostFS,
        window: u8,
        req: &FsRequest,
        mode_bits: u8,
    ) -> Result<Vec<Packet>> {
        let Some(mode) = open_mode_from_bits(mode_bits) else {
            return Err(ProtocolError::Fs(format!("unknown open mode bits {mode_bits}")));
        };
        if mode.is_write() {
            self.write_buffers.insert(req.req_id, FileWriteBuffer { req_id: req.req_id, path: req.path.clone(), mode_bits });
            Ok(vec![Packet {
                window,
                body: PacketBody::FsResponse { op: req.op, req_id: req.req_id, body: FsResponseBody::Void(String::new()) },
            }])
        } else {
            match hostfs.open(&req.path, mode).await {
                Ok(data) => Ok(vec![Packet {
                    window,
                    body: PacketBody::FsData { subtype: 0, req_id: req.req_id, data },
                }]),
                Err(_) => Ok(vec![Packet {
                    window,
                    body: PacketBody::FsData { subtype: 1, req_id: req.req_id, data: Vec::new() },
                }]),
            }
        }
    }

    /// Handles a kind-9 write commit for a pending write-class open,
    /// returning the kind-8 `op=17` confirmation.
    pub async fn commit_write(
        &mut self,
        hostfs: &dyn HostFS,
        window: u8,
        req_id: u8,
        data: &[u8],
    ) -> Result<Option<Packet>> {
        let Some(buf) = self.write_buffers.remove(&req_id) else {
            return Ok(None);
        };
        let Some(mode) = open_mode_from_bits(buf.mode_bits) else {
            return Ok(None);
        };
        let error = match hostfs.commit_write(&buf.path, mode, data).await {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        Ok(Some(Packet {
            window,
            body: PacketBody::FsResponse { op: OPEN_WRITE_CONFIRM, req_id, body: FsResponseBody::Void(error) },
        }))
    }

    async fn dispatch_plain(&self, hostfs: &dyn HostFS, req: &FsRequest) -> Result<FsResponseBody> {
        Ok(match req.op {
            fs_op::EXISTS => bool_body(hostfs.exists(&req.path).await),
            fs_op::IS_DIR => bool_body(hostfs.is_dir(&req.path).await),
            fs_op::IS_READ_ONLY => bool_body(hostfs.is_read_only(&req.path).await),
            fs_op::GET_SIZE => numeric_body(hostfs.get_size(&req.path).await),
            fs_op::GET_DRIVE => match hostfs.get_drive(&req.path).await {
                Ok(Some(drive)) => FsResponseBody::Strings(vec![drive]),
                _ => FsResponseBody::Strings(Vec::new()),
            },
            fs_op::GET_CAPACITY => numeric_body(hostfs.get_capacity(&req.path).await),
            fs_op::GET_FREE_SPACE => numeric_body(hostfs.get_free_space(&req.path).await),
            fs_op::LIST => FsResponseBody::Strings(hostfs.list(&req.path).await.unwrap_or_default()),
            fs_op::ATTRIBUTES => attributes_body(hostfs.attributes(&req.path).await),
            fs_op::FIND => FsResponseBody::Strings(hostfs.find(&req.path).await.unwrap_or_default()),
            fs_op::MAKE_DIR => void_body(hostfs.make_dir(&req.path).await),
            fs_op::DELETE => void_body(hostfs.delete(&req.path).await),
            fs_op::COPY => {
                let dst = req.path2.as_deref().unwrap_or_default();
                void_body(hostfs.copy(&req.path, dst).await)
            }
            fs_op::MOVE => {
                let dst = req.path2.as_deref().unwrap_or_default();
                void_body(hostfs.move_path(&req.path, dst).await)
            }
            other => return Err(ProtocolError::Fs(format!("unknown fs op {other}"))),
        })
    }
}

/// Kind-8 op value used for a write-class file-open's final commit
/// confirmation.
const OPEN_WRITE_CONFIRM: u8 = 17;

fn bool_body(result: Result<bool>) -> FsResponseBody {
    FsResponseBody::Boolean(match result {
        Ok(true) => BoolResult::True,
        Ok(false) => BoolResult::False,
        Err(_) => BoolResult::Error,
    })
}

fn numeric_body(result: Result<Option<u32>>) -> FsResponseBody {
    FsResponseBody::Numeric(match result {
        Ok(v) => v,
        Err(_) => None,
    })
}

fn void_body(result: Result<()>) -> FsResponseBody {
    match result {
        Ok(()) => FsResponseBody::Void(String::new()),
        Err(e) => FsResponseBody::Void(e.to_string()),
    }
}

fn attributes_body(result: Result<Option<Attributes>>) -> FsResponseBody {
    FsResponseBody::Attributes(match result {
        Ok(Some(a)) => AttributesResult::Ok {
            size: a.size,
            created: a.created,
            modified: a.modified,
            is_dir: a.is_dir,
            is_read_only: a.is_read_only,
        },
        Ok(None) => AttributesResult::NoEntry,
        Err(_) => AttributesResult::Error,
    })
}

/// Client-side request-id allocator and response correlator.
///
/// At most one call is pending per id; ids rotate `(id + 1) mod 256`. An
/// incoming response with no matching pending call is ignored (spec §5).
#[derive(Debug, Default)]
pub struct FsCaller {
    next_id: u8,
    pending: HashMap<u8, oneshot::Sender<Packet>>,
}

impl FsCaller {
    /// Creates an empty caller starting at request id 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next request id and registers a waiter for its
    /// response, returning both.
    pub fn begin_call(&mut self) -> (u8, oneshot::Receiver<Packet>) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        (id, rx)
    }

    /// Delivers an incoming kind-8/9 response to the waiting call, if any.
    /// Returns `true` if a call was matched and completed.
    pub fn complete(&mut self, req_id: u8, packet: Packet) -> bool {
        match self.pending.remove(&req_id) {
            Some(tx) => tx.send(packet).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostfs::Attributes;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemFs {
        files: Mutex<StdHashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl HostFS for MemFs {
        async fn exists(&self, path: &str) -> Result<bool> {
            Ok(self.files.lock().unwrap().contains_key(path))
        }
        async fn is_dir(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }
        async fn is_read_only(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get_size(&self, path: &str) -> Result<Option<u32>> {
            Ok(self.files.lock().unwrap().get(path).map(|b| b.len() as u32))
        }
        async fn get_drive(&self, _path: &str) -> Result<Option<String>> {
            Ok(Some("hdd".into()))
        }
        async fn get_capacity(&self, _path: &str) -> Result<Option<u32>> {
            Ok(Some(1_000_000))
        }
        async fn get_free_space(&self, _path: &str) -> Result<Option<u32>> {
            Ok(Some(500_000))
        }
        async fn list(&self, _path: &str) -> Result<Vec<String>> {
            Ok(self.files.lock().unwrap().keys().cloned().collect())
        }
        async fn attributes(&self, path: &str) -> Result<Option<Attributes>> {
            Ok(self.files.lock().unwrap().get(path).map(|b| Attributes {
                size: b.len() as u32,
                created: 0,
                modified: 0,
                is_dir: false,
                is_read_only: false,
            }))
        }
        async fn find(&self, _path: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn make_dir(&self, _path: &str) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, path: &str) -> Result<()> {
            self.files.lock().unwrap().remove(path);
            Ok(())
        }
        async fn copy(&self, src: &str, dst: &str) -> Result<()> {
            let data = self.files.lock().unwrap().get(src).cloned().unwrap_or_default();
            self.files.lock().unwrap().insert(dst.to_string(), data);
            Ok(())
        }
        async fn move_path(&self, src: &str, dst: &str) -> Result<()> {
            let data = self.files.lock().unwrap().remove(src).unwrap_or_default();
            self.files.lock().unwrap().insert(dst.to_string(), data);
            Ok(())
        }
        async fn open(&self, path: &str, _mode: OpenMode) -> Result<Vec<u8>> {
            Ok(self.files.lock().unwrap().get(path).cloned().unwrap_or_default())
        }
        async fn commit_write(&self, path: &str, _mode: OpenMode, data: &[u8]) -> Result<()> {
            self.files.lock().unwrap().insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn scenario_s5_exists_false_then_true() {
        let fs = MemFs::default();
        let mut state = ServerFsState::new();
        let req = FsRequest { op: fs_op::EXISTS, req_id: 0, path: "/x".into(), path2: None };
        let packets = state.dispatch_request(&fs, 0, &req).await.unwrap();
        assert_eq!(packets.len(), 1);
        match &packets[0].body {
            PacketBody::FsResponse { body: FsResponseBody::Boolean(BoolResult::False), .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
        fs.files.lock().unwrap().insert("/x".into(), vec![1]);
        let packets = state.dispatch_request(&fs, 0, &req).await.unwrap();
        match &packets[0].body {
            PacketBody::FsResponse { body: FsResponseBody::Boolean(BoolResult::True), .. } => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_open_then_commit_round_trip() {
        let fs = MemFs::default();
        let mut state = ServerFsState::new();
        let open_req = FsRequest { op: fs_op::OPEN_MASK | 0x01, req_id: 5, path: "/new.txt".into(), path2: None };
        let packets = state.dispatch_request(&fs, 0, &open_req).await.unwrap();
        match &packets[0].body {
            PacketBody::FsResponse { body: FsResponseBody::Void(err), .. } => assert!(err.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
        let confirm = state.commit_write(&fs, 0, 5, b"hello").await.unwrap().unwrap();
        match confirm.body {
            PacketBody::FsResponse { op, body: FsResponseBody::Void(err), .. } => {
                assert_eq!(op, OPEN_WRITE_CONFIRM);
                assert!(err.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fs.files.lock().unwrap().get("/new.txt").unwrap(), b"hello");
    }

    #[tokio::test]
    async fn read_open_emits_fsdata() {
        let fs = MemFs::default();
        fs.files.lock().unwrap().insert("/a".into(), vec![9, 9]);
        let mut state = ServerFsState::new();
        let req = FsRequest { op: fs_op::OPEN_MASK, req_id: 1, path: "/a".into(), path2: None };
        let packets = state.dispatch_request(&fs, 0, &req).await.unwrap();
        match &packets[0].body {
            PacketBody::FsData { subtype: 0, data, .. } => assert_eq!(data, &vec![9, 9]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fs_caller_ignores_response_with_unknown_id() {
        let mut caller = FsCaller::new();
        let (_id, _rx) = caller.begin_call();
        let packet = Packet { window: 0, body: PacketBody::FsResponse { op: 0, req_id: 200, body: FsResponseBody::Boolean(BoolResult::True) } };
        assert!(!caller.complete(200, packet));
    }

    #[tokio::test]
    async fn fs_caller_delivers_matching_response() {
        let mut caller = FsCaller::new();
        let (id, rx) = caller.begin_call();
        let packet = Packet { window: 0, body: PacketBody::FsResponse { op: 0, req_id: id, body: FsResponseBody::Boolean(BoolResult::True) } };
        assert!(caller.complete(id, packet.clone()));
        assert_eq!(rx.await.unwrap(), packet);
    }

    #[test]
    fn ids_rotate_modulo_256() {
        let mut caller = FsCaller::new();
        for _ in 0..256 {
            caller.begin_call();
        }
        let (id, _rx) = caller.begin_call();
        assert_eq!(id, 0);
    }
}
