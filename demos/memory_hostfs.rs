//! A `HostFS` implementation backed by an in-memory map, driving one
//! server session's filesystem feature end to end.
//!
//! Usage:
//!   cargo run --example memory_hostfs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpc_rawmode::error::{ProtocolError, Result};
use cpc_rawmode::hostfs::{Attributes, HostFS, OpenMode};
use cpc_rawmode::server::ServerSession;
use cpc_rawmode::transport::{Frame, Transport};
use tokio::sync::{mpsc, Mutex};

/// A filesystem that lives entirely in process memory, for demos and tests.
#[derive(Default)]
struct MemoryFs {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl HostFS for MemoryFs {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().await.contains_key(path))
    }
    async fn is_dir(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }
    async fn is_read_only(&self, _path: &str) -> Result<bool> {
        Ok(false)
    }
    async fn get_size(&self, path: &str) -> Result<Option<u32>> {
        Ok(self.files.lock().await.get(path).map(|b| b.len() as u32))
    }
    async fn get_drive(&self, _path: &str) -> Result<Option<String>> {
        Ok(Some("mem".to_string()))
    }
    async fn get_capacity(&self, _path: &str) -> Result<Option<u32>> {
        Ok(Some(16 * 1024 * 1024))
    }
    async fn get_free_space(&self, _path: &str) -> Result<Option<u32>> {
        let used: usize = self.files.lock().await.values().map(Vec::len).sum();
        Ok(Some(16 * 1024 * 1024 - used as u32))
    }
    async fn list(&self, _path: &str) -> Result<Vec<String>> {
        Ok(self.files.lock().await.keys().cloned().collect())
    }
    async fn attributes(&self, path: &str) -> Result<Option<Attributes>> {
        Ok(self.files.lock().await.get(path).map(|b| Attributes {
            size: b.len() as u32,
            created: 0,
            modified: 0,
            is_dir: false,
            is_read_only: false,
        }))
    }
    async fn find(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.files.lock().await.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
    async fn make_dir(&self, _path: &str) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().await.remove(path);
        Ok(())
    }
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let data = self.files.lock().await.get(src).cloned().ok_or(ProtocolError::Fs(format!("no such file: {src}")))?;
        self.files.lock().await.insert(dst.to_string(), data);
        Ok(())
    }
    async fn move_path(&self, src: &str, dst: &str) -> Result<()> {
        let data = self.files.lock().await.remove(src).ok_or(ProtocolError::Fs(format!("no such file: {src}")))?;
        self.files.lock().await.insert(dst.to_string(), data);
        Ok(())
    }
    async fn open(&self, path: &str, mode: OpenMode) -> Result<Vec<u8>> {
        if mode.is_write() {
            return Ok(Vec::new());
        }
        self.files.lock().await.get(path).cloned().ok_or(ProtocolError::Fs(format!("no such file: {path}")))
    }
    async fn commit_write(&self, path: &str, _mode: OpenMode, data: &[u8]) -> Result<()> {
        self.files.lock().await.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _frame: Frame) -> Result<()> {
        Ok(())
    }
    async fn receive(&self, _timeout: Option<Duration>) -> Result<Option<Frame>> {
        std::future::pending().await
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let fs = Arc::new(MemoryFs::default());
    fs.files.lock().await.insert("/autorun.lua".to_string(), b"print(\"hello\")".to_vec());

    let mut server = ServerSession::new(Arc::new(NullTransport), 51, 19, Some(fs.clone() as Arc<dyn HostFS>));
    server.send_handshake().await?;

    println!("autorun.lua exists: {}", fs.exists("/autorun.lua").await?);
    println!("autorun.lua size: {:?}", fs.get_size("/autorun.lua").await?);

    let (tx, mut rx) = mpsc::channel(8);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    tokio::select! {
        _ = server.run(tx) => {}
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    Ok(())
}
