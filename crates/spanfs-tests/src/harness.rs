//! Test environment setup: in-process clusters on ephemeral ports.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use spanfs_common::{Path, Result, StorageRef};
use spanfs_naming::{CommandFanout, NamingConfig, NamingServer};
use spanfs_rpc::ServiceClient;
use spanfs_storage::{StorageConfig, StorageServer};
use tempfile::TempDir;

/// One storage server backed by a temporary directory.
pub struct StorageNode {
    /// The running server.
    pub server: Arc<StorageServer>,
    /// Its backing directory; removed on drop.
    pub dir: TempDir,
}

impl StorageNode {
    /// Address of the client-facing storage interface.
    pub fn storage_addr(&self) -> SocketAddr {
        self.server.storage_addr().expect("storage node running")
    }

    /// Address of the command interface.
    pub fn command_addr(&self) -> SocketAddr {
        self.server.command_addr().expect("storage node running")
    }

    /// True if the node's directory holds a file at `rel`.
    pub fn has_file(&self, rel: &str) -> bool {
        self.dir.path().join(rel).is_file()
    }

    /// Contents of the file at `rel`.
    pub fn read_file(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.dir.path().join(rel)).expect("file readable")
    }
}

/// A naming server plus any number of storage servers, all on
/// ephemeral localhost ports.
pub struct TestCluster {
    /// The naming server.
    pub naming: Arc<NamingServer>,
    /// Storage servers in start order.
    pub storages: Vec<StorageNode>,
}

impl TestCluster {
    /// Starts a naming server with the default replication threshold.
    pub async fn start() -> Self {
        Self::start_with_replicate_after(spanfs_naming::DEFAULT_REPLICATE_AFTER).await
    }

    /// Starts a naming server that mints a replica after `n` shared
    /// acquisitions of a single-replica file.
    pub async fn start_with_replicate_after(n: u32) -> Self {
        let config = NamingConfig {
            service_addr: "127.0.0.1:0".parse().unwrap(),
            registration_addr: "127.0.0.1:0".parse().unwrap(),
            replicate_after: n,
        };
        let naming = Arc::new(NamingServer::new(config));
        naming.start().await.expect("naming server starts");
        TestCluster {
            naming,
            storages: Vec::new(),
        }
    }

    /// Starts a storage server seeded with `files` (relative path,
    /// contents) and registers it. Returns its index in `storages`.
    pub async fn add_storage(&mut self, files: &[(&str, &[u8])]) -> usize {
        let dir = TempDir::new().expect("temp dir");
        for (rel, contents) in files {
            let full = dir.path().join(rel);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("seed parents");
            }
            std::fs::write(full, contents).expect("seed file");
        }

        let config = StorageConfig {
            root: dir.path().to_path_buf(),
            storage_addr: "127.0.0.1:0".parse().unwrap(),
            command_addr: "127.0.0.1:0".parse().unwrap(),
            advertise_ip: None,
        };
        let server = Arc::new(StorageServer::new(config));
        server
            .start(self.naming.registration_addr().expect("naming running"))
            .await
            .expect("storage server starts");

        self.storages.push(StorageNode { server, dir });
        self.storages.len() - 1
    }

    /// A typed client for the naming server's service interface.
    pub fn client(&self) -> ServiceClient {
        ServiceClient::new(self.naming.service_addr().expect("naming running"))
    }

    /// Shuts everything down.
    pub async fn shutdown(&self) {
        for node in &self.storages {
            node.server.stop().await;
        }
        self.naming.stop().await;
    }
}

/// A command fan-out that records every call instead of dialing a
/// storage server. Used by tree-level tests.
pub struct RecordingFanout {
    calls: Mutex<Vec<FanoutCall>>,
}

/// One recorded outbound command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FanoutCall {
    /// `create(target, path)`
    Create(StorageRef, Path),
    /// `delete(target, path)`
    Delete(StorageRef, Path),
    /// `copy(target, path, source)`
    Copy(StorageRef, Path, StorageRef),
}

impl RecordingFanout {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingFanout {
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<FanoutCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandFanout for RecordingFanout {
    async fn create(&self, target: &StorageRef, path: &Path) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(FanoutCall::Create(*target, path.clone()));
        Ok(true)
    }

    async fn delete(&self, target: &StorageRef, path: &Path) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(FanoutCall::Delete(*target, path.clone()));
        Ok(true)
    }

    async fn copy(&self, target: &StorageRef, path: &Path, source: &StorageRef) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push(FanoutCall::Copy(*target, path.clone(), *source));
        Ok(true)
    }
}
