//! The storage server.
//!
//! A storage server exposes one directory of its local filesystem: path
//! `/a/b` maps to `root/a/b`. Clients read and write bytes through the
//! `Storage` interface; the naming server creates, deletes, and copies
//! files through the `Command` interface.
//!
//! On startup the server walks its root, registers every regular file
//! with the naming server, and deletes the duplicates the naming server
//! reports back before accepting traffic.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use spanfs_common::{FsError, Path, Result};
use spanfs_rpc::{Listener, RegistrationClient, StorageClient};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::dispatch::{CommandDispatch, StorageDispatch};

/// Chunk size for `copy` transfers from another storage server.
const COPY_CHUNK_SIZE: u64 = 64 * 1024;

/// Storage server configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Local directory served by this process.
    pub root: PathBuf,
    /// Bind address of the client-facing storage interface; port 0 lets
    /// the system choose.
    pub storage_addr: SocketAddr,
    /// Bind address of the command interface; port 0 lets the system
    /// choose.
    pub command_addr: SocketAddr,
    /// Externally routable address to advertise in registration, when
    /// the bind address is not reachable from other hosts.
    pub advertise_ip: Option<IpAddr>,
}

impl StorageConfig {
    /// Configuration serving `root` on system-chosen local ports.
    pub fn new(root: PathBuf) -> Self {
        StorageConfig {
            root,
            storage_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            command_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            advertise_ip: None,
        }
    }
}

/// Observer of storage server shutdown. Defaults do nothing.
pub trait ServerHooks: Send + Sync + 'static {
    /// Called once the server has completely shut down, with the fatal
    /// error if the shutdown was not requested.
    fn stopped(&self, _cause: Option<&FsError>) {}
}

struct NoServerHooks;

impl ServerHooks for NoServerHooks {}

enum Lifecycle {
    Idle,
    Starting,
    Running {
        storage: Arc<Listener>,
        command: Arc<Listener>,
    },
    Stopped,
}

/// A process serving one directory tree of local files.
pub struct StorageServer {
    config: StorageConfig,
    hooks: Arc<dyn ServerHooks>,
    lifecycle: Mutex<Lifecycle>,
}

impl StorageServer {
    /// Creates an unstarted storage server.
    pub fn new(config: StorageConfig) -> Self {
        Self::with_hooks(config, Arc::new(NoServerHooks))
    }

    /// Creates a server with injected shutdown hooks.
    pub fn with_hooks(config: StorageConfig, hooks: Arc<dyn ServerHooks>) -> Self {
        StorageServer {
            config,
            hooks,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Starts both listeners and registers with the naming server at
    /// `naming_addr`. Files the naming server reports as duplicates are
    /// deleted locally before this returns. Single-shot.
    pub async fn start(self: &Arc<Self>, naming_addr: SocketAddr) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle poisoned");
            match *lifecycle {
                Lifecycle::Idle => *lifecycle = Lifecycle::Starting,
                Lifecycle::Starting | Lifecycle::Running { .. } => {
                    return Err(FsError::InvalidState(
                        "storage server already started".to_string(),
                    ))
                }
                Lifecycle::Stopped => {
                    return Err(FsError::InvalidState(
                        "storage server is not restartable".to_string(),
                    ))
                }
            }
        }

        match self.start_inner(naming_addr).await {
            Ok(listeners) => {
                let (storage, command) = listeners;
                *self.lifecycle.lock().expect("lifecycle poisoned") = Lifecycle::Running {
                    storage,
                    command,
                };
                Ok(())
            }
            Err(e) => {
                *self.lifecycle.lock().expect("lifecycle poisoned") = Lifecycle::Idle;
                Err(e)
            }
        }
    }

    async fn start_inner(
        self: &Arc<Self>,
        naming_addr: SocketAddr,
    ) -> Result<(Arc<Listener>, Arc<Listener>)> {
        let meta = std::fs::metadata(&self.config.root)
            .map_err(|_| FsError::not_found(format!("root {:?} does not exist", self.config.root)))?;
        if !meta.is_dir() {
            return Err(FsError::invalid(format!(
                "root {:?} is not a directory",
                self.config.root
            )));
        }

        let storage = Arc::new(Listener::new(
            Arc::new(StorageDispatch::new(self.clone())),
            Some(self.config.storage_addr),
        ));
        let command = Arc::new(Listener::new(
            Arc::new(CommandDispatch::new(self.clone())),
            Some(self.config.command_addr),
        ));
        storage
            .start()
            .await
            .map_err(|e| FsError::Remote(e.to_string()))?;
        if let Err(e) = command.start().await {
            storage.stop().await;
            return Err(FsError::Remote(e.to_string()));
        }

        let storage_addr = self.advertised(&storage)?;
        let command_addr = self.advertised(&command)?;
        let files = self.enumerate_files()?;
        info!(
            storage = %storage_addr,
            command = %command_addr,
            files = files.len(),
            "registering with naming server"
        );

        let duplicates = match RegistrationClient::new(naming_addr)
            .register(storage_addr, command_addr, files)
            .await
        {
            Ok(duplicates) => duplicates,
            Err(e) => {
                storage.stop().await;
                command.stop().await;
                return Err(e);
            }
        };

        for path in &duplicates {
            debug!(path = %path, "deleting duplicate claimed by an earlier server");
            self.delete_local(path);
        }
        info!(duplicates = duplicates.len(), "storage server started");
        Ok((storage, command))
    }

    fn advertised(&self, listener: &Listener) -> Result<SocketAddr> {
        let mut addr = listener
            .local_addr()
            .map_err(|e| FsError::Remote(e.to_string()))?;
        if let Some(ip) = self.config.advertise_ip {
            addr.set_ip(ip);
        }
        Ok(addr)
    }

    /// Stops both listeners and fires the `stopped` hook. The server
    /// cannot be started again.
    pub async fn stop(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle poisoned");
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        if let Lifecycle::Running { storage, command } = previous {
            storage.stop().await;
            command.stop().await;
            info!("storage server stopped");
            self.hooks.stopped(None);
        }
    }

    /// Address of the client-facing storage interface.
    pub fn storage_addr(&self) -> Result<SocketAddr> {
        match &*self.lifecycle.lock().expect("lifecycle poisoned") {
            Lifecycle::Running { storage, .. } => storage
                .local_addr()
                .map_err(|e| FsError::Remote(e.to_string())),
            _ => Err(FsError::InvalidState(
                "storage server not running".to_string(),
            )),
        }
    }

    /// Address of the command interface.
    pub fn command_addr(&self) -> Result<SocketAddr> {
        match &*self.lifecycle.lock().expect("lifecycle poisoned") {
            Lifecycle::Running { command, .. } => command
                .local_addr()
                .map_err(|e| FsError::Remote(e.to_string())),
            _ => Err(FsError::InvalidState(
                "storage server not running".to_string(),
            )),
        }
    }

    fn local_path(&self, path: &Path) -> PathBuf {
        path.to_local(&self.config.root)
    }

    /// Metadata of an existing regular file, or `NotFound`.
    async fn file_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
        let local = self.local_path(path);
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|_| FsError::not_found(path.to_string()))?;
        if meta.is_dir() {
            return Err(FsError::not_found(format!("{} is a directory", path)));
        }
        Ok(meta)
    }

    // -- Storage operations ------------------------------------------------

    /// Size in bytes of the file at `path`.
    pub async fn size(&self, path: &Path) -> Result<u64> {
        Ok(self.file_metadata(path).await?.len())
    }

    /// Reads `length` bytes at `offset`. The range must lie within the
    /// file.
    pub async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>> {
        let meta = self.file_metadata(path).await?;
        let end = offset
            .checked_add(length as u64)
            .ok_or_else(|| FsError::invalid("offset plus length overflows"))?;
        if end > meta.len() {
            return Err(FsError::invalid(format!(
                "read of {} bytes at offset {} past end of {} ({} bytes)",
                length,
                offset,
                path,
                meta.len()
            )));
        }

        let mut file = tokio::fs::File::open(self.local_path(path)).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data).await?;
        Ok(data)
    }

    /// Writes `data` at `offset`, extending the file as needed.
    pub async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<()> {
        self.file_metadata(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(self.local_path(path))
            .await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    // -- Command operations ------------------------------------------------

    /// Creates an empty file, making parent directories as needed.
    /// False if the file exists or a parent cannot be created.
    pub fn create(&self, path: &Path) -> bool {
        if path.is_root() {
            return false;
        }
        let local = self.local_path(path);
        if let Some(parent) = local.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path, error = %e, "cannot create parent directories");
                return false;
            }
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&local)
        {
            Ok(_) => true,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::AlreadyExists {
                    warn!(path = %path, error = %e, "create failed");
                }
                false
            }
        }
    }

    /// Deletes a file or directory tree and prunes emptied parent
    /// directories up to, but not including, the root.
    pub fn delete_local(&self, path: &Path) -> bool {
        if path.is_root() {
            return false;
        }
        let local = self.local_path(path);
        let removed = if local.is_dir() {
            std::fs::remove_dir_all(&local).is_ok()
        } else if local.exists() {
            std::fs::remove_file(&local).is_ok()
        } else {
            false
        };
        if removed {
            self.prune_empty_parents(path);
        }
        removed
    }

    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            let local = dir.to_local(&self.config.root);
            match std::fs::read_dir(&local) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(_) => break,
            }
            if std::fs::remove_dir(&local).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    /// Copies `path` from the storage interface at `source`, fetching in
    /// bounded chunks and replacing any local content.
    pub async fn copy(&self, path: &Path, source: SocketAddr) -> Result<bool> {
        let client = StorageClient::new(source);
        let total = client.size(path).await?;

        let local = self.local_path(path);
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&local)
            .await?;

        let mut offset = 0u64;
        while offset < total {
            let length = (total - offset).min(COPY_CHUNK_SIZE) as u32;
            let chunk = client.read(path, offset, length).await?;
            file.write_all(&chunk).await?;
            offset += chunk.len() as u64;
        }
        file.flush().await?;
        debug!(path = %path, bytes = total, source = %source, "copied file");
        Ok(true)
    }

    fn enumerate_files(&self) -> Result<Vec<Path>> {
        let mut files = Vec::new();
        let mut stack = vec![(self.config.root.clone(), Path::root())];
        while let Some((dir, rel)) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(raw) => {
                        warn!(name = ?raw, "skipping non-UTF-8 file name");
                        continue;
                    }
                };
                let child = match rel.child(&name) {
                    Ok(child) => child,
                    Err(_) => {
                        warn!(name = %name, "skipping name with reserved characters");
                        continue;
                    }
                };
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    stack.push((entry.path(), child));
                } else if file_type.is_file() {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }
}
