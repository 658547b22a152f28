//! The naming server.
//!
//! One process owns the directory tree and exposes it through two remote
//! interfaces: `Service` for clients and `Registration` for storage
//! servers, each on its own listener. Well-known default ports let
//! clients construct proxies from nothing but a hostname.
//!
//! The server is single-shot: `start` may succeed once, `stop` tears
//! both listeners down, and a stopped server is not restartable.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use spanfs_common::{FsError, Path, Result, StorageRef};
use spanfs_rpc::Listener;
use tracing::info;

use crate::dispatch::{RegistrationDispatch, ServiceDispatch};
use crate::fanout::{CommandFanout, RpcCommandFanout};
use crate::registry::Registry;
use crate::tree::{HashTree, DEFAULT_REPLICATE_AFTER};

/// Well-known port of the client-facing `Service` interface.
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the storage-server-facing `Registration` interface.
pub const REGISTRATION_PORT: u16 = 6001;

/// Naming server configuration.
#[derive(Clone, Debug)]
pub struct NamingConfig {
    /// Bind address of the `Service` listener.
    pub service_addr: SocketAddr,
    /// Bind address of the `Registration` listener.
    pub registration_addr: SocketAddr,
    /// Shared acquisitions of a single-replica file before a new
    /// replica is minted.
    pub replicate_after: u32,
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            service_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, SERVICE_PORT)),
            registration_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, REGISTRATION_PORT)),
            replicate_after: DEFAULT_REPLICATE_AFTER,
        }
    }
}

/// Observer of naming server shutdown. Defaults do nothing.
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
        service: Arc<Listener>,
        registration: Arc<Listener>,
    },
    Stopped,
}

/// The singleton process owning the logical directory tree.
pub struct NamingServer {
    tree: HashTree,
    registry: Arc<Registry>,
    fanout: Arc<dyn CommandFanout>,
    config: NamingConfig,
    hooks: Arc<dyn ServerHooks>,
    lifecycle: Mutex<Lifecycle>,
}

impl NamingServer {
    /// Creates an unstarted naming server with the production fan-out.
    pub fn new(config: NamingConfig) -> Self {
        Self::with_fanout(config, Arc::new(RpcCommandFanout))
    }

    /// Creates a server with an injected command fan-out (tests).
    pub fn with_fanout(config: NamingConfig, fanout: Arc<dyn CommandFanout>) -> Self {
        Self::with_hooks(config, fanout, Arc::new(NoServerHooks))
    }

    /// Creates a server with injected fan-out and shutdown hooks.
    pub fn with_hooks(
        config: NamingConfig,
        fanout: Arc<dyn CommandFanout>,
        hooks: Arc<dyn ServerHooks>,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        let tree = HashTree::with_replicate_after(
            registry.clone(),
            fanout.clone(),
            config.replicate_after,
        );
        NamingServer {
            tree,
            registry,
            fanout,
            config,
            hooks,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// The storage-server registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The directory tree.
    pub fn tree(&self) -> &HashTree {
        &self.tree
    }

    /// Starts both listeners. Single-shot: a second call, or a call
    /// after `stop`, fails with `InvalidState`.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle poisoned");
            match *lifecycle {
                Lifecycle::Idle => *lifecycle = Lifecycle::Starting,
                Lifecycle::Starting | Lifecycle::Running { .. } => {
                    return Err(FsError::InvalidState(
                        "naming server already started".to_string(),
                    ))
                }
                Lifecycle::Stopped => {
                    return Err(FsError::InvalidState(
                        "naming server is not restartable".to_string(),
                    ))
                }
            }
        }

        let service = Arc::new(Listener::new(
            Arc::new(ServiceDispatch::new(self.clone())),
            Some(self.config.service_addr),
        ));
        let registration = Arc::new(Listener::new(
            Arc::new(RegistrationDispatch::new(self.clone())),
            Some(self.config.registration_addr),
        ));

        if let Err(e) = service.start().await {
            *self.lifecycle.lock().expect("lifecycle poisoned") = Lifecycle::Idle;
            return Err(FsError::Remote(e.to_string()));
        }
        if let Err(e) = registration.start().await {
            service.stop().await;
            *self.lifecycle.lock().expect("lifecycle poisoned") = Lifecycle::Idle;
            return Err(FsError::Remote(e.to_string()));
        }

        if let (Ok(s), Ok(r)) = (service.local_addr(), registration.local_addr()) {
            info!(service = %s, registration = %r, "naming server started");
        }

        let mut lifecycle = self.lifecycle.lock().expect("lifecycle poisoned");
        match *lifecycle {
            Lifecycle::Starting => {
                *lifecycle = Lifecycle::Running {
                    service,
                    registration,
                };
                Ok(())
            }
            _ => {
                // A concurrent `stop` won the race.
                drop(lifecycle);
                service.stop().await;
                registration.stop().await;
                Err(FsError::InvalidState(
                    "naming server stopped during start".to_string(),
                ))
            }
        }
    }

    /// Stops both listeners and fires the `stopped` hook. In-flight
    /// service tasks may finish. The server cannot be started again.
    pub async fn stop(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle.lock().expect("lifecycle poisoned");
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        if let Lifecycle::Running {
            service,
            registration,
        } = previous
        {
            service.stop().await;
            registration.stop().await;
            info!("naming server stopped");
            self.hooks.stopped(None);
        }
    }

    /// Address the `Service` listener is bound to.
    pub fn service_addr(&self) -> Result<SocketAddr> {
        match &*self.lifecycle.lock().expect("lifecycle poisoned") {
            Lifecycle::Running { service, .. } => service
                .local_addr()
                .map_err(|e| FsError::Remote(e.to_string())),
            _ => Err(FsError::InvalidState("naming server not running".to_string())),
        }
    }

    /// Address the `Registration` listener is bound to.
    pub fn registration_addr(&self) -> Result<SocketAddr> {
        match &*self.lifecycle.lock().expect("lifecycle poisoned") {
            Lifecycle::Running { registration, .. } => registration
                .local_addr()
                .map_err(|e| FsError::Remote(e.to_string())),
            _ => Err(FsError::InvalidState("naming server not running".to_string())),
        }
    }

    // -- Service operations ------------------------------------------------

    /// Locks `path` for shared or exclusive access, with the replica
    /// side effects of a client lock.
    pub async fn lock(&self, path: &Path, exclusive: bool) -> Result<()> {
        self.tree.lock(path, exclusive).await
    }

    /// Releases a lock taken by a matching `lock` call.
    pub fn unlock(&self, path: &Path, exclusive: bool) -> Result<()> {
        self.tree.unlock(path, exclusive)
    }

    /// True if `path` names a directory. Takes a plain shared lock for
    /// the duration of the query.
    pub async fn is_directory(&self, path: &Path) -> Result<bool> {
        self.tree.lock_plain(path, false).await?;
        let result = self.tree.is_directory(path);
        self.tree.unlock(path, false)?;
        result
    }

    /// Sorted child names of the directory at `path`, under a plain
    /// shared lock.
    pub async fn list(&self, path: &Path) -> Result<Vec<String>> {
        self.tree.lock_plain(path, false).await?;
        let result = self.tree.list(path);
        self.tree.unlock(path, false)?;
        result
    }

    /// Creates an empty file hosted on a randomly chosen storage server.
    ///
    /// The parent is locked exclusively; the tree insertion is rolled
    /// back if the chosen server refuses or the command call fails.
    pub async fn create_file(&self, file: &Path) -> Result<bool> {
        let Some(parent) = file.parent() else {
            return Ok(false);
        };
        self.tree.lock_plain(&parent, true).await?;
        let result = self.create_file_locked(file, &parent).await;
        self.tree.unlock(&parent, true)?;
        result
    }

    async fn create_file_locked(&self, file: &Path, parent: &Path) -> Result<bool> {
        if !self.tree.is_directory(parent)? {
            return Err(FsError::not_found(format!(
                "parent {} is not a directory",
                parent
            )));
        }
        let target = self.registry.pick_random()?;
        if !self.tree.create_file(file, target)? {
            return Ok(false);
        }
        match self.fanout.create(&target, file).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.tree.unlink(file)?;
                Ok(false)
            }
            Err(e) => {
                self.tree.unlink(file)?;
                Err(e)
            }
        }
    }

    /// Creates a directory under an exclusively locked parent.
    pub async fn create_directory(&self, directory: &Path) -> Result<bool> {
        let Some(parent) = directory.parent() else {
            return Ok(false);
        };
        self.tree.lock_plain(&parent, true).await?;
        let result = (|| {
            if !self.tree.is_directory(&parent)? {
                return Err(FsError::not_found(format!(
                    "parent {} is not a directory",
                    parent
                )));
            }
            self.tree.create_directory(directory)
        })();
        self.tree.unlock(&parent, true)?;
        result
    }

    /// Deletes a file or directory tree. The root is refused with
    /// `false`; a missing path is `NotFound`.
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        self.tree.lock_plain(&parent, true).await?;
        let result = self.tree.delete(path).await;
        self.tree.unlock(&parent, true)?;
        result
    }

    /// Storage endpoint hosting the file at `path`, rotating over its
    /// replicas.
    pub fn get_storage(&self, path: &Path) -> Result<SocketAddr> {
        Ok(self.tree.get_storage(path)?.storage)
    }

    // -- Registration operation --------------------------------------------

    /// Registers a storage server and grafts its files into the tree.
    /// Returns the paths the server must delete locally before serving.
    pub fn register(
        &self,
        storage: SocketAddr,
        command: SocketAddr,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>> {
        let server = StorageRef::new(storage, command);
        self.registry.add(server)?;
        let duplicates = self.tree.register_files(server, &paths);
        info!(
            server = %server,
            claimed = paths.len(),
            duplicates = duplicates.len(),
            "storage server registered"
        );
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullFanout;

    #[async_trait]
    impl CommandFanout for NullFanout {
        async fn create(&self, _target: &StorageRef, _path: &Path) -> Result<bool> {
            Ok(true)
        }

        async fn delete(&self, _target: &StorageRef, _path: &Path) -> Result<bool> {
            Ok(true)
        }

        async fn copy(
            &self,
            _target: &StorageRef,
            _path: &Path,
            _source: &StorageRef,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    fn ephemeral_config() -> NamingConfig {
        NamingConfig {
            service_addr: "127.0.0.1:0".parse().unwrap(),
            registration_addr: "127.0.0.1:0".parse().unwrap(),
            ..NamingConfig::default()
        }
    }

    fn server() -> Arc<NamingServer> {
        Arc::new(NamingServer::with_fanout(
            ephemeral_config(),
            Arc::new(NullFanout),
        ))
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[tokio::test]
    async fn test_start_is_single_shot() {
        let server = server();
        server.start().await.unwrap();
        match server.start().await {
            Err(FsError::InvalidState(_)) => {}
            other => panic!("expected InvalidState, got {:?}", other),
        }
        server.stop().await;
        match server.start().await {
            Err(FsError::InvalidState(_)) => {}
            other => panic!("expected InvalidState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_addresses_available_after_start() {
        let server = server();
        assert!(server.service_addr().is_err());
        server.start().await.unwrap();
        let service = server.service_addr().unwrap();
        let registration = server.registration_addr().unwrap();
        assert_ne!(service.port(), 0);
        assert_ne!(registration.port(), 0);
        assert_ne!(service, registration);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_create_file_without_storage_servers() {
        let server = server();
        match server.create_file(&path("/new.txt")).await {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_file_root_refused() {
        let server = server();
        assert!(!server.create_file(&Path::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_file_and_directory() {
        let server = server();
        server
            .register(addr(7000), addr(7001), vec![])
            .unwrap();
        assert!(server.create_directory(&path("/dir")).await.unwrap());
        assert!(server.create_file(&path("/dir/f.txt")).await.unwrap());
        assert!(!server.create_file(&path("/dir/f.txt")).await.unwrap());
        assert!(server.is_directory(&path("/dir")).await.unwrap());
        assert!(!server.is_directory(&path("/dir/f.txt")).await.unwrap());
        assert_eq!(server.list(&path("/dir")).await.unwrap(), vec!["f.txt"]);
    }

    #[tokio::test]
    async fn test_create_file_parent_must_be_directory() {
        let server = server();
        server
            .register(addr(7000), addr(7001), vec![path("/f")])
            .unwrap();
        match server.create_file(&path("/f/child.txt")).await {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_server_rejected() {
        let server = server();
        server.register(addr(7000), addr(7001), vec![]).unwrap();
        match server.register(addr(7000), addr(7001), vec![]) {
            Err(FsError::AlreadyRegistered(_)) => {}
            other => panic!("expected AlreadyRegistered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_returns_duplicates_and_keeps_order() {
        let server = server();
        let dup1 = server
            .register(addr(7000), addr(7001), vec![path("/x")])
            .unwrap();
        assert!(dup1.is_empty());
        let dup2 = server
            .register(addr(7002), addr(7003), vec![path("/x"), path("/y")])
            .unwrap();
        assert_eq!(dup2, vec![path("/x")]);
        let all = server.registry().all();
        assert_eq!(
            all,
            vec![
                StorageRef::new(addr(7000), addr(7001)),
                StorageRef::new(addr(7002), addr(7003)),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_root_returns_false() {
        let server = server();
        assert!(!server.delete(&Path::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let server = server();
        match server.delete(&path("/missing")).await {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_storage_returns_host_endpoint() {
        let server = server();
        server
            .register(addr(7000), addr(7001), vec![path("/a/b.txt")])
            .unwrap();
        assert_eq!(
            server.get_storage(&path("/a/b.txt")).unwrap(),
            addr(7000)
        );
        match server.get_storage(&path("/a")) {
            Err(FsError::NotFound(_)) => {}
            other => panic!("expected NotFound for a directory, got {:?}", other),
        }
    }
}
