//! Typed clients for the spanfs remote interfaces.
//!
//! Each client wraps a [`Proxy`] and exposes the interface as ordinary
//! async methods returning `Result<_, FsError>`. Transport failures are
//! folded into [`FsError::Remote`]; servant-raised errors come back as
//! their original kind. Equality, hashing, and display delegate to the
//! underlying proxy, so two clients aimed at the same interface and
//! address compare equal.

use std::fmt;
use std::net::SocketAddr;

use spanfs_common::{FsError, Path};

use crate::api::{command, registration, service, storage};
use crate::proxy::{CallError, Proxy};

fn fold<T>(result: Result<T, CallError<FsError>>) -> Result<T, FsError> {
    match result {
        Ok(value) => Ok(value),
        Err(CallError::Fault(fault)) => Err(fault),
        Err(CallError::Remote(e)) => Err(FsError::Remote(e.to_string())),
    }
}

macro_rules! proxy_identity {
    ($name:ident) => {
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.proxy == other.proxy
            }
        }

        impl Eq for $name {}

        impl std::hash::Hash for $name {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.proxy.hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.proxy)
            }
        }
    };
}

/// Client for the naming server's `Service` interface.
#[derive(Clone, Copy, Debug)]
pub struct ServiceClient {
    proxy: Proxy,
}

proxy_identity!(ServiceClient);

impl ServiceClient {
    /// Creates a client aimed at a naming server's service endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        ServiceClient {
            proxy: Proxy::new(service::INTERFACE, addr),
        }
    }

    /// The underlying proxy.
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Locks `path` for shared or exclusive access.
    pub async fn lock(&self, path: &Path, exclusive: bool) -> Result<(), FsError> {
        fold(
            self.proxy
                .call(
                    service::LOCK,
                    service::LOCK_PARAMS,
                    &service::LockRequest {
                        path: path.clone(),
                        exclusive,
                    },
                )
                .await,
        )
    }

    /// Releases a lock taken by a matching `lock` call.
    pub async fn unlock(&self, path: &Path, exclusive: bool) -> Result<(), FsError> {
        fold(
            self.proxy
                .call(
                    service::UNLOCK,
                    service::UNLOCK_PARAMS,
                    &service::LockRequest {
                        path: path.clone(),
                        exclusive,
                    },
                )
                .await,
        )
    }

    /// True if `path` names a directory, false for a file.
    pub async fn is_directory(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    service::IS_DIRECTORY,
                    service::IS_DIRECTORY_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Child names of the directory at `path`, sorted.
    pub async fn list(&self, path: &Path) -> Result<Vec<String>, FsError> {
        fold(
            self.proxy
                .call(
                    service::LIST,
                    service::LIST_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Creates an empty file; true iff the file was created.
    pub async fn create_file(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    service::CREATE_FILE,
                    service::CREATE_FILE_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Creates a directory; true iff the directory was created.
    pub async fn create_directory(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    service::CREATE_DIRECTORY,
                    service::CREATE_DIRECTORY_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Deletes a file or directory tree; false for the root.
    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    service::DELETE,
                    service::DELETE_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Storage endpoint hosting the file at `path`, rotating over its
    /// replicas.
    pub async fn get_storage(&self, path: &Path) -> Result<SocketAddr, FsError> {
        fold(
            self.proxy
                .call(
                    service::GET_STORAGE,
                    service::GET_STORAGE_PARAMS,
                    &service::PathRequest { path: path.clone() },
                )
                .await,
        )
    }
}

/// Client for the naming server's `Registration` interface.
#[derive(Clone, Copy, Debug)]
pub struct RegistrationClient {
    proxy: Proxy,
}

proxy_identity!(RegistrationClient);

impl RegistrationClient {
    /// Creates a client aimed at a naming server's registration endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        RegistrationClient {
            proxy: Proxy::new(registration::INTERFACE, addr),
        }
    }

    /// Registers a storage server and its hosted files. The reply lists
    /// the paths the caller must delete locally.
    pub async fn register(
        &self,
        storage: SocketAddr,
        command: SocketAddr,
        paths: Vec<Path>,
    ) -> Result<Vec<Path>, FsError> {
        fold(
            self.proxy
                .call(
                    registration::REGISTER,
                    registration::REGISTER_PARAMS,
                    &registration::RegisterRequest {
                        storage,
                        command,
                        paths,
                    },
                )
                .await,
        )
    }
}

/// Client for a storage server's `Storage` interface.
#[derive(Clone, Copy, Debug)]
pub struct StorageClient {
    proxy: Proxy,
}

proxy_identity!(StorageClient);

impl StorageClient {
    /// Creates a client aimed at a storage server's storage endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        StorageClient {
            proxy: Proxy::new(storage::INTERFACE, addr),
        }
    }

    /// Size in bytes of the file at `path`.
    pub async fn size(&self, path: &Path) -> Result<u64, FsError> {
        fold(
            self.proxy
                .call(
                    storage::SIZE,
                    storage::SIZE_PARAMS,
                    &storage::SizeRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Reads `length` bytes at `offset`.
    pub async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, FsError> {
        fold(
            self.proxy
                .call(
                    storage::READ,
                    storage::READ_PARAMS,
                    &storage::ReadRequest {
                        path: path.clone(),
                        offset,
                        length,
                    },
                )
                .await,
        )
    }

    /// Writes `data` at `offset`, extending the file as needed.
    pub async fn write(&self, path: &Path, offset: u64, data: Vec<u8>) -> Result<(), FsError> {
        fold(
            self.proxy
                .call(
                    storage::WRITE,
                    storage::WRITE_PARAMS,
                    &storage::WriteRequest {
                        path: path.clone(),
                        offset,
                        data,
                    },
                )
                .await,
        )
    }
}

/// Client for a storage server's `Command` interface.
#[derive(Clone, Copy, Debug)]
pub struct CommandClient {
    proxy: Proxy,
}

proxy_identity!(CommandClient);

impl CommandClient {
    /// Creates a client aimed at a storage server's command endpoint.
    pub fn new(addr: SocketAddr) -> Self {
        CommandClient {
            proxy: Proxy::new(command::INTERFACE, addr),
        }
    }

    /// Creates an empty file on the storage server.
    pub async fn create(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    command::CREATE,
                    command::CREATE_PARAMS,
                    &command::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Deletes a file or directory tree on the storage server.
    pub async fn delete(&self, path: &Path) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    command::DELETE,
                    command::DELETE_PARAMS,
                    &command::PathRequest { path: path.clone() },
                )
                .await,
        )
    }

    /// Copies a file from another storage server's storage endpoint.
    pub async fn copy(&self, path: &Path, source: SocketAddr) -> Result<bool, FsError> {
        fold(
            self.proxy
                .call(
                    command::COPY,
                    command::COPY_PARAMS,
                    &command::CopyRequest {
                        path: path.clone(),
                        source,
                    },
                )
                .await,
        )
    }
}
