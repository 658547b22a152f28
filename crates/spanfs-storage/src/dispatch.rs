//! Server-side dispatchers for the storage server's remote interfaces.

use std::sync::Arc;

use async_trait::async_trait;
use spanfs_common::Result;
use spanfs_rpc::api::{command, storage};
use spanfs_rpc::{parse_args, reply, CallFrame, Dispatch, Outcome};

use crate::server::StorageServer;

/// Dispatcher for the client-facing `Storage` interface.
pub struct StorageDispatch {
    server: Arc<StorageServer>,
}

impl StorageDispatch {
    /// Wraps a storage server for storage dispatch.
    pub fn new(server: Arc<StorageServer>) -> Self {
        StorageDispatch { server }
    }
}

#[async_trait]
impl Dispatch for StorageDispatch {
    fn interface(&self) -> &'static str {
        storage::INTERFACE
    }

    async fn dispatch(&self, call: &CallFrame) -> Outcome {
        match call.method.as_str() {
            storage::SIZE => {
                let req: storage::SizeRequest = match parse_args(call, storage::SIZE_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.size(&req.path).await)
            }
            storage::READ => {
                let req: storage::ReadRequest = match parse_args(call, storage::READ_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.read(&req.path, req.offset, req.length).await)
            }
            storage::WRITE => {
                let req: storage::WriteRequest = match parse_args(call, storage::WRITE_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.write(&req.path, req.offset, &req.data).await)
            }
            unknown => Outcome::Protocol(format!("unknown method {:?} on Storage", unknown)),
        }
    }
}

/// Dispatcher for the naming-server-facing `Command` interface.
pub struct CommandDispatch {
    server: Arc<StorageServer>,
}

impl CommandDispatch {
    /// Wraps a storage server for command dispatch.
    pub fn new(server: Arc<StorageServer>) -> Self {
        CommandDispatch { server }
    }
}

#[async_trait]
impl Dispatch for CommandDispatch {
    fn interface(&self) -> &'static str {
        command::INTERFACE
    }

    async fn dispatch(&self, call: &CallFrame) -> Outcome {
        match call.method.as_str() {
            command::CREATE => {
                let req: command::PathRequest = match parse_args(call, command::CREATE_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(Result::Ok(self.server.create(&req.path)))
            }
            command::DELETE => {
                let req: command::PathRequest = match parse_args(call, command::DELETE_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(Result::Ok(self.server.delete_local(&req.path)))
            }
            command::COPY => {
                let req: command::CopyRequest = match parse_args(call, command::COPY_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.copy(&req.path, req.source).await)
            }
            unknown => Outcome::Protocol(format!("unknown method {:?} on Command", unknown)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spanfs_common::Path;
    use spanfs_rpc::frame::{decode, encode};
    use tempfile::TempDir;

    use crate::server::StorageConfig;

    #[tokio::test]
    async fn test_command_create_through_dispatch() {
        let dir = TempDir::new().unwrap();
        let server = Arc::new(StorageServer::new(StorageConfig::new(
            dir.path().to_path_buf(),
        )));
        let dispatch = CommandDispatch::new(server);

        let req = command::PathRequest {
            path: Path::parse("/made/by/dispatch.txt").unwrap(),
        };
        let call = CallFrame {
            method: command::CREATE.to_string(),
            params: command::CREATE_PARAMS.iter().map(|s| s.to_string()).collect(),
            args: encode(&req).unwrap(),
        };
        match dispatch.dispatch(&call).await {
            Outcome::Return(body) => assert!(decode::<bool>(&body).unwrap()),
            other => panic!("expected return, got {:?}", other),
        }
        assert!(dir.path().join("made/by/dispatch.txt").is_file());
    }

    #[tokio::test]
    async fn test_storage_unknown_method() {
        let dir = TempDir::new().unwrap();
        let server = Arc::new(StorageServer::new(StorageConfig::new(
            dir.path().to_path_buf(),
        )));
        let dispatch = StorageDispatch::new(server);
        let call = CallFrame {
            method: "truncate".to_string(),
            params: vec![],
            args: vec![],
        };
        match dispatch.dispatch(&call).await {
            Outcome::Protocol(msg) => assert!(msg.contains("truncate")),
            other => panic!("expected protocol fault, got {:?}", other),
        }
    }
}
