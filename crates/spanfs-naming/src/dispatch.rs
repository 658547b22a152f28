//! Server-side dispatchers for the naming server's remote interfaces.
//!
//! Each dispatcher matches the method tag, checks the parameter
//! descriptors, decodes the argument tuple, and calls into
//! [`NamingServer`]. A servant-raised `FsError` is encoded into the
//! fault payload so the caller rethrows the original kind; anything
//! malformed is a protocol fault and surfaces at the caller as a remote
//! error.

use std::sync::Arc;

use async_trait::async_trait;
use spanfs_rpc::api::{registration, service};
use spanfs_rpc::{parse_args, reply, CallFrame, Dispatch, Outcome};

use crate::server::NamingServer;

/// Dispatcher for the client-facing `Service` interface.
pub struct ServiceDispatch {
    server: Arc<NamingServer>,
}

impl ServiceDispatch {
    /// Wraps a naming server for service dispatch.
    pub fn new(server: Arc<NamingServer>) -> Self {
        ServiceDispatch { server }
    }
}

#[async_trait]
impl Dispatch for ServiceDispatch {
    fn interface(&self) -> &'static str {
        service::INTERFACE
    }

    async fn dispatch(&self, call: &CallFrame) -> Outcome {
        match call.method.as_str() {
            service::LOCK => {
                let req: service::LockRequest = match parse_args(call, service::LOCK_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.lock(&req.path, req.exclusive).await)
            }
            service::UNLOCK => {
                let req: service::LockRequest = match parse_args(call, service::UNLOCK_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.unlock(&req.path, req.exclusive))
            }
            service::IS_DIRECTORY => {
                let req: service::PathRequest =
                    match parse_args(call, service::IS_DIRECTORY_PARAMS) {
                        Ok(req) => req,
                        Err(outcome) => return outcome,
                    };
                reply(self.server.is_directory(&req.path).await)
            }
            service::LIST => {
                let req: service::PathRequest = match parse_args(call, service::LIST_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.list(&req.path).await)
            }
            service::CREATE_FILE => {
                let req: service::PathRequest =
                    match parse_args(call, service::CREATE_FILE_PARAMS) {
                        Ok(req) => req,
                        Err(outcome) => return outcome,
                    };
                reply(self.server.create_file(&req.path).await)
            }
            service::CREATE_DIRECTORY => {
                let req: service::PathRequest =
                    match parse_args(call, service::CREATE_DIRECTORY_PARAMS) {
                        Ok(req) => req,
                        Err(outcome) => return outcome,
                    };
                reply(self.server.create_directory(&req.path).await)
            }
            service::DELETE => {
                let req: service::PathRequest = match parse_args(call, service::DELETE_PARAMS) {
                    Ok(req) => req,
                    Err(outcome) => return outcome,
                };
                reply(self.server.delete(&req.path).await)
            }
            service::GET_STORAGE => {
                let req: service::PathRequest =
                    match parse_args(call, service::GET_STORAGE_PARAMS) {
                        Ok(req) => req,
                        Err(outcome) => return outcome,
                    };
                reply(self.server.get_storage(&req.path))
            }
            unknown => Outcome::Protocol(format!("unknown method {:?} on Service", unknown)),
        }
    }
}

/// Dispatcher for the storage-server-facing `Registration` interface.
pub struct RegistrationDispatch {
    server: Arc<NamingServer>,
}

impl RegistrationDispatch {
    /// Wraps a naming server for registration dispatch.
    pub fn new(server: Arc<NamingServer>) -> Self {
        RegistrationDispatch { server }
    }
}

#[async_trait]
impl Dispatch for RegistrationDispatch {
    fn interface(&self) -> &'static str {
        registration::INTERFACE
    }

    async fn dispatch(&self, call: &CallFrame) -> Outcome {
        match call.method.as_str() {
            registration::REGISTER => {
                let req: registration::RegisterRequest =
                    match parse_args(call, registration::REGISTER_PARAMS) {
                        Ok(req) => req,
                        Err(outcome) => return outcome,
                    };
                reply(self.server.register(req.storage, req.command, req.paths))
            }
            unknown => Outcome::Protocol(format!(
                "unknown method {:?} on Registration",
                unknown
            )),
        }
    }
}
