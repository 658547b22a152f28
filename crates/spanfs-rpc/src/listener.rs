//! RPC listener: exposes a dispatcher on a TCP endpoint.
//!
//! A listener accepts one connection per remote call, reads the call
//! frame, hands it to the [`Dispatch`] implementation, writes the reply
//! frame, and closes. One accept task runs per listener and one handler
//! task is spawned per accepted connection.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};
use crate::frame::{encode, read_message, write_message, CallFrame, RemoteFault, ReplyFrame, Status};

/// Server-side dispatcher for one remote interface.
///
/// Implementations match the method tag, decode the argument tuple,
/// invoke the backing object, and encode the outcome. This is the
/// code-generated-dispatcher shape: no runtime reflection, one match arm
/// per method.
#[async_trait]
pub trait Dispatch: Send + Sync + 'static {
    /// Name of the remote interface this dispatcher serves.
    fn interface(&self) -> &'static str;

    /// Handles one decoded call frame.
    async fn dispatch(&self, call: &CallFrame) -> Outcome;
}

/// Result of dispatching one remote call.
#[derive(Debug)]
pub enum Outcome {
    /// Encoded return value.
    Return(Vec<u8>),
    /// Encoded application-level error, rethrown at the caller as its
    /// original kind.
    Fault(Vec<u8>),
    /// Failure in the RPC layer itself: unknown method, mismatched
    /// parameter descriptors, undecodable arguments.
    Protocol(String),
}

/// Lifecycle and error hooks for a listener. All defaults do nothing;
/// inject an implementation to observe shutdown or accept failures.
pub trait Hooks: Send + Sync + 'static {
    /// Called when the accept task exits, with the fatal error if any.
    fn stopped(&self, _cause: Option<&RpcError>) {}

    /// Called when `accept` fails. Return `true` to keep accepting.
    fn listen_error(&self, _error: &RpcError) -> bool {
        false
    }

    /// Called when a handler task fails to read or write a frame.
    fn service_error(&self, _error: &RpcError) {}
}

/// The default hook set: ignore everything.
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Checks the parameter descriptors and decodes the argument tuple of a
/// call, producing the protocol fault to return on mismatch.
pub fn parse_args<T: serde::de::DeserializeOwned>(
    call: &CallFrame,
    expected: &[&str],
) -> std::result::Result<T, Outcome> {
    let matches = call.params.len() == expected.len()
        && call.params.iter().zip(expected).all(|(a, b)| a == b);
    if !matches {
        return Err(Outcome::Protocol(format!(
            "parameter descriptors {:?} do not match {:?} for {}",
            call.params, expected, call.method
        )));
    }
    crate::frame::decode(&call.args)
        .map_err(|e| Outcome::Protocol(format!("undecodable arguments for {}: {}", call.method, e)))
}

/// Encodes a servant result into an outcome: the return value on `Ok`,
/// the error (rethrown at the caller as its original kind) on `Err`.
pub fn reply<T, E>(result: std::result::Result<T, E>) -> Outcome
where
    T: serde::Serialize,
    E: serde::Serialize,
{
    match result {
        Ok(value) => match encode(&value) {
            Ok(body) => Outcome::Return(body),
            Err(e) => Outcome::Protocol(format!("unencodable reply: {}", e)),
        },
        Err(fault) => match encode(&fault) {
            Ok(body) => Outcome::Fault(body),
            Err(e) => Outcome::Protocol(format!("unencodable fault: {}", e)),
        },
    }
}

enum State {
    Idle,
    Starting,
    Running {
        local_addr: SocketAddr,
        shutdown: watch::Sender<bool>,
        accept_task: tokio::task::JoinHandle<()>,
    },
}

/// A TCP endpoint serving one remote interface through a [`Dispatch`].
pub struct Listener {
    dispatch: Arc<dyn Dispatch>,
    hooks: Arc<dyn Hooks>,
    requested: Option<SocketAddr>,
    state: Mutex<State>,
}

impl Listener {
    /// Creates a listener for the given dispatcher. With `addr == None`
    /// the system chooses the address at `start`.
    pub fn new(dispatch: Arc<dyn Dispatch>, addr: Option<SocketAddr>) -> Self {
        Self::with_hooks(dispatch, addr, Arc::new(NoHooks))
    }

    /// Creates a listener with injected lifecycle hooks.
    pub fn with_hooks(
        dispatch: Arc<dyn Dispatch>,
        addr: Option<SocketAddr>,
        hooks: Arc<dyn Hooks>,
    ) -> Self {
        Listener {
            dispatch,
            hooks,
            requested: addr,
            state: Mutex::new(State::Idle),
        }
    }

    /// Binds the socket and starts the accept task.
    ///
    /// The listening socket is ready before this returns, so
    /// [`local_addr`](Self::local_addr) may be called immediately after.
    /// A second `start` while running fails with `AlreadyStarted`.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("listener state poisoned");
            match *state {
                State::Idle => *state = State::Starting,
                State::Starting | State::Running { .. } => {
                    return Err(RpcError::AlreadyStarted)
                }
            }
        }

        let addr = self
            .requested
            .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));
        let listener = match TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                *self.state.lock().expect("listener state poisoned") = State::Idle;
                return Err(RpcError::Bind { addr, source: e });
            }
        };
        let local_addr = listener.local_addr()?;
        debug!(interface = self.dispatch.interface(), %local_addr, "listener bound");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let dispatch = self.dispatch.clone();
        let hooks = self.hooks.clone();
        let accept_task = tokio::spawn(async move {
            let cause = accept_loop(listener, dispatch, hooks.clone(), shutdown_rx).await;
            hooks.stopped(cause.as_ref());
        });

        *self.state.lock().expect("listener state poisoned") = State::Running {
            local_addr,
            shutdown,
            accept_task,
        };
        Ok(())
    }

    /// Address the listener is bound to. Fails unless running.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match *self.state.lock().expect("listener state poisoned") {
            State::Running { local_addr, .. } => Ok(local_addr),
            _ => Err(RpcError::NotStarted),
        }
    }

    /// Unblocks the accept task and waits for it to exit. In-flight
    /// handler tasks are left to finish on their own. A listener that is
    /// not running is left untouched.
    pub async fn stop(&self) {
        let prev = {
            let mut state = self.state.lock().expect("listener state poisoned");
            std::mem::replace(&mut *state, State::Idle)
        };
        if let State::Running {
            shutdown,
            accept_task,
            ..
        } = prev
        {
            let _ = shutdown.send(true);
            let _ = accept_task.await;
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatch: Arc<dyn Dispatch>,
    hooks: Arc<dyn Hooks>,
    mut shutdown: watch::Receiver<bool>,
) -> Option<RpcError> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return None,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(interface = dispatch.interface(), %peer, "accepted connection");
                    let dispatch = dispatch.clone();
                    let hooks = hooks.clone();
                    tokio::spawn(async move {
                        serve_connection(stream, dispatch, hooks).await;
                    });
                }
                Err(e) => {
                    let err = RpcError::Io(e);
                    if !hooks.listen_error(&err) {
                        warn!(error = %err, "accept failed, listener shutting down");
                        return Some(err);
                    }
                }
            }
        }
    }
}

async fn serve_connection(mut stream: TcpStream, dispatch: Arc<dyn Dispatch>, hooks: Arc<dyn Hooks>) {
    let call: CallFrame = match read_message(&mut stream).await {
        Ok(call) => call,
        Err(e) => {
            hooks.service_error(&e);
            return;
        }
    };

    let reply = match dispatch.dispatch(&call).await {
        Outcome::Return(body) => ReplyFrame {
            status: Status::Ok,
            body,
        },
        Outcome::Fault(fault) => match encode(&RemoteFault::Application(fault)) {
            Ok(body) => ReplyFrame {
                status: Status::Error,
                body,
            },
            Err(e) => {
                hooks.service_error(&e);
                return;
            }
        },
        Outcome::Protocol(message) => {
            warn!(
                interface = dispatch.interface(),
                method = %call.method,
                %message,
                "protocol fault"
            );
            match encode(&RemoteFault::Protocol(message)) {
                Ok(body) => ReplyFrame {
                    status: Status::Error,
                    body,
                },
                Err(e) => {
                    hooks.service_error(&e);
                    return;
                }
            }
        }
    };

    if let Err(e) = write_message(&mut stream, &reply).await {
        hooks.service_error(&e);
    }
}
