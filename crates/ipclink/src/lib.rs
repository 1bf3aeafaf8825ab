//! Local request/response IPC between processes on one host.
//!
//! A server binds a Unix domain socket (or a named pipe on Windows) whose
//! path is derived from a context string, registers handlers under channel
//! names, and hands its address to child processes through the environment.
//! Clients call a channel with a JSON payload and get the handler's JSON
//! result back over HTTP/1.1.
//!
//! # Crate Structure
//!
//! - [`transport`]: Endpoint derivation and the async local transport
//! - [`channel`]: Server, handler registry, and client
//!
//! # Example
//!
//! ```rust,ignore
//! use ipclink::channel::{handler_fn, CallOptions, HandlerError, IpcClient, IpcServer, ServerConfig};
//!
//! let server = IpcServer::bind(ServerConfig::new().with_context("my-app"))?;
//! let registration = server.register_handler(
//!     "echo",
//!     handler_fn(|request| async move { Ok::<_, HandlerError>(request) }),
//! )?;
//!
//! let client = IpcClient::new("echo", server.endpoint().clone())?;
//! let response = client.call(&serde_json::json!("hi"), CallOptions::default()).await?;
//!
//! registration.dispose();
//! server.dispose();
//! ```

/// Re-export transport types.
pub mod transport {
    pub use ipclink_transport::*;
}

/// Re-export channel types.
pub mod channel {
    pub use ipclink_channel::*;
}

pub use ipclink_channel::{
    handler_fn, CallOptions, CallResponse, ClientError, Handler, HandlerError, IpcClient,
    IpcServer, Registration, ServerConfig, ServerError, ENDPOINT_ENV_VAR,
};
pub use ipclink_transport::{resolve_endpoint, Endpoint, EndpointOptions};
