//! Named-channel request/response over a local endpoint.
//!
//! One process binds an [`IpcServer`] and registers a [`Handler`] per
//! channel. Other processes on the same host build an [`IpcClient`] for a
//! channel and issue calls; each call is one HTTP/1.1 exchange
//! (`POST /<channel>`, JSON body) over a fresh connection.
//!
//! The server publishes its endpoint through [`IpcServer::get_env`] under
//! [`ENDPOINT_ENV_VAR`], which [`IpcClient::from_env`] reads back in a
//! child process.

pub mod channel;
pub mod client;
pub mod error;
pub mod handler;
mod registry;
pub mod server;

pub use channel::{validate_channel, InvalidChannel};
pub use client::{resolve_client_endpoint, CallOptions, CallResponse, IpcClient};
pub use error::{ClientError, ClientResult, ServerError, ServerResult};
pub use handler::{handler_fn, FnHandler, Handler, HandlerError, HandlerResult};
pub use registry::Registration;
pub use server::{IpcServer, ServerConfig};

/// Environment variable carrying the server endpoint to child processes.
pub const ENDPOINT_ENV_VAR: &str = "IPCLINK_HANDLE";
