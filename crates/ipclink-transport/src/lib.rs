//! Local endpoint resolution and async transport for ipclink.
//!
//! Provides a unified interface over the local transport mechanisms:
//! - Unix domain sockets (Linux/macOS)
//! - Named pipes (Windows)
//!
//! This is the lowest layer of ipclink. Endpoints are derived from a context
//! string (or random entropy) by [`resolve_endpoint`], and everything above
//! talks through the [`IpcStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

#[cfg(windows)]
pub mod pipe;
#[cfg(unix)]
pub mod uds;

pub use endpoint::{endpoint_hash, resolve_endpoint, Endpoint, EndpointOptions};
pub use error::{Result, TransportError};
pub use listener::{connect, EndpointCleanup, IpcListener};
pub use stream::IpcStream;

#[cfg(windows)]
pub use pipe::NamedPipeListener;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
