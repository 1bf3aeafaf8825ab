use ipclink_transport::TransportError;

use crate::channel::InvalidChannel;

/// Errors raised by [`IpcServer`](crate::IpcServer) construction and registration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No endpoint could be derived (e.g. the OS random source failed).
    #[error("failed to resolve endpoint: {0}")]
    Endpoint(#[source] TransportError),

    /// The listener could not be bound (address in use, permission denied).
    #[error("bind failed: {0}")]
    Bind(#[source] TransportError),

    /// The channel name cannot be used as a request path.
    #[error(transparent)]
    InvalidChannel(#[from] InvalidChannel),

    /// `bind` was called outside a tokio runtime, so the accept loop cannot start.
    #[error("no tokio runtime is running; bind must be called from within one")]
    NoRuntime,

    /// The server was disposed and accepts no further registrations.
    #[error("server has been disposed")]
    Disposed,
}

/// Errors raised by [`IpcClient`](crate::IpcClient) construction and calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Neither an explicit endpoint nor the environment variable was provided.
    #[error("missing endpoint: pass one explicitly or set {}", crate::ENDPOINT_ENV_VAR)]
    MissingEndpoint,

    /// The channel name cannot be used as a request path.
    #[error(transparent)]
    InvalidChannel(#[from] InvalidChannel),

    /// The endpoint could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection failed mid-exchange (reset, closed early, protocol error).
    #[error("http exchange failed: {0}")]
    Http(#[from] hyper::Error),

    /// The server answered with a status other than 200.
    #[error("bad status code: {0}")]
    BadStatus(u16),

    /// The response body is not valid JSON.
    #[error("failed to deserialize response: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The request payload could not be encoded as JSON.
    #[error("failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl ClientError {
    /// Whether the failure happened below HTTP status handling.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }
}

pub type ServerResult<T> = std::result::Result<T, ServerError>;
pub type ClientResult<T> = std::result::Result<T, ClientError>;
