use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::IpcStream;

#[cfg(windows)]
use crate::pipe::NamedPipeListener;
#[cfg(unix)]
use crate::uds::{SocketCleanup, UnixDomainSocket};

/// Platform listener bound to an [`Endpoint`].
pub struct IpcListener {
    endpoint: Endpoint,
    #[cfg(unix)]
    inner: UnixDomainSocket,
    #[cfg(windows)]
    inner: NamedPipeListener,
}

impl IpcListener {
    /// Bind with the platform default socket mode.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_mode(endpoint, None)
    }

    /// Bind, overriding the Unix socket file mode. `mode` is ignored on Windows.
    pub fn bind_with_mode(endpoint: &Endpoint, mode: Option<u32>) -> Result<Self> {
        #[cfg(unix)]
        let inner = UnixDomainSocket::bind_with_mode(
            endpoint.as_path(),
            mode.unwrap_or(UnixDomainSocket::DEFAULT_SOCKET_MODE),
        )?;
        #[cfg(windows)]
        let inner = {
            let _ = mode;
            NamedPipeListener::bind(endpoint.as_path())?
        };

        Ok(Self {
            endpoint: endpoint.clone(),
            inner,
        })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<IpcStream> {
        self.inner.accept().await
    }

    /// Detach endpoint cleanup so it can run independently of the listener.
    pub fn take_cleanup(&mut self) -> EndpointCleanup {
        EndpointCleanup {
            #[cfg(unix)]
            socket: self.inner.take_cleanup(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// Open a new connection to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> Result<IpcStream> {
    #[cfg(unix)]
    {
        UnixDomainSocket::connect(endpoint.as_path()).await
    }
    #[cfg(windows)]
    {
        NamedPipeListener::connect(endpoint.as_path()).await
    }
}

/// Removes a filesystem-backed endpoint when dropped or [`remove`](Self::remove)d.
///
/// Removal is best-effort; errors are ignored. A no-op for named pipes.
#[derive(Debug, Default)]
pub struct EndpointCleanup {
    #[cfg(unix)]
    socket: Option<SocketCleanup>,
}

impl EndpointCleanup {
    /// Remove the endpoint now. Later calls do nothing.
    pub fn remove(&mut self) {
        #[cfg(unix)]
        drop(self.socket.take());
    }
}
