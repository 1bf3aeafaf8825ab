use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::ERROR_PIPE_BUSY;

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Delay between open attempts while every pipe instance is busy.
const PIPE_BUSY_BACKOFF: Duration = Duration::from_millis(50);

/// Windows named pipe transport.
///
/// A pipe instance is created ahead of each accept; once a client connects,
/// the instance is handed out and a fresh one takes its place. Named pipes
/// are not filesystem-backed, so there is nothing to clean up on drop.
pub struct NamedPipeListener {
    path: PathBuf,
    /// Instance waiting for the next client. `None` after a failed re-create.
    next: Mutex<Option<NamedPipeServer>>,
}

impl NamedPipeListener {
    /// Create the first instance of the pipe at `path`.
    ///
    /// Fails if another process already owns a pipe with this name.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&path)
            .map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;

        info!(?path, "listening on named pipe");

        Ok(Self {
            path,
            next: Mutex::new(Some(server)),
        })
    }

    /// Accept an incoming connection.
    ///
    /// A pending instance whose connect fails is discarded and replaced, so
    /// later accepts start from a clean instance. Cancelling the returned
    /// future leaves the pending instance in place.
    pub async fn accept(&self) -> Result<IpcStream> {
        let mut next = self.next.lock().await;
        if next.is_none() {
            *next = Some(self.create_instance().map_err(TransportError::Accept)?);
        }
        let Some(pending) = next.as_ref() else {
            return Err(TransportError::Accept(std::io::Error::other(
                "no pending pipe instance",
            )));
        };

        if let Err(err) = pending.connect().await {
            *next = match self.create_instance() {
                Ok(fresh) => Some(fresh),
                Err(create_err) => {
                    warn!(path = ?self.path, error = %create_err, "failed to replace pipe instance");
                    None
                }
            };
            return Err(TransportError::Accept(err));
        }

        let connected = match self.create_instance() {
            Ok(fresh) => next.replace(fresh),
            Err(err) => {
                warn!(path = ?self.path, error = %err, "failed to create next pipe instance");
                next.take()
            }
        };
        debug!("accepted connection");
        connected.map(IpcStream::from_pipe_server).ok_or_else(|| {
            TransportError::Accept(std::io::Error::other("no pending pipe instance"))
        })
    }

    fn create_instance(&self) -> std::io::Result<NamedPipeServer> {
        ServerOptions::new().create(&self.path)
    }

    /// Connect to a listening named pipe.
    pub async fn connect(path: impl AsRef<Path>) -> Result<IpcStream> {
        let path = path.as_ref();
        loop {
            match ClientOptions::new().open(path) {
                Ok(client) => {
                    debug!(?path, "connected to named pipe");
                    return Ok(IpcStream::from_pipe_client(client));
                }
                Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY as i32) => {}
                Err(e) => {
                    return Err(TransportError::Connect {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            }
            tokio::time::sleep(PIPE_BUSY_BACKOFF).await;
        }
    }

    /// The pipe name this listener serves.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
