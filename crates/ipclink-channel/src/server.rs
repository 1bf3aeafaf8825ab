//! Local request/response server.
//!
//! Binds a platform endpoint, accepts connections on a tokio task, and speaks
//! HTTP/1.1 on each one: `POST /<channel>` with a JSON body is routed to the
//! handler registered for `<channel>`.
//!
//! # Status mapping
//!
//! | Situation                    | Status |
//! |------------------------------|--------|
//! | handler returned a value     | 200 + JSON body |
//! | method other than `POST`     | 405 |
//! | malformed path / no handler  | 404 |
//! | body is not valid JSON       | 400 |
//! | handler failed               | 500, empty body |

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use ipclink_transport::{
    resolve_endpoint, Endpoint, EndpointCleanup, EndpointOptions, IpcListener, IpcStream,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{channel_from_path, validate_channel};
use crate::error::{ServerError, ServerResult};
use crate::handler::{erase, Handler};
use crate::registry::{HandlerRegistry, Registration};
use crate::ENDPOINT_ENV_VAR;

/// Pause after a failed accept so a persistent error does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// How a server picks and prepares its endpoint.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Context string hashed into the endpoint name. `None` picks a random one.
    pub context: Option<String>,
    /// Placement hints for the socket file.
    pub endpoint_options: EndpointOptions,
    /// Unix socket file mode. Defaults to `0o600`.
    pub socket_mode: Option<u32>,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_endpoint_options(mut self, options: EndpointOptions) -> Self {
        self.endpoint_options = options;
        self
    }

    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.endpoint_options.runtime_dir = Some(dir.into());
        self
    }

    pub fn with_socket_mode(mut self, mode: u32) -> Self {
        self.socket_mode = Some(mode);
        self
    }
}

struct Lifecycle {
    disposed: bool,
    shutdown_tx: Option<oneshot::Sender<()>>,
    accept_task: Option<JoinHandle<()>>,
    cleanup: EndpointCleanup,
}

/// A bound server. Lives until [`dispose`](Self::dispose) or drop.
pub struct IpcServer {
    endpoint: Endpoint,
    registry: HandlerRegistry,
    lifecycle: Mutex<Lifecycle>,
}

impl IpcServer {
    /// Resolve an endpoint from `config` and start listening on it.
    ///
    /// Must be called from within a tokio runtime; otherwise fails with
    /// [`ServerError::NoRuntime`] before anything is bound.
    pub fn bind(config: ServerConfig) -> ServerResult<Self> {
        let endpoint = resolve_endpoint(config.context.as_deref(), &config.endpoint_options)
            .map_err(ServerError::Endpoint)?;
        Self::bind_endpoint(endpoint, config.socket_mode)
    }

    /// Listen on an explicit endpoint.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind_endpoint(endpoint: Endpoint, socket_mode: Option<u32>) -> ServerResult<Self> {
        tokio::runtime::Handle::try_current().map_err(|_| ServerError::NoRuntime)?;
        let mut listener =
            IpcListener::bind_with_mode(&endpoint, socket_mode).map_err(ServerError::Bind)?;
        let cleanup = listener.take_cleanup();

        let registry = HandlerRegistry::default();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(listener, registry.clone(), shutdown_rx));

        info!(path = %endpoint, "ipc server listening");

        Ok(Self {
            endpoint,
            registry,
            lifecycle: Mutex::new(Lifecycle {
                disposed: false,
                shutdown_tx: Some(shutdown_tx),
                accept_task: Some(accept_task),
                cleanup,
            }),
        })
    }

    /// The endpoint clients connect to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Environment to hand to a child process so its client can find this server.
    pub fn get_env(&self) -> HashMap<String, String> {
        HashMap::from([(ENDPOINT_ENV_VAR.to_string(), self.endpoint.to_string())])
    }

    /// Bind `handler` to `channel`, replacing any handler already there.
    pub fn register_handler<H: Handler>(
        &self,
        channel: &str,
        handler: H,
    ) -> ServerResult<Registration> {
        validate_channel(channel)?;
        if self.is_disposed() {
            return Err(ServerError::Disposed);
        }
        Ok(self.registry.insert(channel, erase(handler)))
    }

    /// Remove the handler bound to `channel`, if any.
    pub fn unregister_handler(&self, channel: &str) -> bool {
        self.registry.remove(channel)
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_lifecycle().disposed
    }

    /// Stop listening and remove the endpoint file. Idempotent.
    ///
    /// Connections already being served are not drained.
    pub fn dispose(&self) {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.disposed {
            return;
        }
        lifecycle.disposed = true;

        if let Some(tx) = lifecycle.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = lifecycle.accept_task.take() {
            task.abort();
        }
        lifecycle.cleanup.remove();

        info!(path = %self.endpoint, "ipc server disposed");
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn accept_loop(
    listener: IpcListener,
    registry: HandlerRegistry,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!(path = %listener.endpoint(), "accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(serve_connection(stream, registry.clone()));
                }
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

async fn serve_connection(stream: IpcStream, registry: HandlerRegistry) {
    let service = service_fn(move |request: Request<Incoming>| {
        let registry = registry.clone();
        async move { Ok::<_, Infallible>(dispatch(&registry, request).await) }
    });

    if let Err(err) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!(error = %err, "connection closed with error");
    }
}

/// Route one request to its channel handler and build the response.
async fn dispatch(registry: &HandlerRegistry, request: Request<Incoming>) -> Response<Full<Bytes>> {
    if request.method() != Method::POST {
        warn!(
            method = %request.method(),
            path = request.uri().path(),
            "unsupported request method"
        );
        return status_response(StatusCode::METHOD_NOT_ALLOWED);
    }

    let Some(channel) = channel_from_path(request.uri().path()).map(str::to_owned) else {
        warn!(path = request.uri().path(), "request lacks a channel path");
        return status_response(StatusCode::NOT_FOUND);
    };

    let Some(handler) = registry.get(&channel) else {
        warn!(%channel, "ipc handler not found");
        return status_response(StatusCode::NOT_FOUND);
    };

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            debug!(%channel, error = %err, "failed to read request body");
            return status_response(StatusCode::BAD_REQUEST);
        }
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%channel, error = %err, "request body is not valid json");
            return status_response(StatusCode::BAD_REQUEST);
        }
    };

    match handler(payload).await {
        Ok(result) => match serde_json::to_vec(&result) {
            Ok(bytes) => json_response(bytes),
            Err(err) => {
                warn!(%channel, error = %err, "failed to serialize handler result");
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        Err(err) => {
            warn!(%channel, error = %err, "ipc handler failed");
            status_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn json_response(body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
