use std::ffi::OsString;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use ipclink_transport::{connect, Endpoint};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::channel::{channel_path, validate_channel, InvalidChannel};
use crate::error::{ClientError, ClientResult};
use crate::ENDPOINT_ENV_VAR;

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Return the response body untouched instead of parsing it as JSON.
    pub disable_marshalling: bool,
}

impl CallOptions {
    /// Options for a call whose response is returned as raw bytes.
    pub fn raw() -> Self {
        Self {
            disable_marshalling: true,
        }
    }
}

/// Successful response of [`IpcClient::call`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallResponse {
    Json(Value),
    Raw(Bytes),
}

impl CallResponse {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }
}

/// Client bound to one channel on one endpoint.
///
/// Holds no connection: every call connects, sends one `POST /<channel>`,
/// reads the full response, and closes. Calls are never retried and no
/// timeout is applied.
#[derive(Debug, Clone)]
pub struct IpcClient {
    channel: String,
    endpoint: Endpoint,
}

impl IpcClient {
    /// Create a client for `channel` on an explicit endpoint.
    pub fn new(channel: impl Into<String>, endpoint: impl Into<Endpoint>) -> ClientResult<Self> {
        let channel = channel.into();
        validate_channel(&channel)?;
        Ok(Self {
            channel,
            endpoint: endpoint.into(),
        })
    }

    /// Create a client, taking the endpoint from `endpoint` or else from
    /// the `IPCLINK_HANDLE` environment variable.
    pub fn from_env(
        channel: impl Into<String>,
        endpoint: Option<Endpoint>,
    ) -> ClientResult<Self> {
        let endpoint = resolve_client_endpoint(endpoint, |key| std::env::var_os(key))?;
        Self::new(channel, endpoint)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send `payload` as JSON and return the response.
    pub async fn call(&self, payload: &Value, options: CallOptions) -> ClientResult<CallResponse> {
        let body = serde_json::to_vec(payload).map_err(ClientError::Serialization)?;
        self.call_encoded(body, options).await
    }

    /// Send an already-encoded body verbatim.
    pub async fn call_encoded(
        &self,
        body: Vec<u8>,
        options: CallOptions,
    ) -> ClientResult<CallResponse> {
        let response = self.exchange(body).await?;
        if options.disable_marshalling {
            return Ok(CallResponse::Raw(response));
        }
        serde_json::from_slice(&response)
            .map(CallResponse::Json)
            .map_err(ClientError::Deserialization)
    }

    /// Typed call: serialize `payload`, deserialize the response into `Resp`.
    pub async fn request<Req, Resp>(&self, payload: &Req) -> ClientResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(payload).map_err(ClientError::Serialization)?;
        let response = self.exchange(body).await?;
        serde_json::from_slice(&response).map_err(ClientError::Deserialization)
    }

    /// One connect/write/read cycle. Returns the body of a 200 response.
    async fn exchange(&self, body: Vec<u8>) -> ClientResult<Bytes> {
        let stream = connect(&self.endpoint).await?;
        let (mut sender, connection) =
            http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!(error = %err, "client connection closed with error");
            }
        });

        let request = Request::post(channel_path(&self.channel))
            .header(HOST, "localhost")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|_| InvalidChannel {
                channel: self.channel.clone(),
                reason: "cannot be encoded as a request path",
            })?;

        debug!(channel = %self.channel, endpoint = %self.endpoint, "sending ipc call");
        let response = sender.send_request(request).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::BadStatus(status.as_u16()));
        }

        Ok(response.into_body().collect().await?.to_bytes())
    }
}

/// Pick the client endpoint: `explicit` first, then `IPCLINK_HANDLE` from `lookup`.
pub fn resolve_client_endpoint(
    explicit: Option<Endpoint>,
    lookup: impl Fn(&str) -> Option<OsString>,
) -> ClientResult<Endpoint> {
    if let Some(endpoint) = explicit {
        return Ok(endpoint);
    }
    lookup(ENDPOINT_ENV_VAR)
        .filter(|value| !value.is_empty())
        .map(|value| Endpoint::new(value))
        .ok_or(ClientError::MissingEndpoint)
}
