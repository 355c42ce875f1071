//! JSON-RPC control client for NZBGet.
//!
//! NZBGet exposes its API at `scheme://host:port/user:password/jsonrpc`.
//! The guard only needs two parameterless methods, both answering with a
//! boolean result:
//!
//! ```text
//! -> {"jsonrpc":"2.0","method":"pausedownload","params":[],"id":1}
//! <- {"version":"1.1","id":1,"result":true}
//! ```
//!
//! One call is exactly one HTTP round trip; there are no retries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{Credentials, NzbGetConfig};
use crate::error::{GuardError, Result};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Remote action the controller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PauseDownload,
    ResumeDownload,
}

impl Action {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Action::PauseDownload => "pausedownload",
            Action::ResumeDownload => "resumedownload",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: [Value; 0],
    pub id: u64,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params: [],
            id,
        }
    }
}

/// Response envelope. NZBGet answers with `"version":"1.1"` rather than
/// `"jsonrpc":"2.0"`, so neither marker is checked.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Reduce the envelope to the boolean acknowledgment.
    pub fn into_bool(self) -> Result<bool> {
        if let Some(err) = self.error {
            return Err(GuardError::Protocol(format!(
                "remote error: {}",
                describe_remote_error(&err)
            )));
        }
        match self.result {
            Some(Value::Bool(ack)) => Ok(ack),
            Some(other) => Err(GuardError::Protocol(format!(
                "expected boolean result, got {other}"
            ))),
            None => Err(GuardError::Protocol("response has no result".to_string())),
        }
    }
}

fn describe_remote_error(err: &Value) -> String {
    let code = err.get("code").and_then(Value::as_i64);
    let message = err.get("message").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => format!("{message} (code {code})"),
        (None, Some(message)) => message.to_string(),
        _ => err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sends pause/resume actions to the download manager.
#[async_trait::async_trait]
pub trait RemoteControlClient: Send + Sync {
    /// Perform `action` and return the remote acknowledgment.
    async fn call(&self, action: Action) -> Result<bool>;
}

/// reqwest-backed NZBGet client.
pub struct NzbGetClient {
    client: reqwest::Client,
    /// Full URL including credentials. Never logged.
    endpoint: String,
    /// `host:port`, safe to log.
    target: String,
    next_id: AtomicU64,
}

impl NzbGetClient {
    pub fn new(config: &NzbGetConfig, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, config, credentials))
    }

    pub fn with_client(
        client: reqwest::Client,
        config: &NzbGetConfig,
        credentials: &Credentials,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint_url(config, credentials),
            target: format!("{}:{}", config.host, config.port),
            next_id: AtomicU64::new(1),
        }
    }

    /// `host:port` of the remote service.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Debug for NzbGetClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NzbGetClient")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// `scheme://host:port/user:password/jsonrpc`
pub fn endpoint_url(config: &NzbGetConfig, credentials: &Credentials) -> String {
    format!(
        "{}://{}:{}/{}:{}/jsonrpc",
        config.scheme(),
        config.host,
        config.port,
        credentials.user,
        credentials.password
    )
}

#[async_trait::async_trait]
impl RemoteControlClient for NzbGetClient {
    async fn call(&self, action: Action) -> Result<bool> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(action.method(), id);
        debug!(target_addr = %self.target, method = action.method(), id, "sending JSON-RPC request");

        // reqwest errors carry the URL, which carries the password.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| GuardError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GuardError::Protocol(format!(
                "{} returned HTTP {status}",
                self.target
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GuardError::Network(e.without_url()))?;
        let envelope: RpcResponse = serde_json::from_slice(&body)
            .map_err(|e| GuardError::Protocol(format!("error decoding client response: {e}")))?;

        let ack = envelope.into_bool()?;
        debug!(target_addr = %self.target, method = action.method(), id, ack, "JSON-RPC response");
        Ok(ack)
    }
}
