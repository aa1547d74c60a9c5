//! HTTP+SSE session transport for MCP server communication.
//!
//! Opens a long-lived GET whose SSE stream first announces a
//! session-specific message URL (`event: endpoint`) and then carries
//! JSON-RPC responses (`event: message`). Requests are POSTed to the message
//! URL; a background reader task dispatches each response frame to the
//! pending request with the matching id. A session is valid only while its
//! originating stream stays open — once the reader exits, every pending and
//! future request on the session fails and a fresh session must be opened.

use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::sse::{FrameParser, SseFrame};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// MCP protocol version we speak, sent on every request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const ACCEPT_VALUE: &str = "application/json, text/event-stream";

/// Read budget while scanning for the `event: endpoint` frame. Bounds the
/// cost of a server that talks but never names its session endpoint.
const ENDPOINT_READ_BUDGET: usize = 8192;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>>;

/// Factory for live MCP sessions.
#[derive(Clone)]
pub struct SseTransport {
    http: reqwest::Client,
}

impl SseTransport {
    pub fn new() -> Result<Self, TransportError> {
        // No global timeout: the SSE stream is long-lived by design. Each
        // POST and each response wait is bounded individually.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { http })
    }

    /// Turn a server configuration into a live bidirectional channel.
    pub async fn open_session(&self, config: &ServerConfig) -> Result<Session, TransportError> {
        let timeout = config.timeout();

        let mut request = self
            .http
            .get(&config.endpoint_url)
            .header(ACCEPT, ACCEPT_VALUE)
            .header("MCP-Protocol-Version", PROTOCOL_VERSION);
        if let Some(token) = config.bearer() {
            request = request.bearer_auth(token);
        }

        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(status.as_u16()));
        }

        let mut stream: ByteStream = Box::pin(response.bytes_stream());
        let mut parser = FrameParser::new();

        let (endpoint, held_frames) = tokio::time::timeout(
            timeout,
            read_endpoint(&mut stream, &mut parser, ENDPOINT_READ_BUDGET),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        })??;

        let message_url = resolve_message_url(&config.endpoint_url, &endpoint)?;
        tracing::debug!("MCP session established, message URL {message_url}");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(dispatch_responses(
            stream,
            parser,
            held_frames,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Ok(Session {
            http: self.http.clone(),
            message_url,
            bearer: config.bearer().map(str::to_owned),
            pending,
            closed,
            reader,
            timeout,
        })
    }
}

/// A live MCP session: the still-open SSE stream (drained by a background
/// reader task) paired with its derived message-submission URL.
pub struct Session {
    http: reqwest::Client,
    message_url: Url,
    bearer: Option<String>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    timeout: Duration,
}

impl Session {
    pub fn message_url(&self) -> &str {
        self.message_url.as_str()
    }

    /// Send a JSON-RPC request and wait for the correlated response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, TransportError> {
        match self.send_and_wait(method, params, self.timeout).await? {
            Some(response) => Ok(response),
            None => Err(TransportError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Best-effort request: waits up to `wait` for the correlated response
    /// and tolerates its absence. Some servers never frame the `initialize`
    /// response distinctly, so a missing response is not an error here.
    pub async fn request_lenient(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        wait: Duration,
    ) -> Result<Option<JsonRpcResponse>, TransportError> {
        self.send_and_wait(method, params, wait).await
    }

    /// Send a JSON-RPC notification (fire-and-forget, no id).
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), TransportError> {
        let notification = JsonRpcNotification::new(method, params);
        self.post(serde_json::to_string(&notification)?).await
    }

    async fn send_and_wait(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        wait: Duration,
    ) -> Result<Option<JsonRpcResponse>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let id = Uuid::new_v4().to_string();
        let request = JsonRpcRequest::new(id.clone(), method, params);
        let body = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        if let Err(e) = self.post(body).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(response)) => Ok(Some(response)),
            // Sender dropped: the reader task exited and failed all waiters.
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Ok(None)
            }
        }
    }

    async fn post(&self, body: String) -> Result<(), TransportError> {
        let mut request = self
            .http
            .post(self.message_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_VALUE)
            .header("MCP-Protocol-Version", PROTOCOL_VERSION)
            .timeout(self.timeout);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(status.as_u16()));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Scan the fresh SSE stream for the `event: endpoint` frame announcing the
/// session's message-submission path.
///
/// Frames decoded from the same chunk after the endpoint frame are returned
/// alongside it so the reader task can still deliver them.
async fn read_endpoint<S, E>(
    stream: &mut S,
    parser: &mut FrameParser,
    budget: usize,
) -> Result<(String, Vec<SseFrame>), TransportError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut seen = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TransportError::Network(e.to_string()))?;
        let mut frames = parser.feed(&chunk)?.into_iter();
        for frame in frames.by_ref() {
            if frame.event.as_deref() == Some("endpoint") {
                return Ok((frame.data.trim().to_string(), frames.collect()));
            }
        }
        seen += chunk.len();
        if seen >= budget {
            break;
        }
    }
    Err(TransportError::NoEndpoint)
}

/// Resolve the session-relative endpoint against the scheme/host/port of the
/// configured base URL, stripping the well-known `/sse` suffix first.
fn resolve_message_url(base: &str, endpoint: &str) -> Result<Url, TransportError> {
    let base = base.trim().strip_suffix("/sse").unwrap_or(base.trim());
    let base_url = Url::parse(base).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    if !base_url.has_host() {
        return Err(TransportError::InvalidUrl(format!("no host in {base}")));
    }

    let endpoint = endpoint.trim();
    let path = if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    };

    let mut origin = format!("{}://{}", base_url.scheme(), base_url.host_str().unwrap_or_default());
    if let Some(port) = base_url.port() {
        origin.push_str(&format!(":{port}"));
    }

    Url::parse(&format!("{origin}{path}")).map_err(|e| TransportError::InvalidUrl(e.to_string()))
}

/// Reader loop: feed the open stream through the frame parser and hand each
/// `event: message` JSON-RPC response to the waiter registered under its id.
/// Responses for ids nobody is waiting on are discarded. `held_frames` are
/// frames the endpoint scan already decoded past the endpoint frame; they
/// are delivered before any further reading.
async fn dispatch_responses<S, E>(
    mut stream: S,
    mut parser: FrameParser,
    held_frames: Vec<SseFrame>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
) where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    for frame in held_frames {
        deliver_frame(frame, &pending).await;
    }

    'read: while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("MCP session stream error: {e}");
                break;
            }
        };
        let frames = match parser.feed(&chunk) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("MCP session stream unreadable: {e}");
                break 'read;
            }
        };
        for frame in frames {
            deliver_frame(frame, &pending).await;
        }
    }

    // Stream over: fail every outstanding waiter by dropping its sender.
    closed.store(true, Ordering::Release);
    pending.lock().await.clear();
}

async fn deliver_frame(frame: SseFrame, pending: &PendingMap) {
    if frame.event.as_deref() != Some("message") {
        return;
    }
    let response: JsonRpcResponse = match serde_json::from_str(&frame.data) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to parse MCP response frame: {e}");
            return;
        }
    };
    // Server-initiated notifications carry no id and are ignored.
    let Some(id) = response.id_string() else {
        return;
    };
    let mut pending = pending.lock().await;
    if let Some(tx) = pending.remove(&id) {
        let _ = tx.send(response);
    } else {
        tracing::debug!("Discarding response for unknown id {id}");
    }
}
