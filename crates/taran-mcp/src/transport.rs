//! Transport bindings for tool-server communication.
//!
//! Three variants behind one enum, selected at construction time:
//!
//! - **Stdio** — spawn a child process, JSON-RPC with Content-Length framing
//!   over stdin/stdout.
//! - **Sse** — persistent HTTP event-stream: a GET holds the stream open,
//!   the first `endpoint` event names a POST-back URL, responses arrive as
//!   `message` events.
//! - **Http** — request/response: each message is POSTed; the reply body is
//!   plain JSON or a short event-stream carrying the response.
//!
//! Stdio and Sse reads happen on a dedicated reader thread that forwards
//! parsed messages over a channel. Receives are therefore always bounded by
//! `recv_timeout`, and killing the underlying process or stream while a read
//! is in flight ends with channel disconnection instead of a hang.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the request/response HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// URL of the server endpoint.
    pub url: String,
    /// Number of retries for failed requests.
    pub retries: u32,
    /// Extra headers to send with each request.
    pub headers: Vec<(String, String)>,
}

impl HttpOptions {
    /// Create options with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            retries: 3,
            headers: Vec::new(),
        }
    }

    /// Set the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Configuration for the persistent event-stream transport.
#[derive(Debug, Clone)]
pub struct SseOptions {
    /// URL of the event-stream endpoint.
    pub url: String,
    /// How long to wait for the stream to open and announce its endpoint.
    pub open_timeout: Duration,
    /// Extra headers to send on both the stream GET and the POST-backs.
    pub headers: Vec<(String, String)>,
}

impl SseOptions {
    /// Create options with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            open_timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }

    /// Set the open timeout.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Transport for communicating with a tool server.
pub enum Transport {
    /// Stdio transport - communicates with a child process via stdin/stdout.
    Stdio {
        /// The child process.
        child: Child,
        /// Buffered writer to stdin.
        stdin: BufWriter<ChildStdin>,
        /// Messages parsed off stdout by the reader thread.
        incoming: mpsc::Receiver<Value>,
        /// Reader thread handle, joined on shutdown.
        reader: Option<thread::JoinHandle<()>>,
    },
    /// Persistent event-stream transport.
    Sse {
        /// Client for POSTing requests back to the server.
        client: reqwest::blocking::Client,
        /// POST-back endpoint announced by the stream.
        endpoint: String,
        /// Extra request headers.
        headers: Vec<(String, String)>,
        /// Messages parsed off the event stream by the reader thread.
        incoming: mpsc::Receiver<Value>,
        /// Reader thread handle. Not joined on shutdown: the thread exits
        /// when the stream yields its next event or the server closes it.
        reader: Option<thread::JoinHandle<()>>,
        /// Set on shutdown so the reader stops forwarding.
        closed: Arc<AtomicBool>,
    },
    /// Request/response HTTP transport.
    Http {
        /// HTTP client (shared for connection pooling).
        client: reqwest::blocking::Client,
        /// Transport configuration.
        options: HttpOptions,
    },
}

impl Transport {
    /// Spawn a new stdio transport.
    ///
    /// # Arguments
    /// * `command` - The command to spawn (e.g., "mcp-server-git")
    /// * `args` - Arguments to pass to the command
    /// * `env` - Optional environment variables to set
    pub fn spawn_stdio(
        command: &str,
        args: &[String],
        env: Option<&[(String, String)]>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()); // Let stderr pass through for debugging

        if let Some(env_vars) = env {
            for (key, value) in env_vars {
                cmd.env(key, value);
            }
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::spawn(format!("failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn("failed to capture stdin"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn("failed to capture stdout"))?;

        let (tx, incoming) = mpsc::channel();
        let reader = thread::spawn(move || frame_read_loop(BufReader::new(stdout), tx));

        tracing::info!(command, "spawned stdio tool server");

        Ok(Self::Stdio {
            child,
            stdin: BufWriter::new(stdin),
            incoming,
            reader: Some(reader),
        })
    }

    /// Open a persistent event-stream transport.
    ///
    /// Blocks until the stream is established and the server has announced
    /// its POST-back endpoint, bounded by `options.open_timeout`.
    pub fn connect_sse(options: SseOptions) -> Result<Self> {
        let base = url::Url::parse(&options.url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;

        // The stream GET must not carry a whole-request timeout or the
        // stream would be cut after it elapses; only the connect is bounded.
        let stream_client = reqwest::blocking::Client::builder()
            .connect_timeout(options.open_timeout)
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        let mut req = stream_client
            .get(&options.url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        for (key, value) in &options.headers {
            req = req.header(key, value);
        }

        let response = req
            .send()
            .map_err(|e| McpError::transport(format!("failed to open event stream: {}", e)))?;

        if !response.status().is_success() {
            return Err(McpError::transport(format!(
                "event stream rejected with HTTP {}",
                response.status()
            )));
        }

        let (tx, incoming) = mpsc::channel();
        let (endpoint_tx, endpoint_rx) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = Arc::clone(&closed);
        let reader = thread::spawn(move || {
            sse_read_loop(BufReader::new(response), tx, endpoint_tx, reader_closed)
        });

        let announced = endpoint_rx
            .recv_timeout(options.open_timeout)
            .map_err(|_| {
                McpError::transport("event stream produced no endpoint event within the timeout")
            })?;

        let endpoint = base
            .join(&announced)
            .map_err(|e| McpError::transport(format!("invalid endpoint '{}': {}", announced, e)))?
            .to_string();

        let client = reqwest::blocking::Client::builder()
            .connect_timeout(options.open_timeout)
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(url = %options.url, endpoint = %endpoint, "opened event-stream transport");

        Ok(Self::Sse {
            client,
            endpoint,
            headers: options.headers,
            incoming,
            reader: Some(reader),
            closed,
        })
    }

    /// Create a request/response HTTP transport.
    pub fn connect_http(options: HttpOptions) -> Result<Self> {
        let _parsed = url::Url::parse(&options.url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;

        let client = reqwest::blocking::Client::builder()
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(url = %options.url, "created HTTP transport");

        Ok(Self::Http { client, options })
    }

    /// Send a JSON-RPC request and wait for its correlated response.
    ///
    /// Every variant bounds the wait by `timeout` and fails with
    /// [`McpError::Timeout`] instead of hanging.
    pub fn send_request(
        &mut self,
        request: &JsonRpcRequest,
        timeout: Duration,
    ) -> Result<JsonRpcResponse> {
        match self {
            Self::Stdio {
                stdin, incoming, ..
            } => {
                write_frame(stdin, &serde_json::to_value(request)?)?;
                await_response(incoming, request.id, timeout)
            }
            Self::Sse {
                client,
                endpoint,
                headers,
                incoming,
                ..
            } => {
                post_message(
                    client,
                    endpoint,
                    headers,
                    &serde_json::to_string(request)?,
                    timeout,
                )?;
                await_response(incoming, request.id, timeout)
            }
            Self::Http { client, options } => http_roundtrip(client, options, request, timeout),
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub fn send_notification(
        &mut self,
        notification: &JsonRpcNotification,
        timeout: Duration,
    ) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        match self {
            Self::Stdio { stdin, .. } => write_frame(stdin, &serde_json::to_value(notification)?),
            Self::Sse {
                client,
                endpoint,
                headers,
                ..
            } => post_message(client, endpoint, headers, &json, timeout),
            Self::Http { client, options } => {
                // Response is ignored; a failed notification is not fatal.
                let mut req = client
                    .post(&options.url)
                    .body(json)
                    .timeout(timeout)
                    .header(reqwest::header::CONTENT_TYPE, "application/json");
                for (key, value) in &options.headers {
                    req = req.header(key, value);
                }
                let _ = req.send();
                Ok(())
            }
        }
    }

    /// Shutdown the transport, releasing the process or socket.
    ///
    /// Safe to call while a read is in flight: the reader thread observes
    /// EOF or the closed flag and exits; pending receives see a
    /// disconnected channel.
    pub fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Stdio { child, reader, .. } => {
                let _ = child.kill();
                let _ = child.wait();
                // Reader sees EOF once the child is gone.
                if let Some(handle) = reader.take() {
                    let _ = handle.join();
                }
                Ok(())
            }
            Self::Sse { closed, reader, .. } => {
                closed.store(true, Ordering::SeqCst);
                // The blocking stream read cannot be interrupted from here;
                // the thread exits at the next event or when the server
                // closes the stream. Detach rather than join.
                drop(reader.take());
                Ok(())
            }
            Self::Http { .. } => Ok(()),
        }
    }

    /// Check if the transport is still connected.
    pub fn is_connected(&mut self) -> bool {
        match self {
            Self::Stdio { child, .. } => matches!(child.try_wait(), Ok(None)),
            Self::Sse { closed, reader, .. } => {
                !closed.load(Ordering::SeqCst)
                    && reader.as_ref().is_some_and(|h| !h.is_finished())
            }
            // Stateless; always "connected".
            Self::Http { .. } => true,
        }
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Self::Stdio { .. })
    }

    /// Check if this is an event-stream transport.
    pub fn is_sse(&self) -> bool {
        matches!(self, Self::Sse { .. })
    }

    /// Check if this is a request/response HTTP transport.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

/// Write one Content-Length framed message.
fn write_frame(writer: &mut impl Write, message: &Value) -> Result<()> {
    let json = serde_json::to_string(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", json.len())?;
    write!(writer, "{}", json)?;
    writer.flush()?;

    tracing::trace!(content_length = json.len(), json = %json, "sent message");
    Ok(())
}

/// Read one Content-Length framed message body. `Ok(None)` signals EOF.
fn read_frame(reader: &mut impl BufRead) -> std::io::Result<Option<String>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = len_str.trim().parse().ok();
        }
    }

    let Some(content_length) = content_length else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing Content-Length header",
        ));
    };

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Reader loop for framed stdio streams.
fn frame_read_loop(mut reader: impl BufRead, tx: mpsc::Sender<Value>) {
    loop {
        match read_frame(&mut reader) {
            Ok(Some(body)) => match serde_json::from_str::<Value>(&body) {
                Ok(value) => {
                    tracing::trace!(json = %body, "received message");
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "discarding unparsable frame"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::trace!(error = %e, "frame reader stopping");
                break;
            }
        }
    }
}

/// Reader loop for SSE streams.
///
/// Forwards `message` events as parsed JSON and announces the first
/// `endpoint` event over `endpoint_tx`.
fn sse_read_loop(
    reader: impl BufRead,
    tx: mpsc::Sender<Value>,
    endpoint_tx: mpsc::Sender<String>,
    closed: Arc<AtomicBool>,
) {
    let mut event_name = String::new();
    let mut data = String::new();

    for line in reader.lines() {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::trace!(error = %e, "event stream reader stopping");
                break;
            }
        };

        if line.is_empty() {
            // Blank line terminates one event.
            if !data.is_empty() {
                if event_name == "endpoint" {
                    let _ = endpoint_tx.send(data.clone());
                } else {
                    match serde_json::from_str::<Value>(&data) {
                        Ok(value) => {
                            tracing::trace!(json = %data, "received event");
                            if tx.send(value).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "discarding unparsable event"),
                    }
                }
            }
            event_name.clear();
            data.clear();
        } else if let Some(value) = line.strip_prefix("event:") {
            event_name = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.trim_start());
        }
        // Comment and id fields are ignored.
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlation
// ─────────────────────────────────────────────────────────────────────────────

/// Wait for the response matching `id`, bounded by `timeout`.
///
/// Uncorrelated messages (server notifications, stale responses) are
/// skipped; they do not extend the deadline.
fn await_response(
    incoming: &mpsc::Receiver<Value>,
    id: u64,
    timeout: Duration,
) -> Result<JsonRpcResponse> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .ok_or(McpError::Timeout(timeout))?;

        match incoming.recv_timeout(remaining) {
            Ok(value) => {
                if value.get("id").and_then(Value::as_u64) == Some(id) {
                    return Ok(serde_json::from_value(value)?);
                }
                tracing::trace!(expected = id, "skipping uncorrelated message");
            }
            Err(RecvTimeoutError::Timeout) => return Err(McpError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => return Err(McpError::ConnectionClosed),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP helpers
// ─────────────────────────────────────────────────────────────────────────────

/// POST one message, checking only the status.
fn post_message(
    client: &reqwest::blocking::Client,
    url: &str,
    headers: &[(String, String)],
    json: &str,
    timeout: Duration,
) -> Result<()> {
    let mut req = client
        .post(url)
        .body(json.to_string())
        .timeout(timeout)
        .header(reqwest::header::CONTENT_TYPE, "application/json");
    for (key, value) in headers {
        req = req.header(key, value);
    }

    let response = req
        .send()
        .map_err(|e| McpError::transport(format!("POST failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(McpError::transport(format!(
            "POST rejected with HTTP {}",
            response.status()
        )));
    }
    Ok(())
}

/// POST a request and extract the correlated response, with bounded retries.
fn http_roundtrip(
    client: &reqwest::blocking::Client,
    options: &HttpOptions,
    request: &JsonRpcRequest,
    timeout: Duration,
) -> Result<JsonRpcResponse> {
    let json = serde_json::to_string(request)?;

    tracing::trace!(url = %options.url, json = %json, "sending HTTP request");

    let mut retries = options.retries;
    loop {
        let mut req = client
            .post(&options.url)
            .body(json.clone())
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::ACCEPT,
                "application/json, text/event-stream",
            );
        for (key, value) in &options.headers {
            req = req.header(key, value);
        }

        match req.send() {
            Ok(response) => {
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().unwrap_or_default();
                    return Err(McpError::transport(format!(
                        "HTTP error {}: {}",
                        status, body
                    )));
                }

                let streamed = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.starts_with("text/event-stream"));

                let body = response
                    .text()
                    .map_err(|e| McpError::transport(format!("failed to read body: {}", e)))?;

                tracing::trace!(json = %body, "received HTTP response");

                return if streamed {
                    extract_stream_response(&body, request.id)
                } else {
                    Ok(serde_json::from_str(&body)?)
                };
            }
            Err(e) => {
                if retries == 0 {
                    return Err(McpError::transport(format!("HTTP request failed: {}", e)));
                }
                retries -= 1;
                tracing::warn!(
                    error = %e,
                    retries_remaining = retries,
                    "HTTP request failed, retrying"
                );
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

/// Scan an event-stream body for the response matching `id`.
fn extract_stream_response(body: &str, id: u64) -> Result<JsonRpcResponse> {
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(data.trim_start()) {
                if response.id == id {
                    return Ok(response);
                }
            }
        }
    }
    Err(McpError::protocol(format!(
        "no correlated response in event stream (id {})",
        id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_nonexistent_command() {
        let result = Transport::spawn_stdio("nonexistent-tool-server-12345", &[], None);
        match result {
            Ok(_) => panic!("Expected spawn to fail"),
            Err(err) => assert!(matches!(err, McpError::Spawn(_))),
        }
    }

    #[test]
    fn test_spawn_with_args() {
        // 'cat' spawns fine; this only verifies process plumbing, not protocol.
        if cfg!(unix) {
            let mut transport = Transport::spawn_stdio("cat", &[], None).unwrap();
            assert!(transport.is_stdio());
            assert!(!transport.is_http());
            assert!(transport.is_connected());
            transport.shutdown().unwrap();
        }
    }

    #[test]
    fn test_http_options_builder() {
        let options = HttpOptions::new("http://localhost:8080/rpc")
            .with_retries(5)
            .with_header("Authorization", "Bearer token123");

        assert_eq!(options.url, "http://localhost:8080/rpc");
        assert_eq!(options.retries, 5);
        assert_eq!(
            options.headers,
            vec![("Authorization".to_string(), "Bearer token123".to_string())]
        );
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = Transport::connect_http(HttpOptions::new("http://localhost:8080/rpc"));
        assert!(transport.is_ok());
        let mut transport = transport.unwrap();
        assert!(transport.is_http());
        assert!(!transport.is_stdio());
        assert!(transport.is_connected());
        assert!(transport.shutdown().is_ok());
    }

    #[test]
    fn test_http_transport_invalid_url() {
        let result = Transport::connect_http(HttpOptions::new("not a valid url"));
        match result {
            Err(McpError::Transport(msg)) => assert!(msg.contains("invalid URL")),
            _ => panic!("Expected Transport error"),
        }
    }

    #[test]
    fn test_sse_invalid_url() {
        let result = Transport::connect_sse(SseOptions::new("::: nope :::"));
        assert!(matches!(result, Err(McpError::Transport(_))));
    }

    #[test]
    fn test_read_frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &serde_json::json!({"jsonrpc": "2.0", "id": 7})).unwrap();

        let mut reader = std::io::Cursor::new(buf);
        let body = read_frame(&mut reader).unwrap().unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["id"], 7);

        // Next read hits EOF.
        assert!(read_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_read_frame_missing_length() {
        let mut reader = std::io::Cursor::new(b"X-Other: 1\r\n\r\n{}".to_vec());
        assert!(read_frame(&mut reader).is_err());
    }

    #[test]
    fn test_await_response_timeout() {
        let (_tx, rx) = mpsc::channel::<Value>();
        let result = await_response(&rx, 1, Duration::from_millis(20));
        assert!(matches!(result, Err(McpError::Timeout(_))));
    }

    #[test]
    fn test_await_response_disconnected() {
        let (tx, rx) = mpsc::channel::<Value>();
        drop(tx);
        let result = await_response(&rx, 1, Duration::from_millis(20));
        assert!(matches!(result, Err(McpError::ConnectionClosed)));
    }

    #[test]
    fn test_await_response_skips_uncorrelated() {
        let (tx, rx) = mpsc::channel::<Value>();
        tx.send(serde_json::json!({"jsonrpc": "2.0", "method": "notifications/progress"}))
            .unwrap();
        tx.send(serde_json::json!({"jsonrpc": "2.0", "id": 9, "result": {}}))
            .unwrap();
        tx.send(serde_json::json!({"jsonrpc": "2.0", "id": 3, "result": {"hit": true}}))
            .unwrap();

        let response = await_response(&rx, 3, Duration::from_millis(200)).unwrap();
        assert_eq!(response.id, 3);
        assert_eq!(response.result.unwrap()["hit"], true);
    }

    #[test]
    fn test_extract_stream_response() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"n\":1}}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"n\":2}}\n\n";

        let response = extract_stream_response(body, 2).unwrap();
        assert_eq!(response.id, 2);
        assert_eq!(response.result.unwrap()["n"], 2);

        let missing = extract_stream_response(body, 42);
        assert!(matches!(missing, Err(McpError::Protocol(_))));
    }

    #[test]
    fn test_sse_read_loop_parses_events() {
        let stream = "event: endpoint\ndata: /messages?session=abc\n\n\
                      : keep-alive comment\n\
                      event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";

        let (tx, rx) = mpsc::channel();
        let (endpoint_tx, endpoint_rx) = mpsc::channel();
        sse_read_loop(
            std::io::Cursor::new(stream.as_bytes()),
            tx,
            endpoint_tx,
            Arc::new(AtomicBool::new(false)),
        );

        assert_eq!(endpoint_rx.try_recv().unwrap(), "/messages?session=abc");
        let message = rx.try_recv().unwrap();
        assert_eq!(message["id"], 1);
    }

    #[test]
    fn test_sse_read_loop_multiline_data() {
        let stream = "data: {\"jsonrpc\":\"2.0\",\ndata: \"id\":5,\"result\":{}}\n\n";

        let (tx, rx) = mpsc::channel();
        let (endpoint_tx, _endpoint_rx) = mpsc::channel();
        sse_read_loop(
            std::io::Cursor::new(stream.as_bytes()),
            tx,
            endpoint_tx,
            Arc::new(AtomicBool::new(false)),
        );

        let message = rx.try_recv().unwrap();
        assert_eq!(message["id"], 5);
    }
}
