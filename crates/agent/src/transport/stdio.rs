//! Newline-delimited JSON-RPC over a child process's stdin/stdout.

use super::McpTransport;
use crate::config::ServerCommand;
use crate::error::{AgentError, AgentResult};
use futures_util::{SinkExt, StreamExt};
use mcpbridge_mcp::protocol::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Upper bound for a single JSON-RPC line
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// How long a server gets to exit on its own after stdin is closed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type LineSink = FramedWrite<BoxedWriter, LinesCodec>;

/// Callers waiting for a response, keyed by request id
#[derive(Default)]
struct Pending {
    waiters: Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<JsonRpcResponse>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, id: u64, sender: oneshot::Sender<JsonRpcResponse>) {
        self.lock().insert(id, sender);
    }

    fn take(&self, id: u64) -> Option<oneshot::Sender<JsonRpcResponse>> {
        self.lock().remove(&id)
    }

    /// Drop every waiter; their receivers observe a closed channel
    fn clear(&self) -> usize {
        let mut waiters = self.lock();
        let count = waiters.len();
        waiters.clear();
        count
    }
}

/// State shared between callers and the background reader task
struct Shared {
    writer: AsyncMutex<Option<LineSink>>,
    pending: Pending,
    closed: AtomicBool,
    /// Bound on every request and every write to the server
    timeout: Duration,
}

impl Shared {
    async fn send(&self, message: &impl Serialize) -> AgentResult<()> {
        let line = serde_json::to_string(message)?;
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(AgentError::ConnectionClosed)?;

        sink.send(line).await.map_err(|e| match e {
            LinesCodecError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                AgentError::ConnectionClosed
            }
            LinesCodecError::Io(e) => AgentError::Io(e),
            LinesCodecError::MaxLineLengthExceeded => {
                AgentError::Protocol("Outgoing message exceeds line limit".to_string())
            }
        })
    }

    fn dispatch_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.as_u64() else {
            warn!(id = %response.id, "Ignoring response with unexpected id");
            return;
        };

        match self.pending.take(id) {
            Some(waiter) => {
                // The caller may have given up already
                let _ = waiter.send(response);
            }
            None => debug!(id, "Response for unknown or expired request"),
        }
    }

    /// Send without holding up the caller, giving up once the timeout elapses
    fn send_detached<T>(self: &Arc<Self>, message: T, what: &'static str)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let shared = self.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(shared.timeout, shared.send(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, what, "Failed to send message"),
                Err(_) => warn!(what, "Gave up sending message to MCP server"),
            }
        });
    }

    fn handle_server_request(self: &Arc<Self>, request: JsonRpcRequest) {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Server notification");
            return;
        };

        let response = match request.method.as_str() {
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            other => {
                debug!(method = other, "Rejecting unsupported server request");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        };

        self.send_detached(response, "server request reply");
    }
}

/// JSON-RPC transport over a pair of byte streams, normally a spawned server's pipes.
///
/// Requests may be issued concurrently; a background task routes each
/// response to the caller waiting on its id.
pub struct StdioTransport {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    child: AsyncMutex<Option<Child>>,
}

impl StdioTransport {
    /// Launch the server process and connect to its stdin/stdout.
    pub fn spawn(command: &ServerCommand, timeout: Duration) -> AgentResult<Self> {
        let mut cmd = Command::new(&command.command);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: command.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Protocol("Server stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Protocol("Server stdout is not piped".to_string()))?;

        info!(
            command = %command.command,
            args = ?command.args,
            pid = ?child.id(),
            "Spawned MCP server"
        );

        Ok(Self::build(stdout, stdin, timeout, Some(child)))
    }

    /// Wrap an existing pair of streams. Must be called inside a Tokio runtime.
    pub fn from_streams<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::build(reader, writer, timeout, None)
    }

    fn build<R, W>(reader: R, writer: W, timeout: Duration, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        let shared = Arc::new(Shared {
            writer: AsyncMutex::new(Some(FramedWrite::new(writer, LinesCodec::new()))),
            pending: Pending::default(),
            closed: AtomicBool::new(false),
            timeout,
        });

        let reader = tokio::spawn(read_loop(shared.clone(), reader));

        Self {
            shared,
            next_id: AtomicU64::new(1),
            reader,
            child: AsyncMutex::new(child),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn cancel(&self, id: u64, method: &str) {
        let notification = JsonRpcRequest::notification(
            "notifications/cancelled",
            Some(serde_json::json!({
                "requestId": id,
                "reason": format!("{} timed out after {:?}", method, self.shared.timeout),
            })),
        );
        self.shared.send_detached(notification, "cancellation");
    }

    fn timed_out(&self, method: &str) -> AgentError {
        AgentError::Timeout {
            method: method.to_string(),
            after: self.shared.timeout,
        }
    }
}

#[async_trait::async_trait]
impl McpTransport for StdioTransport {
    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> AgentResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);

        // The reader sets `closed` before draining, so a waiter inserted
        // after the drain is caught here.
        if self.is_closed() {
            self.shared.pending.take(id);
            return Err(AgentError::ConnectionClosed);
        }

        debug!(id, method, "Sending request");
        let request = JsonRpcRequest::new(id, method, params);
        // The write counts against the timeout too: a server that stops
        // reading its stdin blocks it.
        let exchange = async {
            self.shared.send(&request).await?;
            let response = rx.await.map_err(|_| AgentError::ConnectionClosed)?;
            Ok::<_, AgentError>(response)
        };

        match tokio::time::timeout(self.shared.timeout, exchange).await {
            Ok(Ok(response)) => response.into_result().map_err(AgentError::from),
            Ok(Err(e)) => {
                self.shared.pending.take(id);
                Err(e)
            }
            Err(_) => {
                self.shared.pending.take(id);
                warn!(id, method, "Request timed out");
                self.cancel(id, method);
                Err(self.timed_out(method))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> AgentResult<()> {
        if self.is_closed() {
            return Err(AgentError::ConnectionClosed);
        }
        debug!(method, "Sending notification");
        let notification = JsonRpcRequest::notification(method, params);
        tokio::time::timeout(self.shared.timeout, self.shared.send(&notification))
            .await
            .map_err(|_| self.timed_out(method))?
    }

    async fn close(&self) -> AgentResult<()> {
        self.shared.closed.store(true, Ordering::SeqCst);

        // Dropping the sink closes the server's stdin. Unsent bytes are
        // discarded; a stuck writer only delays this until its own timeout.
        match tokio::time::timeout(SHUTDOWN_GRACE, self.shared.writer.lock()).await {
            Ok(mut writer) => drop(writer.take()),
            Err(_) => warn!("Writer still busy, leaving server stdin open"),
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "MCP server exited"),
                Ok(Err(e)) => warn!(error = %e, "Failed to wait for MCP server"),
                Err(_) => {
                    warn!("MCP server did not exit in time, killing it");
                    child.kill().await?;
                }
            }
        }

        self.reader.abort();
        self.shared.pending.clear();
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(shared: Arc<Shared>, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_BYTES));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(limit = MAX_MESSAGE_BYTES, "Discarded oversized message from MCP server");
                continue;
            }
            Err(LinesCodecError::Io(e)) => {
                warn!(error = %e, "Failed to read from MCP server");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcMessage>(&line) {
            Ok(JsonRpcMessage::Response(response)) => shared.dispatch_response(response),
            Ok(JsonRpcMessage::Request(request)) => shared.handle_server_request(request),
            Err(e) => warn!(error = %e, "Ignoring malformed message from MCP server"),
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    let dropped = shared.pending.clear();
    info!(pending = dropped, "MCP server connection closed");
}
