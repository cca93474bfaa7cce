//! Transport demultiplexer: message routing for concurrent Copilot CLI sessions.
//!
//! The Copilot CLI communicates over a **single TCP connection** using JSON-RPC 2.0,
//! while the orchestrator keeps one cached session per session configuration
//! (planner, each role model, ...). Several of them can be live at once when
//! runs share a session manager.
//!
//! [`MessageRouter`] runs a single background reader task that owns the TCP
//! read-half exclusively and routes incoming messages to the correct
//! [`SessionChannel`] by `sessionId`. Writes go through one mutex-guarded
//! writer, so request frames never interleave.

use crate::copilot::error::{CopilotError, Result};
use crate::copilot::protocol::{
    CreateSessionParams, JsonRpcErrorOut, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};
use crate::copilot::transport::{MessageKind, classify_message, is_user_input_request};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Timeout for session creation (waiting for the `session.start` event).
const SESSION_CREATE_TIMEOUT: Duration = Duration::from_secs(30);

type Routes = Arc<std::sync::RwLock<HashMap<String, mpsc::UnboundedSender<RoutedMessage>>>>;
/// `None` once the reader has stopped, so late requests fail instead of hanging.
type PendingResponses = Arc<RwLock<Option<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>>;
type SharedWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// A message routed to a specific session's channel.
#[derive(Debug)]
pub enum RoutedMessage {
    /// A `session.event` notification (delta, message, idle, ...).
    SessionEvent {
        event_type: String,
        event: serde_json::Value,
    },
    /// The CLI asked the user a question and is waiting for an answer.
    ///
    /// Nothing in an unattended run can answer, so the request stays open
    /// until the session is aborted or times out.
    InputRequested { request_id: u64, question: String },
}

#[derive(Debug)]
struct SessionStartEvent {
    session_id: String,
}

/// A per-session channel for receiving routed messages.
///
/// Each [`CopilotSession`](super::session::CopilotSession) owns a
/// `SessionChannel` for its lifetime. When dropped, the session is
/// deregistered from the router.
pub struct SessionChannel {
    rx: mpsc::UnboundedReceiver<RoutedMessage>,
    session_id: String,
    router: Arc<MessageRouter>,
}

impl SessionChannel {
    /// Receive the next routed message.
    ///
    /// Returns `None` once the background reader has ended. Cancel-safe.
    pub async fn recv(&mut self) -> Option<RoutedMessage> {
        self.rx.recv().await
    }

    /// Discard every message already buffered, returning how many were dropped.
    ///
    /// A reply can end with `assistant.message` while the matching
    /// `session.idle` is still in flight; draining before the next prompt keeps
    /// that idle from ending the next reply early.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(msg) = self.rx.try_recv() {
            trace!("Session {}: dropping stale {:?}", self.session_id, msg);
            dropped += 1;
        }
        dropped
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.router.deregister_session(&self.session_id);
    }
}

/// Central message router that demultiplexes a single TCP connection
/// across multiple concurrent Copilot sessions.
///
/// # Responsibilities
///
/// 1. **Spawn** the Copilot CLI process and establish a TCP connection.
/// 2. **Own** the TCP read-half in a background [`tokio::spawn`] task.
/// 3. **Route** `session.event` notifications by `sessionId` to per-session
///    [`SessionChannel`]s via `mpsc::UnboundedSender`.
/// 4. **Correlate** request/response pairs via `oneshot` channels.
/// 5. **Serialize** session creation through `create_lock` so that each
///    `session.start` event is matched with the right caller.
pub struct MessageRouter {
    reader_handle: JoinHandle<()>,

    /// Session-specific event channels (session_id -> sender).
    ///
    /// `std::sync::RwLock` so that [`deregister_session`](Self::deregister_session)
    /// can run synchronously from [`SessionChannel::drop`].
    routes: Routes,

    pending_responses: PendingResponses,

    session_start_rx: Mutex<mpsc::UnboundedReceiver<SessionStartEvent>>,

    create_lock: Mutex<()>,

    writer: SharedWriter,

    /// Copilot CLI child process (killed on Drop to prevent orphans).
    child: Option<Child>,
}

impl MessageRouter {
    /// Spawn `<command> --server` and build the router.
    pub async fn spawn(command: &str) -> Result<Arc<Self>> {
        debug!("Spawning Copilot CLI: {} --server", command);

        let mut cmd = Command::new(command);
        cmd.arg("--server")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // Linux: ask the kernel to SIGTERM the child when we die without
        // running Drop (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            CopilotError::SpawnError(std::io::Error::other("Failed to capture stdout"))
        })?;
        let port = Self::read_port(BufReader::new(stdout)).await?;

        info!("Copilot CLI listening on port {}, connecting...", port);
        let stream = TcpStream::connect(("127.0.0.1", port)).await?;

        Ok(Self::connect(stream, Some(child)))
    }

    /// Wait for the `CLI server listening on port N` banner.
    async fn read_port<R: AsyncRead + Unpin>(mut reader: BufReader<R>) -> Result<u16> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(CopilotError::UnexpectedResponse(
                    "Copilot CLI exited without announcing port".into(),
                ));
            }

            let trimmed = line.trim();
            debug!("Copilot CLI output: {}", trimmed);

            if let Some(port_str) = trimmed.strip_prefix("CLI server listening on port ") {
                return port_str.trim().parse::<u16>().map_err(|_| {
                    CopilotError::UnexpectedResponse(format!(
                        "Failed to parse port number: {}",
                        port_str
                    ))
                });
            }
        }
    }

    /// Build a router over an established connection.
    pub fn connect(stream: TcpStream, child: Option<Child>) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();

        let routes: Routes = Arc::new(std::sync::RwLock::new(HashMap::new()));
        let pending_responses: PendingResponses = Arc::new(RwLock::new(Some(HashMap::new())));
        let (session_start_tx, session_start_rx) = mpsc::unbounded_channel();
        let writer: SharedWriter = Arc::new(Mutex::new(BufWriter::new(write_half)));

        let reader_handle = tokio::spawn(Self::reader_loop(
            BufReader::new(read_half),
            Arc::clone(&routes),
            Arc::clone(&pending_responses),
            session_start_tx,
            Arc::clone(&writer),
        ));

        Arc::new(Self {
            reader_handle,
            routes,
            pending_responses,
            session_start_rx: Mutex::new(session_start_rx),
            create_lock: Mutex::new(()),
            writer,
            child,
        })
    }

    /// Background reader loop, single owner of the TCP read half.
    ///
    /// - **Response** → `pending_responses` oneshot
    /// - **Notification `session.start`** → `session_start_tx`
    /// - **Notification `session.event`** → `routes[sessionId]`
    /// - **Incoming request** → user-input requests are routed, anything
    ///   else is answered with "method not found"
    ///
    /// When the loop exits all senders are dropped, so every receiver
    /// observes the end of its stream.
    async fn reader_loop(
        mut reader: BufReader<OwnedReadHalf>,
        routes: Routes,
        pending_responses: PendingResponses,
        session_start_tx: mpsc::UnboundedSender<SessionStartEvent>,
        writer: SharedWriter,
    ) {
        loop {
            let body = match read_frame(&mut reader).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Reader loop: {}", e);
                    break;
                }
            };
            trace!("Router received: {}", String::from_utf8_lossy(&body));

            let json_value: serde_json::Value = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Router: failed to parse JSON: {}", e);
                    continue;
                }
            };

            match classify_message(&json_value) {
                MessageKind::Response => {
                    let response: JsonRpcResponse = match serde_json::from_value(json_value) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!("Router: failed to parse response: {}", e);
                            continue;
                        }
                    };
                    let Some(id) = response.id else {
                        continue;
                    };
                    let sender = pending_responses
                        .write()
                        .await
                        .as_mut()
                        .and_then(|pending| pending.remove(&id));
                    match sender {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => debug!("Router: no pending receiver for response id={}", id),
                    }
                }

                MessageKind::IncomingRequest { id } => {
                    let method = json_value
                        .get("method")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    let params = json_value.get("params");
                    let session_id = params
                        .and_then(|p| p.get("sessionId"))
                        .and_then(|v| v.as_str());

                    let routed = match session_id {
                        Some(sid) if is_user_input_request(method) => {
                            let question = params
                                .and_then(|p| p.get("question").or_else(|| p.get("prompt")))
                                .and_then(|q| q.as_str())
                                .unwrap_or_default()
                                .to_string();
                            route(
                                &routes,
                                sid,
                                RoutedMessage::InputRequested {
                                    request_id: id,
                                    question,
                                },
                            )
                        }
                        _ => false,
                    };

                    if !routed {
                        debug!("Router: rejecting incoming request method={}", method);
                        let reply = JsonRpcErrorOut::new(
                            id,
                            JsonRpcErrorOut::METHOD_NOT_FOUND,
                            format!("{method} is not supported by this client"),
                        );
                        if let Ok(json) = serde_json::to_string(&reply)
                            && let Err(e) = write_frame(&writer, &json).await
                        {
                            warn!("Router: failed to reject request {}: {}", id, e);
                        }
                    }
                }

                MessageKind::Notification => {
                    let notification: JsonRpcNotification =
                        match serde_json::from_value(json_value) {
                            Ok(n) => n,
                            Err(e) => {
                                warn!("Router: failed to parse notification: {}", e);
                                continue;
                            }
                        };

                    if notification.method != "session.event" {
                        trace!(
                            "Router: ignoring notification method={}",
                            notification.method
                        );
                        continue;
                    }

                    let Some(params) = notification.params else {
                        continue;
                    };
                    let session_id = params.get("sessionId").and_then(|v| v.as_str());
                    let event = params.get("event");

                    let (Some(sid), Some(event)) = (session_id, event) else {
                        debug!("Router: session.event without sessionId/event");
                        continue;
                    };
                    let event_type = event
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string();

                    if event_type == "session.start" {
                        debug!("Router: session.start for {}", sid);
                        let _ = session_start_tx.send(SessionStartEvent {
                            session_id: sid.to_string(),
                        });
                        continue;
                    }

                    let routed = route(
                        &routes,
                        sid,
                        RoutedMessage::SessionEvent {
                            event_type: event_type.clone(),
                            event: event.clone(),
                        },
                    );
                    if !routed {
                        debug!(
                            "Router: no route for session_id={}, dropping event type={}",
                            sid, event_type
                        );
                    }
                }
            }
        }

        info!("Router: reader loop ended, closing all session channels");
        routes.write().unwrap_or_else(|e| e.into_inner()).clear();
        pending_responses.write().await.take();
    }

    /// Create a new Copilot session and return its channel.
    ///
    /// Serialized via `create_lock`: concurrent `session.create` requests
    /// would otherwise race for `session.start` events.
    pub async fn create_session(
        self: &Arc<Self>,
        params: CreateSessionParams,
    ) -> Result<SessionChannel> {
        let _guard = self.create_lock.lock().await;

        let params_value = serde_json::to_value(&params)?;
        trace!("session.create params: {}", params_value);
        let request = JsonRpcRequest::new("session.create", Some(params_value));
        self.send_request(&request).await?;

        let start_event = {
            let mut rx = self.session_start_rx.lock().await;
            match tokio::time::timeout(SESSION_CREATE_TIMEOUT, rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(CopilotError::RouterStopped),
                Err(_) => {
                    return Err(CopilotError::Timeout(
                        "session.create timed out waiting for session.start".into(),
                    ));
                }
            }
        };

        let session_id = start_event.session_id;
        debug!("Router: session created: {} ({})", session_id, params.model);

        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), tx);

        Ok(SessionChannel {
            rx,
            session_id,
            router: Arc::clone(self),
        })
    }

    /// Send a JSON-RPC request and wait for the correlated response.
    ///
    /// A JSON-RPC error object in the response becomes
    /// [`CopilotError::RpcError`].
    pub async fn request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        let request_id = request.id;

        match self.pending_responses.write().await.as_mut() {
            Some(pending) => {
                pending.insert(request_id, tx);
            }
            None => return Err(CopilotError::RouterStopped),
        }

        if let Err(e) = self.send_request(request).await {
            if let Some(pending) = self.pending_responses.write().await.as_mut() {
                pending.remove(&request_id);
            }
            return Err(e);
        }

        let response = rx.await.map_err(|_| CopilotError::RouterStopped)?;
        match response.error {
            Some(error) => Err(CopilotError::RpcError {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response),
        }
    }

    /// Send a JSON-RPC request without waiting for a response.
    ///
    /// Used for `session.create`, whose answer is the asynchronous
    /// `session.start` event.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let request_json = serde_json::to_string(request)?;
        trace!("Router sending: {}", request_json);
        write_frame(&self.writer, &request_json).await
    }

    /// Reject a pending incoming request from the CLI.
    pub async fn reject_request(&self, request_id: u64, message: &str) -> Result<()> {
        let reply = JsonRpcErrorOut::new(request_id, JsonRpcErrorOut::METHOD_NOT_FOUND, message);
        write_frame(&self.writer, &serde_json::to_string(&reply)?).await
    }

    /// Number of sessions currently registered.
    pub fn session_count(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the background reader is still running.
    pub fn is_running(&self) -> bool {
        !self.reader_handle.is_finished()
    }

    /// Deregister a session from the routing table.
    ///
    /// Called by [`SessionChannel::drop`].
    pub fn deregister_session(&self, session_id: &str) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        if routes.remove(session_id).is_some() {
            debug!("Router: deregistered session {}", session_id);
        }
    }
}

impl Drop for MessageRouter {
    fn drop(&mut self) {
        self.reader_handle.abort();
        if let Some(child) = self.child.as_mut() {
            debug!("MessageRouter dropping, killing copilot-cli child process");
            let _ = child.start_kill();
        }
    }
}

fn route(routes: &Routes, session_id: &str, msg: RoutedMessage) -> bool {
    let routes = routes.read().unwrap_or_else(|e| e.into_inner());
    match routes.get(session_id) {
        Some(tx) => tx.send(msg).is_ok(),
        None => false,
    }
}

/// Read one `Content-Length` framed message body.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<Vec<u8>> {
    let mut line = String::new();
    let mut content_length: Option<usize> = None;

    // Headers end with an empty line once Content-Length has been seen.
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(CopilotError::TransportClosed);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(len_str) = trimmed.strip_prefix("Content-Length:")
            && let Ok(len) = len_str.trim().parse::<usize>()
        {
            content_length = Some(len);
        }
    }

    let mut body = vec![0u8; content_length.unwrap_or_default()];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

async fn write_frame(writer: &SharedWriter, json: &str) -> Result<()> {
    let mut writer = writer.lock().await;
    let header = format!("Content-Length: {}\r\n\r\n", json.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
