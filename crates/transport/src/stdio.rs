//! Stdio transport: launches an MCP server as a child process and multiplexes
//! JSON-RPC requests/responses over its stdin/stdout as NDJSON.

use std::collections::HashMap;
use std::process::Stdio as StdStdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use mcp_types::protocol::{build_error_response, build_notification, build_request, build_response, classify, Message};
use mcp_types::{McpError, RequestId, ServerConfig};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use crate::{RpcOutcome, DEFAULT_CALL_TIMEOUT, DISPATCH_CHANNEL_CAPACITY, MAX_PENDING_REQUESTS};

type PendingMap = StdMutex<HashMap<i64, oneshot::Sender<Result<Value, McpError>>>>;

pub struct StdioTransport {
    config: ServerConfig,
    connected: Arc<AtomicBool>,
    close_started: AtomicBool,
    child: AsyncMutex<Option<Child>>,
    stdin: AsyncMutex<Option<ChildStdin>>,
    pending: Arc<PendingMap>,
    next_id: AtomicI64,
    events_tx: mpsc::Sender<Value>,
    events_rx: StdMutex<Option<mpsc::Receiver<Value>>>,
    requests_tx: mpsc::Sender<Value>,
    requests_rx: StdMutex<Option<mpsc::Receiver<Value>>>,
    stop: Arc<Notify>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
    stderr_task: StdMutex<Option<JoinHandle<()>>>,
}

impl StdioTransport {
    pub fn new(config: ServerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        let (requests_tx, requests_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            close_started: AtomicBool::new(false),
            child: AsyncMutex::new(None),
            stdin: AsyncMutex::new(None),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
            requests_tx,
            requests_rx: StdMutex::new(Some(requests_rx)),
            stop: Arc::new(Notify::new()),
            reader_task: StdMutex::new(None),
            stderr_task: StdMutex::new(None),
        }
    }

    fn default_timeout(&self) -> Duration {
        if self.config.timeout_secs == 0 { DEFAULT_CALL_TIMEOUT } else { self.config.timeout() }
    }

    async fn write_line(&self, payload: &Value) -> Result<(), McpError> {
        let mut line = serde_json::to_string(payload)?;
        line.push('\n');
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| McpError::NotConnected(self.config.id.clone()))?;
        stdin.write_all(line.as_bytes()).await.map_err(|e| McpError::Process(e.to_string()))?;
        stdin.flush().await.map_err(|e| McpError::Process(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl crate::Transport for StdioTransport {
    async fn connect(&self) -> Result<(), McpError> {
        self.config.validate()?;

        let mut command = Command::new(&self.config.stdio.command);
        command
            .args(&self.config.stdio.args)
            .envs(&self.config.stdio.env)
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::piped())
            .kill_on_drop(true);
        if let Some(workdir) = &self.config.stdio.workdir {
            command.current_dir(workdir);
        }

        let mut child = command.spawn().map_err(|e| {
            McpError::Process(format!("failed to spawn {}: {e}", self.config.stdio.command))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Process("no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Process("no stdout".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| McpError::Process("no stderr".into()))?;

        *self.stdin.lock().await = Some(stdin);
        *self.child.lock().await = Some(child);
        self.connected.store(true, Ordering::SeqCst);

        let server_id = self.config.id.clone();
        let pending = Arc::clone(&self.pending);
        let events_tx = self.events_tx.clone();
        let requests_tx = self.requests_tx.clone();
        let connected = Arc::clone(&self.connected);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::with_capacity(1024 * 1024, stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        process_line(&line, &pending, &events_tx, &requests_tx).await;
                    }
                    Ok(None) => {
                        tracing::debug!(server_id = %server_id, "stdout EOF, stdio transport closing");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(server_id = %server_id, error = %e, "stdio read error");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
        });
        *self.reader_task.lock().unwrap() = Some(reader);

        let server_id = self.config.id.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if !line.trim().is_empty() {
                    tracing::debug!(server_id = %server_id, stderr = %line, "mcp server stderr");
                }
            }
        });
        *self.stderr_task.lock().unwrap() = Some(stderr_task);

        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connected.store(false, Ordering::SeqCst);
        self.stdin.lock().await.take();
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.start_kill();
        }
        self.stop.notify_waiters();
        if let Some(task) = self.reader_task.lock().unwrap().take() {
            let _ = task.await;
        }
        if let Some(task) = self.stderr_task.lock().unwrap().take() {
            let _ = task.await;
        }
        Ok(())
    }

    async fn call(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value, McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request_id = RequestId::from(id);

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap();
            if pending.len() >= MAX_PENDING_REQUESTS {
                return Err(McpError::Backpressure);
            }
            pending.insert(id, tx);
        }

        let envelope = build_request(&request_id, method, params);
        if let Err(e) = self.write_line(&envelope).await {
            self.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        let timeout = if timeout.is_zero() { self.default_timeout() } else { timeout };
        let outcome = tokio::select! {
            res = rx => {
                res.map_err(|_| McpError::TransportClosed)?
            }
            _ = tokio::time::sleep(timeout) => {
                self.pending.lock().unwrap().remove(&id);
                Err(McpError::Timeout { method: method.to_string(), elapsed_ms: timeout.as_millis() as u64 })
            }
            _ = self.stop.notified() => {
                self.pending.lock().unwrap().remove(&id);
                Err(McpError::TransportClosed)
            }
        };
        self.pending.lock().unwrap().remove(&id);
        outcome
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }
        self.write_line(&build_notification(method, params)).await
    }

    async fn respond(&self, id: &RequestId, outcome: RpcOutcome) -> Result<(), McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }
        let envelope = match outcome {
            RpcOutcome::Result(value) => build_response(id, value),
            RpcOutcome::Error { code, message } => build_error_response(id, code, &message),
        };
        self.write_line(&envelope).await
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn take_events(&self) -> Option<mpsc::Receiver<Value>> {
        self.events_rx.lock().unwrap().take()
    }

    fn take_requests(&self) -> Option<mpsc::Receiver<Value>> {
        self.requests_rx.lock().unwrap().take()
    }
}

async fn process_line(
    line: &str,
    pending: &PendingMap,
    events_tx: &mpsc::Sender<Value>,
    requests_tx: &mpsc::Sender<Value>,
) {
    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, line, "dropping unparseable stdio line");
            return;
        }
    };
    match classify(&raw) {
        Some(Message::Request { id, .. }) => {
            let mut envelope = raw;
            if let Value::Object(ref mut map) = envelope {
                map.insert("id".into(), serde_json::to_value(&id).unwrap_or(Value::Null));
            }
            if requests_tx.try_send(envelope).is_err() {
                tracing::warn!("server-request channel full, dropping message");
            }
        }
        Some(Message::Notification { .. }) => {
            if events_tx.try_send(raw).is_err() {
                tracing::warn!("events channel full, dropping notification");
            }
        }
        Some(Message::Response { id, result, error }) => {
            let Some(id) = id.as_i64() else {
                tracing::warn!("dropping response with non-integer id");
                return;
            };
            let sender = pending.lock().unwrap().remove(&id);
            if let Some(sender) = sender {
                let outcome = if let Some(err) = error {
                    Err(McpError::Rpc { code: err.code, message: err.message })
                } else {
                    Ok(result.unwrap_or(Value::Null))
                };
                let _ = sender.send(outcome);
            }
        }
        None => tracing::warn!(line, "dropping envelope with neither method nor id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Transport;
    use mcp_types::{StdioTransportConfig, TransportKind};

    fn echo_config(script: &str) -> ServerConfig {
        ServerConfig {
            id: "echo".into(),
            name: "echo".into(),
            transport: TransportKind::Stdio,
            stdio: StdioTransportConfig {
                command: "sh".into(),
                args: vec!["-c".into(), script.into()],
                ..Default::default()
            },
            http: Default::default(),
            timeout_secs: 5,
            auto_start: false,
        }
    }

    #[tokio::test]
    async fn connect_and_close_is_idempotent() {
        let transport = StdioTransport::new(echo_config("cat"));
        transport.connect().await.unwrap();
        assert!(transport.connected());
        transport.close().await.unwrap();
        assert!(!transport.connected());
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn call_against_closed_transport_is_rejected() {
        let transport = StdioTransport::new(echo_config("cat"));
        let err = transport.call("tools/list", None, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, McpError::NotConnected(_)));
    }

    #[tokio::test]
    async fn call_times_out_when_server_is_silent() {
        let transport = StdioTransport::new(echo_config("cat >/dev/null"));
        transport.connect().await.unwrap();
        let err = transport.call("tools/list", None, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, McpError::Timeout { .. }));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn call_round_trips_through_a_line_echoing_child() {
        // A script that reads one line, replaces the method's id back as a result.
        let script = r#"read line; id=$(echo "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p'); echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"ok\":true}}""#;
        let transport = StdioTransport::new(echo_config(script));
        transport.connect().await.unwrap();
        let result = transport.call("ping", None, Duration::from_secs(2)).await.unwrap();
        assert_eq!(result.get("ok").and_then(|v| v.as_bool()), Some(true));
        transport.close().await.unwrap();
    }
}
