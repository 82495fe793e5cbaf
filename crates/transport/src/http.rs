//! HTTP transport: POSTs JSON-RPC envelopes to a single URL and listens for
//! server-initiated notifications/requests on a `<url>/sse` SSE stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use mcp_types::protocol::{build_error_response, build_notification, build_request, build_response, classify, Message};
use mcp_types::{McpError, RequestId, ServerConfig};
use reqwest::Client as HttpClient;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::{RpcOutcome, DEFAULT_CALL_TIMEOUT, DISPATCH_CHANNEL_CAPACITY};

const SSE_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_ERROR_BODY_PREVIEW: usize = 2048;

pub struct HttpTransport {
    config: ServerConfig,
    client: HttpClient,
    connected: Arc<AtomicBool>,
    close_started: AtomicBool,
    events_tx: mpsc::Sender<Value>,
    events_rx: StdMutex<Option<mpsc::Receiver<Value>>>,
    requests_tx: mpsc::Sender<Value>,
    requests_rx: StdMutex<Option<mpsc::Receiver<Value>>>,
    stop: Arc<Notify>,
    sse_task: StdMutex<Option<JoinHandle<()>>>,
}

impl HttpTransport {
    pub fn new(config: ServerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        let (requests_tx, requests_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        Self {
            config,
            client: HttpClient::new(),
            connected: Arc::new(AtomicBool::new(false)),
            close_started: AtomicBool::new(false),
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
            requests_tx,
            requests_rx: StdMutex::new(Some(requests_rx)),
            stop: Arc::new(Notify::new()),
            sse_task: StdMutex::new(None),
        }
    }

    fn default_timeout(&self) -> Duration {
        if self.config.timeout_secs == 0 { DEFAULT_CALL_TIMEOUT } else { self.config.timeout() }
    }

    fn sse_url(&self) -> String {
        format!("{}/sse", self.config.http.url.trim_end_matches('/'))
    }

    async fn post(&self, envelope: &Value, timeout: Duration) -> Result<reqwest::Response, McpError> {
        let mut builder = self.client.post(&self.config.http.url).json(envelope).timeout(timeout);
        for (key, value) in &self.config.http.headers {
            builder = builder.header(key, value);
        }
        builder.send().await.map_err(|e| McpError::Http(format!("HTTP request failed: {e}")))
    }

    async fn post_and_check(&self, envelope: &Value, timeout: Duration) -> Result<Value, McpError> {
        let response = self.post(envelope, timeout).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(MAX_ERROR_BODY_PREVIEW).collect();
            return Err(McpError::Http(format!("HTTP error {status}: {preview}")));
        }
        response.json::<Value>().await.map_err(|e| McpError::Wire(e.to_string()))
    }
}

#[async_trait]
impl crate::Transport for HttpTransport {
    async fn connect(&self) -> Result<(), McpError> {
        self.config.validate()?;
        self.connected.store(true, Ordering::SeqCst);

        let url = self.sse_url();
        let headers = self.config.http.headers.clone();
        let client = self.client.clone();
        let events_tx = self.events_tx.clone();
        let requests_tx = self.requests_tx.clone();
        let stop = Arc::clone(&self.stop);
        let connected = Arc::clone(&self.connected);
        let server_id = self.config.id.clone();

        let task = tokio::spawn(async move {
            loop {
                if !connected.load(Ordering::SeqCst) {
                    break;
                }
                let mut builder = client
                    .get(&url)
                    .header("Accept", "text/event-stream")
                    .header("Cache-Control", "no-cache");
                for (key, value) in &headers {
                    builder = builder.header(key, value);
                }

                let response = tokio::select! {
                    res = builder.send() => res,
                    _ = stop.notified() => break,
                };

                match response {
                    Ok(response) if response.status().is_success() => {
                        let mut stream = response.bytes_stream().eventsource();
                        loop {
                            tokio::select! {
                                next = stream.next() => {
                                    match next {
                                        Some(Ok(event)) => dispatch_sse_data(&event.data, &events_tx, &requests_tx),
                                        Some(Err(e)) => {
                                            tracing::warn!(server_id = %server_id, error = %e, "sse stream error");
                                            break;
                                        }
                                        None => break,
                                    }
                                }
                                _ = stop.notified() => return,
                            }
                        }
                    }
                    Ok(response) => {
                        tracing::warn!(server_id = %server_id, status = %response.status(), "sse connect rejected");
                    }
                    Err(e) => {
                        tracing::warn!(server_id = %server_id, error = %e, "sse connect failed");
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(SSE_RECONNECT_DELAY) => {}
                    _ = stop.notified() => break,
                }
            }
        });
        *self.sse_task.lock().unwrap() = Some(task);
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.close_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connected.store(false, Ordering::SeqCst);
        self.stop.notify_waiters();
        if let Some(task) = self.sse_task.lock().unwrap().take() {
            let _ = task.await;
        }
        Ok(())
    }

    async fn call(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value, McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }
        let timeout = if timeout.is_zero() { self.default_timeout() } else { timeout };
        let request_id = RequestId::String(uuid::Uuid::new_v4().to_string());
        let envelope = build_request(&request_id, method, params);
        let response = self.post_and_check(&envelope, timeout).await?;
        match classify(&response) {
            Some(Message::Response { error: Some(err), .. }) => {
                Err(McpError::Rpc { code: err.code, message: err.message })
            }
            Some(Message::Response { result, .. }) => Ok(result.unwrap_or(Value::Null)),
            _ => Err(McpError::Wire("expected a JSON-RPC response envelope".into())),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }
        let envelope = build_notification(method, params);
        self.post(&envelope, self.default_timeout()).await?;
        Ok(())
    }

    async fn respond(&self, id: &RequestId, outcome: RpcOutcome) -> Result<(), McpError> {
        if !self.connected() {
            return Err(McpError::NotConnected(self.config.id.clone()));
        }
        let envelope = match outcome {
            RpcOutcome::Result(value) => build_response(id, value),
            RpcOutcome::Error { code, message } => build_error_response(id, code, &message),
        };
        self.post(&envelope, self.default_timeout()).await?;
        Ok(())
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

fn dispatch_sse_data(data: &str, events_tx: &mpsc::Sender<Value>, requests_tx: &mpsc::Sender<Value>) {
    let raw: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, data, "dropping unparseable sse payload");
            return;
        }
    };
    match classify(&raw) {
        Some(Message::Request { .. }) => {
            if requests_tx.try_send(raw).is_err() {
                tracing::warn!("server-request channel full, dropping sse message");
            }
        }
        Some(Message::Notification { .. }) => {
            if events_tx.try_send(raw).is_err() {
                tracing::warn!("events channel full, dropping sse notification");
            }
        }
        Some(Message::Response { .. }) | None => {
            tracing::debug!("ignoring non request/notification sse payload");
        }
    }
}
