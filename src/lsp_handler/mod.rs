//! Owns a single child LSP process: spawning, JSON-RPC framing over its
//! stdio, request/response correlation, notification dispatch, and
//! graceful/forced shutdown.
//!
//! The process moves through `NotStarted -> Running -> ShuttingDown ->
//! Exited`. Two tokio tasks mirror the "two reader threads" shape of the
//! system this is ported from: one drains stdout and dispatches framed
//! messages, the other drains stderr and classifies lines into log levels.
//! Request/response correlation stays a synchronous-looking `send_request`
//! over a `oneshot` channel rather than a bespoke async protocol, since the
//! tool layer above this is already single-worker and gains nothing from a
//! fully async request pipeline.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex, RwLock};

use crate::error::CoreError;
use crate::rpc;

pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;
pub type RequestHandler = Arc<dyn Fn(Value) -> Result<Value, CoreError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    ShuttingDown,
    Exited,
}

#[derive(Debug, Clone)]
pub struct LaunchInfo {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: std::path::PathBuf,
    pub env: HashMap<String, String>,
}

struct Pending {
    tx: oneshot::Sender<Result<Value, CoreError>>,
}

/// Default per-request timeout: 240s, matching the agent executor's default
/// tool timeout so neither side times out first by surprise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(240);

/// Shared state reachable from both the public handle and the spawned
/// reader tasks, so `start()` doesn't need `self: Arc<Self>` everywhere.
struct Shared {
    pending: DashMap<i64, Pending>,
    notification_handlers: DashMap<String, NotificationHandler>,
    request_handlers: DashMap<String, RequestHandler>,
    state: RwLock<ProcessState>,
    stdin: Mutex<Option<ChildStdin>>,
    language_id: String,
}

pub struct LspHandler {
    shared: Arc<Shared>,
    child: Mutex<Option<Child>>,
    next_id: AtomicI64,
    request_timeout: Mutex<Duration>,
    reader_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    stderr_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LspHandler {
    pub fn new(language_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: DashMap::new(),
                notification_handlers: DashMap::new(),
                request_handlers: DashMap::new(),
                state: RwLock::new(ProcessState::NotStarted),
                stdin: Mutex::new(None),
                language_id: language_id.into(),
            }),
            child: Mutex::new(None),
            next_id: AtomicI64::new(1),
            request_timeout: Mutex::new(DEFAULT_REQUEST_TIMEOUT),
            reader_task: Mutex::new(None),
            stderr_task: Mutex::new(None),
        }
    }

    pub async fn set_request_timeout(&self, timeout: Duration) {
        *self.request_timeout.lock().await = timeout;
    }

    pub async fn state(&self) -> ProcessState {
        *self.shared.state.read().await
    }

    pub fn on_notification(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.shared.notification_handlers.insert(method.into(), handler);
    }

    pub fn on_request(&self, method: impl Into<String>, handler: RequestHandler) {
        self.shared.request_handlers.insert(method.into(), handler);
    }

    /// Spawns the configured command and starts the reader tasks.
    pub async fn start(&self, info: LaunchInfo) -> Result<(), CoreError> {
        {
            let state = self.shared.state.read().await;
            if *state == ProcessState::Running {
                return Ok(());
            }
        }

        let mut cmd = Command::new(&info.command);
        cmd.args(&info.args)
            .current_dir(&info.cwd)
            .envs(&info.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| CoreError::ConfigError(format!("failed to start '{}': {e}", info.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CoreError::ConfigError("child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::ConfigError("child has no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CoreError::ConfigError("child has no stderr".into()))?;

        *self.shared.stdin.lock().await = Some(stdin);
        *self.shared.state.write().await = ProcessState::Running;

        let shared_for_stdout = self.shared.clone();
        let reader_task = tokio::spawn(async move {
            stdout_loop(shared_for_stdout, stdout).await;
        });
        *self.reader_task.lock().await = Some(reader_task);

        let shared_for_stderr = self.shared.clone();
        let stderr_task = tokio::spawn(async move {
            stderr_loop(shared_for_stderr, stderr).await;
        });
        *self.stderr_task.lock().await = Some(stderr_task);

        *self.child.lock().await = Some(child);
        Ok(())
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn write_payload(&self, payload: &Value) -> Result<(), CoreError> {
        write_payload_shared(&self.shared, payload).await
    }

    /// Sends a request and blocks (cooperatively) on its result up to the
    /// configured timeout. `is_references_path` controls the ambiguous
    /// `-32603` remapping per the error taxonomy.
    pub async fn send_request(
        &self,
        method: &str,
        params: Value,
        is_references_path: bool,
    ) -> Result<Value, CoreError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, Pending { tx });

        let payload = rpc::make_request(id, method, params);
        if let Err(e) = self.write_payload(&payload).await {
            self.shared.pending.remove(&id);
            return Err(e);
        }

        let timeout = *self.request_timeout.lock().await;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result.map_err(|e| remap_references(e, is_references_path)),
            Ok(Err(_canceled)) => Err(CoreError::LanguageServerTerminated(
                "response channel closed before a reply arrived".into(),
            )),
            Err(_elapsed) => {
                self.shared.pending.remove(&id);
                Err(CoreError::Timeout(timeout))
            }
        }
    }

    pub async fn send_notification(&self, method: &str, params: Value) -> Result<(), CoreError> {
        let payload = rpc::make_notification(method, params);
        self.write_payload(&payload).await
    }

    pub async fn send_response(&self, id: Value, result: Value) -> Result<(), CoreError> {
        self.write_payload(&rpc::make_response(id, result)).await
    }

    pub async fn send_error_response(&self, id: Value, code: i32, message: &str) -> Result<(), CoreError> {
        self.write_payload(&rpc::make_error_response(id, code, message)).await
    }

    /// Graceful shutdown: `shutdown` request, `exit` notification, then
    /// forceful process termination, all best-effort.
    pub async fn shutdown(&self) {
        *self.shared.state.write().await = ProcessState::ShuttingDown;
        let _ = self.send_request("shutdown", Value::Null, false).await;
        let _ = self.send_notification("exit", Value::Null).await;
        self.stop(Duration::from_secs(5)).await;
    }

    /// Closes stdin first (avoids the classic CPython-style deadlock where a
    /// child blocks writing to a full stdout pipe while its parent is
    /// blocked reading stdin), signals the process, waits, then kills.
    pub async fn stop(&self, wait: Duration) {
        {
            let mut stdin = self.shared.stdin.lock().await;
            if let Some(mut s) = stdin.take() {
                let _ = s.shutdown().await;
            }
        }

        let mut child_guard = self.child.lock().await;
        if let Some(child) = child_guard.as_mut() {
            // Closing stdin above asks well-behaved servers to exit on their
            // own; give them `wait` to do so before a hard kill. tokio's
            // `Child::kill` is a SIGKILL-equivalent on every platform, so
            // unlike the process this is ported from there is no separate
            // SIGTERM phase here.
            let result = tokio::time::timeout(wait, child.wait()).await;
            if result.is_err() {
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
        *self.shared.state.write().await = ProcessState::Exited;
        self.cancel_pending(CoreError::LanguageServerTerminated("process stopped".into()));
    }

    fn cancel_pending(&self, reason: CoreError) {
        let keys: Vec<i64> = self.shared.pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, pending)) = self.shared.pending.remove(&key) {
                let _ = pending.tx.send(Err(clone_error(&reason)));
            }
        }
    }
}

fn clone_error(e: &CoreError) -> CoreError {
    match e {
        CoreError::LanguageServerTerminated(s) => CoreError::LanguageServerTerminated(s.clone()),
        other => CoreError::LanguageServerTerminated(other.to_string()),
    }
}

fn remap_references(e: CoreError, is_references_path: bool) -> CoreError {
    if let CoreError::Lsp { code, message } = e {
        CoreError::from_lsp_response(code, message, is_references_path)
    } else {
        e
    }
}

async fn write_payload_shared(shared: &Shared, payload: &Value) -> Result<(), CoreError> {
    let mut guard = shared.stdin.lock().await;
    let stdin = guard
        .as_mut()
        .ok_or_else(|| CoreError::LanguageServerTerminated("stdin not available".into()))?;
    match rpc::write_message(stdin, payload).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(language = %shared.language_id, error = %e, "failed to write to LSP stdin");
            Err(CoreError::LanguageServerTerminated(e.to_string()))
        }
    }
}

async fn stdout_loop(shared: Arc<Shared>, stdout: tokio::process::ChildStdout) {
    let mut reader = BufReader::new(stdout);
    loop {
        match rpc::read_message(&mut reader).await {
            Ok(Some(message)) => dispatch(&shared, message).await,
            Ok(None) => {
                tracing::info!(language = %shared.language_id, "LSP stdout closed");
                break;
            }
            Err(e) => {
                tracing::warn!(language = %shared.language_id, error = %e, "dropping malformed LSP message");
                // Per the framer's contract, a bad frame is dropped and the
                // stream continues rather than tearing down the process.
                continue;
            }
        }
    }
    fail_all_pending(&shared);
}

fn fail_all_pending(shared: &Arc<Shared>) {
    let keys: Vec<i64> = shared.pending.iter().map(|e| *e.key()).collect();
    for key in keys {
        if let Some((_, pending)) = shared.pending.remove(&key) {
            let _ = pending.tx.send(Err(CoreError::LanguageServerTerminated(
                "language server process exited".into(),
            )));
        }
    }
}

async fn dispatch(shared: &Arc<Shared>, message: Value) {
    let has_id = message.get("id").is_some();
    let has_method = message.get("method").is_some();

    if has_method && has_id {
        let method = message["method"].as_str().unwrap_or_default().to_string();
        let id = message["id"].clone();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let handler = shared.request_handlers.get(&method).map(|r| r.value().clone());
        match handler {
            Some(handler) => {
                let outcome = handler(params);
                match outcome {
                    Ok(result) => {
                        let _ = write_payload_shared(&shared, &rpc::make_response(id, result)).await;
                    }
                    Err(e) => {
                        tracing::warn!(%method, error = %e, "server->client request handler failed");
                        let _ = write_payload_shared(
                            &shared,
                            &rpc::make_error_response(id, rpc::error_codes::INTERNAL_ERROR, &e.to_string()),
                        )
                        .await;
                    }
                }
            }
            None => {
                tracing::debug!(%method, "no handler for server->client request; replying MethodNotFound");
                let _ = write_payload_shared(
                    &shared,
                    &rpc::make_error_response(id, rpc::error_codes::METHOD_NOT_FOUND, "method not found"),
                )
                .await;
            }
        }
    } else if has_method {
        let method = message["method"].as_str().unwrap_or_default().to_string();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        match shared.notification_handlers.get(&method) {
            Some(handler) => handler(params),
            None => tracing::trace!(%method, "unhandled server notification"),
        }
    } else if has_id {
        let id = message["id"].as_i64();
        if let Some(id) = id {
            if let Some((_, pending)) = shared.pending.remove(&id) {
                if let Some(error) = message.get("error") {
                    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1) as i32;
                    let msg = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown LSP error")
                        .to_string();
                    let _ = pending.tx.send(Err(CoreError::Lsp { code, message: msg }));
                } else {
                    let result = message.get("result").cloned().unwrap_or(Value::Null);
                    let _ = pending.tx.send(Ok(result));
                }
            }
        }
    }
}

async fn stderr_loop(shared: Arc<Shared>, stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let lower = line.to_ascii_lowercase();
                if lower.contains("error") || lower.contains("exception") || line.starts_with("E[") {
                    tracing::error!(language = %shared.language_id, "{}", line);
                } else {
                    tracing::info!(language = %shared.language_id, "{}", line);
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_stops_and_shuts_down_cleanly() {
        // `cat` echoes nothing meaningful as an LSP server, but this
        // exercises process spawn/stop without requiring a real LSP binary.
        let handler = LspHandler::new("test");
        let info = LaunchInfo {
            command: "cat".to_string(),
            args: vec![],
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
        };
        handler.start(info).await.unwrap();
        assert_eq!(handler.state().await, ProcessState::Running);
        handler.stop(Duration::from_millis(500)).await;
        assert_eq!(handler.state().await, ProcessState::Exited);
    }

    #[tokio::test]
    async fn request_times_out_against_a_silent_process() {
        let handler = LspHandler::new("test");
        handler.set_request_timeout(Duration::from_millis(100)).await;
        let info = LaunchInfo {
            command: "cat".to_string(),
            args: vec![],
            cwd: std::env::temp_dir(),
            env: HashMap::new(),
        };
        handler.start(info).await.unwrap();
        let result = handler.send_request("textDocument/hover", Value::Null, false).await;
        assert!(matches!(result, Err(CoreError::Timeout(_))));
        handler.stop(Duration::from_millis(200)).await;
    }
}
