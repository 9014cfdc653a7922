//! The agent executor (component G): a single-worker task runner that
//! serializes every tool invocation against the language-server host, plus
//! tool activation-set derivation and the LSP-restart-on-failure policy.
//!
//! All *tool* work funnels through one `tokio::task` backed by an mpsc
//! channel so ordering against the LSP child is never at the mercy of
//! scheduling: §5 requires that for a single file, edits observed in
//! submission order are fully committed before the next one begins, and the
//! simplest way to guarantee that is to never run two of them concurrently
//! in the first place.

pub mod lines_read;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;
use crate::host::project_config;

pub use lines_read::LinesRead;

type BoxedTask = Pin<Box<dyn Future<Output = Box<dyn std::any::Any + Send>> + Send>>;

struct Job {
    label: String,
    task: BoxedTask,
    reply: oneshot::Sender<Box<dyn std::any::Any + Send>>,
}

/// The single-worker executor. Cloning shares the same worker task and
/// ordering guarantee; dropping every handle stops the worker.
#[derive(Clone)]
pub struct AgentExecutor {
    sender: mpsc::UnboundedSender<Job>,
    next_task_id: std::sync::Arc<AtomicU64>,
}

/// A handle to a task submitted via `issue_task`, resolving to the task's
/// result once the worker reaches it in submission order.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<Box<dyn std::any::Any + Send>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub async fn await_result(self) -> Result<T, CoreError> {
        let boxed = self
            .receiver
            .await
            .map_err(|_| CoreError::LanguageServerTerminated("executor worker dropped the task".into()))?;
        boxed
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| CoreError::ConfigError("task result type mismatch".into()))
    }
}

impl AgentExecutor {
    /// Spawns the single worker task. Jobs run strictly in the order they
    /// arrive on the channel — `tokio::sync::mpsc` preserves FIFO order and
    /// the worker loop awaits one job fully before pulling the next.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let span = tracing::info_span!("tool_task", label = %job.label);
                let _enter = span.enter();
                tracing::debug!("executing task");
                let result = job.task.await;
                let _ = job.reply.send(result);
            }
        });
        Self {
            sender,
            next_task_id: std::sync::Arc::new(AtomicU64::new(1)),
        }
    }

    /// `issue_task(fn, name?) -> Future` — submits `fut` to the worker,
    /// naming it `Task-<n>[<label>]` for logging, and returns a handle the
    /// caller can await independently of submission order internals.
    pub fn issue_task<T, F>(&self, label: impl Into<String>, fut: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        let label = format!("Task-{id}[{}]", label.into());
        tracing::debug!(%label, "scheduling task");

        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed_task: BoxedTask = Box::pin(async move {
            let result = fut.await;
            Box::new(result) as Box<dyn std::any::Any + Send>
        });
        let job = Job {
            label,
            task: boxed_task,
            reply: reply_tx,
        };
        // An unbounded channel never blocks the submitter; a closed worker
        // (executor dropped) just drops the job and the handle observes a
        // `LanguageServerTerminated`-flavored error on await.
        let _ = self.sender.send(job);
        TaskHandle {
            receiver: reply_rx,
            _marker: std::marker::PhantomData,
        }
    }

    /// `execute_task(fn) -> result` — synchronous wrapper that submits and
    /// immediately awaits.
    pub async fn execute_task<T, F>(&self, label: impl Into<String>, fut: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        self.issue_task(label, fut).await_result().await
    }
}

impl Default for AgentExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a tool call with the "restart LSP once on termination" policy: if
/// `call` fails with `LanguageServerTerminated`, `restart` is invoked and
/// `call` is retried exactly once before the failure is surfaced.
pub async fn with_lsp_restart_on_failure<T, C, Fut, R, RFut>(call: C, restart: R) -> Result<T, CoreError>
where
    C: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<(), CoreError>>,
{
    match call().await {
        Err(e) if e.is_language_server_terminated() => {
            tracing::warn!("language server terminated mid-call; restarting once and retrying");
            restart().await?;
            call().await
        }
        other => other,
    }
}

/// Validates a tool-invocation timeout configuration against the Agent
/// Executor's precondition (§4.G): the LSP per-request timeout must be at
/// least 5s smaller than the tool timeout, and the tool timeout itself must
/// be at least 10s. Delegates to the shared validator so host startup and
/// executor configuration can't silently disagree on the rule.
pub fn validate_tool_timeout(read_timeout: Duration, tool_timeout: Duration) -> Result<(), CoreError> {
    project_config::validate_timeouts(read_timeout, tool_timeout)
}

// ---- tool activation ---------------------------------------------------

/// Marks whether a named tool class performs an edit; read-only mode
/// subtracts every tool for which this is true.
pub trait ToolDescriptor {
    fn name(&self) -> &str;
    fn is_editing(&self) -> bool;
    /// Non-optional tools are part of `ToolSet::default()`; optional tools
    /// must be explicitly included.
    fn is_optional(&self) -> bool;
}

/// `(excluded_tools, included_optional_tools)`, applied in the activation
/// chain documented in §3/§4.G: agent config -> context -> ide-assistant
/// exclusions -> jetbrains-mode exclusions -> active project -> active
/// modes.
#[derive(Debug, Clone, Default)]
pub struct ToolInclusionDefinition {
    pub excluded_tools: Vec<String>,
    pub included_optional_tools: Vec<String>,
}

/// Derives the final active tool-name set from the full registry and an
/// ordered list of inclusion definitions (one per activation-chain stage),
/// applying read-only-project editing-tool removal last.
///
/// Every referenced name must exist in `registry`; an unknown name in
/// either list of any definition is a hard `ConfigError`, matching the
/// "unknown tool names in include/exclude are a hard error" rule.
pub fn derive_active_tools<'a>(
    registry: &'a [Box<dyn ToolDescriptor>],
    definitions: &[ToolInclusionDefinition],
    read_only_project: bool,
) -> Result<HashSet<String>, CoreError> {
    let known: HashSet<&str> = registry.iter().map(|t| t.name()).collect();

    let mut active: HashSet<String> = registry
        .iter()
        .filter(|t| !t.is_optional())
        .map(|t| t.name().to_string())
        .collect();

    for def in definitions {
        for name in &def.excluded_tools {
            if !known.contains(name.as_str()) {
                return Err(CoreError::ConfigError(format!("unknown tool in exclusion list: '{name}'")));
            }
            active.remove(name);
        }
        for name in &def.included_optional_tools {
            if !known.contains(name.as_str()) {
                return Err(CoreError::ConfigError(format!("unknown tool in inclusion list: '{name}'")));
            }
            active.insert(name.clone());
        }
    }

    if read_only_project {
        let editing: HashSet<String> = registry
            .iter()
            .filter(|t| t.is_editing())
            .map(|t| t.name().to_string())
            .collect();
        active.retain(|name| !editing.contains(name));
    }

    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct StubTool {
        name: &'static str,
        editing: bool,
        optional: bool,
    }

    impl ToolDescriptor for StubTool {
        fn name(&self) -> &str {
            self.name
        }
        fn is_editing(&self) -> bool {
            self.editing
        }
        fn is_optional(&self) -> bool {
            self.optional
        }
    }

    fn registry() -> Vec<Box<dyn ToolDescriptor>> {
        vec![
            Box::new(StubTool { name: "read_file", editing: false, optional: false }),
            Box::new(StubTool { name: "replace_symbol_body", editing: true, optional: false }),
            Box::new(StubTool { name: "experimental_thing", editing: false, optional: true }),
        ]
    }

    #[test]
    fn default_set_excludes_optional_tools() {
        let reg = registry();
        let active = derive_active_tools(&reg, &[], false).unwrap();
        assert!(active.contains("read_file"));
        assert!(active.contains("replace_symbol_body"));
        assert!(!active.contains("experimental_thing"));
    }

    #[test]
    fn optional_tool_can_be_included() {
        let reg = registry();
        let def = ToolInclusionDefinition {
            excluded_tools: vec![],
            included_optional_tools: vec!["experimental_thing".to_string()],
        };
        let active = derive_active_tools(&reg, &[def], false).unwrap();
        assert!(active.contains("experimental_thing"));
    }

    #[test]
    fn read_only_project_strips_editing_tools() {
        let reg = registry();
        let active = derive_active_tools(&reg, &[], true).unwrap();
        assert!(active.contains("read_file"));
        assert!(!active.contains("replace_symbol_body"));
    }

    #[test]
    fn unknown_tool_name_is_a_hard_error() {
        let reg = registry();
        let def = ToolInclusionDefinition {
            excluded_tools: vec!["not_a_real_tool".to_string()],
            included_optional_tools: vec![],
        };
        let result = derive_active_tools(&reg, &[def], false);
        assert!(matches!(result, Err(CoreError::ConfigError(_))));
    }

    #[tokio::test]
    async fn tasks_execute_strictly_in_submission_order() {
        let executor = AgentExecutor::new();
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        let h1 = executor.issue_task("t1", async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            o1.lock().await.push(1);
        });
        let o2 = order.clone();
        let h2 = executor.issue_task("t2", async move {
            o2.lock().await.push(2);
        });
        let o3 = order.clone();
        let h3 = executor.issue_task("t3", async move {
            o3.lock().await.push(3);
        });

        h1.await_result().await.unwrap();
        h2.await_result().await.unwrap();
        h3.await_result().await.unwrap();

        assert_eq!(*order.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn restart_on_terminated_retries_exactly_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let restarts = Arc::new(AtomicUsize::new(0));

        let a = attempts.clone();
        let call = move || {
            let a = a.clone();
            async move {
                let n = a.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(CoreError::LanguageServerTerminated("boom".into()))
                } else {
                    Ok::<_, CoreError>(42)
                }
            }
        };
        let r = restarts.clone();
        let restart = move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CoreError>(())
            }
        };

        let result = with_lsp_restart_on_failure(call, restart).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
    }
}
