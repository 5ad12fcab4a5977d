//! The heartbeat service.
//!
//! Phase 1 (decision): reads `HEARTBEAT.md` and asks the model — via a
//! virtual tool call — whether there are active tasks. A response without a
//! tool invocation means skip; free-text parsing is never attempted.
//!
//! Phase 2 (execution): only entered on a `run` decision. The `on_execute`
//! callback runs the tasks through the surrounding agent loop; non-empty
//! results are handed to `on_notify`.
//!
//! Each service owns its timer loop. Shutdown travels over a watch channel
//! that the loop checks at every suspension point, so `stop()` never tears
//! down a tick mid-computation and never surfaces as a panic.

use crate::config::HeartbeatConfig;
use crate::providers::{ChatMessage, Provider, ToolArguments, ToolSpec};
use anyhow::{Context, Result};
use serde_json::json;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";

const HEARTBEAT_TEMPLATE: &str = "\
# Heartbeat Checklist

<!-- Keep this file empty and heartbeat checks cost nothing.
     Add tasks below to have the agent look at them periodically.

     - [ ] Check CI status for the release branch
     - [ ] Sweep the inbox for threads waiting on a reply
-->
";

pub type CallbackFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
/// Runs the tasks surfaced by a `run` decision; returns the result text.
pub type ExecuteFn = Arc<dyn Fn(String) -> CallbackFuture<String> + Send + Sync>;
/// Delivers a non-empty execution result to whoever should hear about it.
pub type NotifyFn = Arc<dyn Fn(String) -> CallbackFuture<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Skip,
    Run,
}

/// Outcome of the decision phase. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct HeartbeatDecision {
    pub action: HeartbeatAction,
    pub tasks: String,
}

impl HeartbeatDecision {
    fn skip() -> Self {
        Self {
            action: HeartbeatAction::Skip,
            tasks: String::new(),
        }
    }
}

struct LoopHandle {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

pub struct HeartbeatService {
    workspace_dir: PathBuf,
    provider: Arc<dyn Provider>,
    model: String,
    interval: Duration,
    enabled: bool,
    on_execute: Option<ExecuteFn>,
    on_notify: Option<NotifyFn>,
    running: Mutex<Option<LoopHandle>>,
    /// Serializes timer ticks against manual triggers so the trigger file
    /// and memory stores never see interleaved cycles.
    tick_gate: tokio::sync::Mutex<()>,
}

impl HeartbeatService {
    pub fn new(
        workspace_dir: &Path,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        config: &HeartbeatConfig,
    ) -> Self {
        Self {
            workspace_dir: workspace_dir.to_path_buf(),
            provider,
            model: model.into(),
            interval: Duration::from_secs(u64::from(config.interval_minutes) * 60),
            enabled: config.enabled,
            on_execute: None,
            on_notify: None,
            running: Mutex::new(None),
            tick_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the tick interval (mainly for tests).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_execute(mut self, callback: ExecuteFn) -> Self {
        self.on_execute = Some(callback);
        self
    }

    pub fn on_notify(mut self, callback: NotifyFn) -> Self {
        self.on_notify = Some(callback);
        self
    }

    pub fn heartbeat_path(&self) -> PathBuf {
        self.workspace_dir.join(HEARTBEAT_FILE)
    }

    /// Seed a commented-out checklist template if the file is absent.
    pub async fn ensure_trigger_file(&self) -> Result<()> {
        let path = self.heartbeat_path();
        if path.exists() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.workspace_dir)
            .await
            .context("create workspace directory")?;
        tokio::fs::write(&path, HEARTBEAT_TEMPLATE)
            .await
            .context("seed heartbeat template")?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the timer loop. Returns `true` when a new loop was spawned;
    /// `false` when disabled or already running (the existing loop is left
    /// untouched — starting twice never creates two loops).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.enabled {
            tracing::info!("heartbeat disabled, not starting");
            return false;
        }

        let mut slot = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            tracing::warn!("heartbeat already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            service.run_loop(shutdown_rx).await;
        });
        *slot = Some(LoopHandle {
            task,
            shutdown: shutdown_tx,
        });

        tracing::info!(interval_secs = self.interval.as_secs(), "heartbeat started");
        true
    }

    /// Signal the loop to exit at its next suspension point and clear the
    /// handle. Idempotent; safe whether or not the loop is running.
    pub fn stop(&self) {
        let mut slot = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            let _ = handle.shutdown.send(true);
            // The task exits on its own once it sees the signal.
            drop(handle.task);
            tracing::info!("heartbeat stopping");
        }
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // wait_for resolves only on a true signal (or a dropped sender), so
        // spurious watch wakeups never abandon an in-flight tick.
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }

            tokio::select! {
                result = self.tick() => {
                    if let Err(e) = result {
                        tracing::error!("heartbeat tick failed: {e:#}");
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::debug!("heartbeat tick abandoned during shutdown");
                    break;
                }
            }
        }
        tracing::debug!("heartbeat loop exited");
    }

    /// Manually run one decision+execution cycle outside the timer.
    ///
    /// Returns `Ok(None)` when there is nothing actionable: no trigger file,
    /// a skip decision, or no execute callback registered. Shares the tick
    /// gate with the timer loop, so both can never run a cycle at once.
    pub async fn trigger_now(&self) -> Result<Option<String>> {
        self.tick().await
    }

    async fn tick(&self) -> Result<Option<String>> {
        let _gate = self.tick_gate.lock().await;

        let Some(content) = self.read_trigger_file().await else {
            tracing::debug!("heartbeat: no actionable {HEARTBEAT_FILE}");
            return Ok(None);
        };

        tracing::info!("heartbeat: checking for tasks");
        let decision = self.decide(&content).await?;

        if decision.action != HeartbeatAction::Run {
            tracing::info!("heartbeat: nothing to do");
            return Ok(None);
        }

        let Some(on_execute) = &self.on_execute else {
            tracing::debug!("heartbeat: run decision but no execute callback registered");
            return Ok(None);
        };

        tracing::info!("heartbeat: tasks found, executing");
        let result = on_execute(decision.tasks).await?;

        if !result.is_empty() {
            if let Some(on_notify) = &self.on_notify {
                tracing::info!("heartbeat: completed, delivering result");
                on_notify(result.clone()).await?;
            }
        }

        Ok(Some(result))
    }

    /// Missing, unreadable, or template-only content is "nothing to check",
    /// never an error.
    async fn read_trigger_file(&self) -> Option<String> {
        let content = tokio::fs::read_to_string(self.heartbeat_path()).await.ok()?;
        if is_effectively_empty(&content) {
            None
        } else {
            Some(content)
        }
    }

    async fn decide(&self, content: &str) -> Result<HeartbeatDecision> {
        let messages = vec![
            ChatMessage::system(
                "You are a heartbeat agent. Call the heartbeat tool to report your decision.",
            ),
            ChatMessage::user(format!(
                "Review the following {HEARTBEAT_FILE} and decide whether there are active \
                 tasks.\n\n{content}"
            )),
        ];

        let response = self
            .provider
            .chat(&messages, &[heartbeat_tool()], &self.model)
            .await
            .context("heartbeat decision request failed")?;

        let Some(call) = response.tool_calls.first() else {
            return Ok(HeartbeatDecision::skip());
        };

        let args = ToolArguments::coerce(&call.arguments)?;
        let action = match args.field_text("action").as_deref() {
            Some("run") => HeartbeatAction::Run,
            _ => HeartbeatAction::Skip,
        };
        Ok(HeartbeatDecision {
            action,
            tasks: args.field_text("tasks").unwrap_or_default(),
        })
    }
}

fn heartbeat_tool() -> ToolSpec {
    ToolSpec {
        name: "heartbeat".to_string(),
        description: "Report heartbeat decision after reviewing tasks.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["skip", "run"],
                    "description": "skip = nothing to do, run = has active tasks"
                },
                "tasks": {
                    "type": "string",
                    "description": "Natural-language summary of active tasks (required for run)"
                }
            },
            "required": ["action"]
        }),
    }
}

/// True when the checklist contains only scaffolding: whitespace, markdown
/// headers, HTML comments, and empty list markers.
fn is_effectively_empty(content: &str) -> bool {
    strip_html_comments(content).lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty()
            || trimmed.starts_with('#')
            || matches!(trimmed, "- [ ]" | "- [x]" | "-" | "*")
    })
}

fn strip_html_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(open) = rest.find("<!--") {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find("-->") else {
            // Unclosed comment swallows the remainder.
            return out;
        };
        rest = &rest[open + close + 3..];
    }
    out.push_str(rest);
    out
}
