//! The consolidation engine.
//!
//! Layout under the workspace:
//!   `MEMORY.md`          — current distilled memory, replaced wholesale
//!   `memory/HISTORY.md`  — one entry per consolidation event, append-only

use crate::providers::{ChatMessage, Provider, ToolArguments, ToolSpec};
use crate::session::Session;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

const SAVE_MEMORY_TOOL: &str = "save_memory";

/// How a consolidation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationDisposition {
    /// The session has not grown past the memory window yet; nothing to do.
    SkippedNotDue,
    /// History and snapshot were both written.
    Consolidated,
    /// The model answered without a usable `save_memory` call; nothing was
    /// written. Distinct from `SkippedNotDue` — this one was attempted.
    NoToolCall,
}

pub struct MemoryStore {
    workspace_dir: PathBuf,
}

impl MemoryStore {
    pub fn new(workspace_dir: &Path) -> Self {
        Self {
            workspace_dir: workspace_dir.to_path_buf(),
        }
    }

    fn memory_dir(&self) -> PathBuf {
        self.workspace_dir.join("memory")
    }

    /// Append-only archive of consolidation entries.
    pub fn history_path(&self) -> PathBuf {
        self.memory_dir().join("HISTORY.md")
    }

    /// The current snapshot; each consolidation replaces it entirely.
    pub fn snapshot_path(&self) -> PathBuf {
        self.workspace_dir.join("MEMORY.md")
    }

    fn save_memory_tool() -> ToolSpec {
        ToolSpec {
            name: SAVE_MEMORY_TOOL.to_string(),
            description: "Persist the consolidated conversation memory.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "history_entry": {
                        "type": "string",
                        "description": "Dated one-entry summary of this conversation window for the archive"
                    },
                    "memory_update": {
                        "type": "string",
                        "description": "The complete updated long-term memory, replacing the previous snapshot"
                    }
                },
                "required": ["history_entry", "memory_update"]
            }),
        }
    }

    /// Compress the session log into a history entry and a fresh snapshot.
    ///
    /// Provider output is normalized through [`ToolArguments`], so argument
    /// shape quirks never reach the files. Both writes must succeed before
    /// `Consolidated` is reported; any failure surfaces as `Err` and the
    /// caller must not treat the pass as successful.
    pub async fn consolidate(
        &self,
        session: &Session,
        provider: &dyn Provider,
        model: &str,
        memory_window: usize,
    ) -> Result<ConsolidationDisposition> {
        if session.messages.len() < memory_window {
            tracing::debug!(
                messages = session.messages.len(),
                memory_window,
                "consolidation not due"
            );
            return Ok(ConsolidationDisposition::SkippedNotDue);
        }

        let messages = vec![
            ChatMessage::system(
                "You maintain the agent's long-term memory. Review the conversation and call \
                 save_memory with a dated history entry and the full updated memory snapshot.",
            ),
            ChatMessage::user(format!(
                "Consolidate the following conversation into long-term memory.\n\n{}",
                session.transcript()
            )),
        ];

        let response = provider
            .chat(&messages, &[Self::save_memory_tool()], model)
            .await
            .context("memory consolidation request failed")?;

        let Some(call) = response.tool_call(SAVE_MEMORY_TOOL) else {
            tracing::warn!("consolidation response carried no save_memory call");
            return Ok(ConsolidationDisposition::NoToolCall);
        };

        let args = ToolArguments::coerce(&call.arguments)?;
        let history_entry = args.require_text("history_entry")?;
        let memory_update = args.require_text("memory_update")?;

        self.append_history(&history_entry).await?;
        self.write_snapshot(&memory_update).await?;

        tracing::info!(
            messages = session.messages.len(),
            "session consolidated into long-term memory"
        );
        Ok(ConsolidationDisposition::Consolidated)
    }

    async fn append_history(&self, entry: &str) -> Result<()> {
        fs::create_dir_all(self.memory_dir())
            .await
            .context("create memory directory")?;

        let path = self.history_path();
        let existing = if path.exists() {
            fs::read_to_string(&path).await.unwrap_or_default()
        } else {
            String::new()
        };

        // One entry per line; prior entries are never rewritten.
        let updated = format!("{existing}{entry}\n");
        fs::write(&path, updated)
            .await
            .context("append history entry")?;
        Ok(())
    }

    async fn write_snapshot(&self, content: &str) -> Result<()> {
        fs::create_dir_all(&self.workspace_dir)
            .await
            .context("create workspace directory")?;
        fs::write(self.snapshot_path(), content)
            .await
            .context("write memory snapshot")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_the_workspace() {
        let store = MemoryStore::new(Path::new("/tmp/ws"));
        assert_eq!(store.snapshot_path(), PathBuf::from("/tmp/ws/MEMORY.md"));
        assert_eq!(
            store.history_path(),
            PathBuf::from("/tmp/ws/memory/HISTORY.md")
        );
    }

    #[test]
    fn save_memory_tool_requires_both_fields() {
        let spec = MemoryStore::save_memory_tool();
        assert_eq!(spec.name, "save_memory");
        let required = spec.parameters["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "history_entry"));
        assert!(required.iter().any(|v| v == "memory_update"));
    }

    #[test]
    fn history_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());

        tokio_test::block_on(async {
            store.append_history("first").await.unwrap();
            store.append_history("second").await.unwrap();
        });

        let content = std::fs::read_to_string(store.history_path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn snapshot_is_replaced_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path());

        tokio_test::block_on(async {
            store.write_snapshot("old state").await.unwrap();
            store.write_snapshot("new state").await.unwrap();
        });

        let content = std::fs::read_to_string(store.snapshot_path()).unwrap();
        assert_eq!(content, "new state");
    }
}
