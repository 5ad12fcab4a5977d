//! Session transcript: an ordered message log plus a consolidation watermark.

use crate::providers::MessageRole;
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<SessionMessage>,
    /// Index one past the last message already folded into long-term memory.
    /// Trimming the in-memory log afterwards is the caller's concern.
    pub last_consolidated: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            last_consolidated: 0,
        }
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(SessionMessage {
            role,
            content: content.into(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M").to_string(),
        });
    }

    pub fn mark_consolidated(&mut self) {
        self.last_consolidated = self.messages.len();
    }

    /// Render the full log as prompt-ready text, one message per line.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}] {}: {}", m.timestamp, m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a recorded transcript: one JSON message per line.
    pub fn from_jsonl(content: &str) -> Result<Self> {
        let mut session = Self::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let message: SessionMessage = serde_json::from_str(line)
                .with_context(|| format!("invalid transcript line {}", i + 1))?;
            session.messages.push(message);
        }
        Ok(session)
    }

    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(&serde_json::to_string(message).context("serialize session message")?);
            out.push('\n');
        }
        Ok(out)
    }
}
