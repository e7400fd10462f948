// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable conversational memory
//!
//! One append-only JSONL log per session. Each committed turn appends
//! exactly two entries — the user input and the terminal assistant
//! output. Retrieval scaffolding is transient working state and never
//! reaches the log, so replaying it reproduces the filtered history the
//! workflow needs.
//!
//! A missing log is an expected state (fresh session). A log that fails
//! to parse is surfaced as `CorruptState`: conversation history is not
//! reconstructible from anything else.

use crate::errors::{OrchestratorError, Result};
use crate::session::WorkspaceLayout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Role of a durable conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One durable conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TurnMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only conversation log, keyed by session token.
pub struct ConversationLog {
    layout: WorkspaceLayout,
}

impl ConversationLog {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    /// Replay the committed history for a session.
    ///
    /// An absent log yields an empty history. A line that fails to parse
    /// is a `CorruptState` error, never silently skipped.
    pub async fn load(&self, token: &Uuid) -> Result<Vec<TurnMessage>> {
        let path = self.layout.conversation_path(token);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OrchestratorError::Io(e)),
        };

        let mut messages = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let message: TurnMessage = serde_json::from_str(line).map_err(|e| {
                OrchestratorError::CorruptState {
                    session: token.to_string(),
                    reason: format!("conversation log line {}: {}", line_no + 1, e),
                }
            })?;
            messages.push(message);
        }

        Ok(messages)
    }

    /// Commit one completed turn: the user input and the terminal
    /// assistant output, in one durable append.
    ///
    /// The caller must hold the session's exclusive lock.
    pub async fn append_turn(&self, token: &Uuid, user: &str, assistant: &str) -> Result<()> {
        let entries = [
            TurnMessage::new(MessageRole::User, user),
            TurnMessage::new(MessageRole::Assistant, assistant),
        ];

        let mut buffer = String::new();
        for entry in &entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                OrchestratorError::CorruptState {
                    session: token.to_string(),
                    reason: format!("conversation entry encode failed: {}", e),
                }
            })?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        let path = self.layout.conversation_path(token);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.sync_data().await?;

        tracing::debug!(session = %token, "turn committed to conversation log");
        Ok(())
    }
}
