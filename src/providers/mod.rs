// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External capability providers
//!
//! The core consumes two opaque capabilities: an embedding provider that
//! turns text into fixed-dimension vectors, and a language-model provider
//! that turns a message sequence into a response, optionally requesting a
//! tool invocation. Both are narrow `async` traits so the workflow can be
//! driven by the production Ollama client or by deterministic fakes in
//! tests.

pub mod ollama;

pub use ollama::{OllamaChat, OllamaEmbeddings};

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message role inside a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolFunction,
}

/// Name and structured arguments of a requested tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One message in the transient conversation sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn assistant_tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(calls),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Whether this message carries a tool-call request.
    pub fn requests_tool(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Declaration of one callable tool, passed to the language model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool parameters
    pub parameters: serde_json::Value,
}

/// Response of one chat round: either content, or tool-call requests.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Turns text into fixed-dimension vectors. Consumed, not implemented —
/// the orchestrator never looks inside the vectors it is handed.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimensions produced by this provider.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single retrieval query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.embed(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::errors::OrchestratorError::Provider(
                "embedding provider returned no vectors".to_string(),
            ))
    }
}

/// Turns a message sequence into a response, optionally emitting
/// tool-call requests when `tools` is non-empty.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatOutcome>;
}
