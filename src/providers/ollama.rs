// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ollama-backed provider implementations
//!
//! Both capabilities speak the local Ollama HTTP API: `/api/chat` for the
//! language model (with tool declarations) and `/api/embed` for batch
//! embeddings. Every transport or status failure maps to
//! `OrchestratorError::Provider` so the workflow can classify it as
//! retryable without committing a partial turn.

use crate::config::{ChatEndpointConfig, EmbeddingEndpointConfig};
use crate::errors::{OrchestratorError, Result};
use crate::providers::{ChatMessage, ChatOutcome, EmbeddingProvider, LanguageModel, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| OrchestratorError::Provider(format!("failed to build HTTP client: {}", e)))
}

/// Language-model provider speaking the Ollama chat API.
pub struct OllamaChat {
    config: ChatEndpointConfig,
    http: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: ChatEndpointConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: build_client()?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    options: ChatOptions,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatOutcome> {
        let url = format!("{}/api/chat", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            tools: tools
                .iter()
                .map(|spec| WireTool {
                    kind: "function",
                    function: spec,
                })
                .collect(),
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestratorError::Provider(format!("chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Provider(format!(
                "chat endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Provider(format!("invalid chat response: {}", e)))?;

        Ok(ChatOutcome {
            content: payload.message.content,
            tool_calls: payload.message.tool_calls,
        })
    }
}

/// Embedding provider speaking the Ollama embed API.
pub struct OllamaEmbeddings {
    config: EmbeddingEndpointConfig,
    http: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(config: EmbeddingEndpointConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: build_client()?,
        })
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestratorError::Provider(format!("embed request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Provider(format!(
                "embed endpoint returned {}: {}",
                status,
                body.trim()
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Provider(format!("invalid embed response: {}", e)))?;

        if payload.embeddings.len() != texts.len() {
            return Err(OrchestratorError::Provider(format!(
                "embed endpoint returned {} vectors for {} inputs",
                payload.embeddings.len(),
                texts.len()
            )));
        }

        for vector in &payload.embeddings {
            if vector.len() != self.config.dimensions {
                return Err(OrchestratorError::Provider(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.config.dimensions,
                    vector.len()
                )));
            }
        }

        Ok(payload.embeddings)
    }
}
