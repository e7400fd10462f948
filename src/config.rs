// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Orchestrator configuration
//!
//! One explicit configuration object passed at construction. There is no
//! process-wide mutable state: provider endpoints, chunking parameters and
//! the data root all travel through this struct.

use crate::ingest::ExtractionQuality;
use std::path::PathBuf;

/// Endpoint configuration for the embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingEndpointConfig {
    /// Base URL of the Ollama-compatible API
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Vector dimensions produced by the model
    pub dimensions: usize,
}

impl Default for EmbeddingEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "mxbai-embed-large".to_string(),
            dimensions: 1024,
        }
    }
}

/// Endpoint configuration for the language-model provider.
#[derive(Debug, Clone)]
pub struct ChatEndpointConfig {
    /// Base URL of the Ollama-compatible API
    pub base_url: String,
    /// Chat model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ChatEndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.0,
        }
    }
}

/// Configuration for the orchestration core.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root directory holding all session workspaces
    pub data_root: PathBuf,
    /// Character budget per chunk
    pub chunk_size: usize,
    /// Character overlap carried between consecutive chunks
    pub chunk_overlap: usize,
    /// Number of chunks returned per retrieval
    pub retrieval_k: usize,
    /// Extraction quality used when the caller does not choose one
    pub default_quality: ExtractionQuality,
    /// Number of loaded session indexes kept in memory
    pub index_cache_entries: usize,
    /// Embedding provider endpoint
    pub embedding: EmbeddingEndpointConfig,
    /// Language-model provider endpoint
    pub language_model: ChatEndpointConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            chunk_size: 1200,
            chunk_overlap: 150,
            retrieval_k: 2,
            default_quality: ExtractionQuality::HiRes,
            index_cache_entries: 16,
            embedding: EmbeddingEndpointConfig::default(),
            language_model: ChatEndpointConfig::default(),
        }
    }
}
