// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod config;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod memory;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod workflow;

// Re-export main types from core modules
pub use config::{ChatEndpointConfig, EmbeddingEndpointConfig, OrchestratorConfig};
pub use errors::{OrchestratorError, Result};
pub use orchestrator::{BatchIngestReceipt, IngestFailure, IngestReceipt, Orchestrator};

// Re-export types from supporting modules
pub use index::{
    ChunkRecord, IndexManager, ScalarValue, ScoredChunk, SearchOutcome, SessionIndex,
};
pub use ingest::{DocumentChunk, ExtractionQuality, IngestionPipeline};
pub use memory::{ConversationLog, MessageRole, TurnMessage};
pub use providers::{
    ChatMessage, ChatOutcome, EmbeddingProvider, LanguageModel, OllamaChat, OllamaEmbeddings,
    Role, ToolCall, ToolFunction, ToolSpec,
};
pub use session::{SessionRef, SessionResolver, WorkspaceLayout};
pub use workflow::{
    ConversationWorkflow, IndexRetriever, RetrievalOutcome, Retriever, NO_DOCUMENTS_SUMMARY,
};
