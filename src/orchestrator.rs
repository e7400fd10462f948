// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session RAG orchestrator
//!
//! The facade the HTTP layer talks to: workspace lifecycle, document
//! ingestion and conversational turns, all keyed by session token.
//! Sessions are independent units of work; within a session, every
//! durable read-modify-write cycle runs under an exclusive asynchronous
//! lock. Lock scope covers persistence only — embedding and
//! language-model calls run outside the critical section.

use crate::config::OrchestratorConfig;
use crate::errors::{OrchestratorError, Result};
use crate::index::IndexManager;
use crate::ingest::{DocumentChunk, ExtractionQuality, IngestionPipeline};
use crate::memory::{ConversationLog, TurnMessage};
use crate::providers::{EmbeddingProvider, LanguageModel, OllamaChat, OllamaEmbeddings};
use crate::session::WorkspaceLayout;
use crate::workflow::{ConversationWorkflow, IndexRetriever};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReceipt {
    pub chunks_added: usize,
    pub chunks_dropped: usize,
}

/// One file that failed inside a batch ingestion.
#[derive(Debug)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub reason: String,
    pub retryable: bool,
}

/// Outcome of a multi-file ingestion: aggregated counts plus per-file
/// failures. A failing file never aborts the rest of the batch.
#[derive(Debug, Default)]
pub struct BatchIngestReceipt {
    pub chunks_added: usize,
    pub chunks_dropped: usize,
    pub failures: Vec<IngestFailure>,
}

/// Per-session exclusive locks.
///
/// Serializes durable mutations within a session while imposing no
/// ordering across sessions.
struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, token: &Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.inner.lock().await;
            registry
                .entry(*token)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    async fn forget(&self, token: &Uuid) {
        self.inner.lock().await.remove(token);
    }
}

/// Per-conversation RAG orchestration engine.
pub struct Orchestrator {
    config: OrchestratorConfig,
    layout: WorkspaceLayout,
    pipeline: IngestionPipeline,
    index: Arc<IndexManager>,
    memory: ConversationLog,
    workflow: ConversationWorkflow,
    locks: SessionLocks,
}

impl Orchestrator {
    /// Construct with explicit capability providers.
    pub fn with_providers(
        config: OrchestratorConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let layout = WorkspaceLayout::new(config.data_root.clone());
        let pipeline = IngestionPipeline::new(config.chunk_size, config.chunk_overlap);
        let index = Arc::new(IndexManager::new(
            layout.clone(),
            embedder,
            config.index_cache_entries,
        ));
        let memory = ConversationLog::new(layout.clone());
        let workflow = ConversationWorkflow::new(llm);

        Self {
            config,
            layout,
            pipeline,
            index,
            memory,
            workflow,
            locks: SessionLocks::new(),
        }
    }

    /// Construct with the configured Ollama endpoints.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self> {
        let embedder = Arc::new(OllamaEmbeddings::new(config.embedding.clone())?);
        let llm = Arc::new(OllamaChat::new(config.language_model.clone())?);
        Ok(Self::with_providers(config, embedder, llm))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Idempotent: ensure the session's storage locations exist.
    pub async fn create_session_workspace(&self, token: &Uuid) -> Result<()> {
        self.layout.create(token).await?;
        tracing::info!(session = %token, "session workspace ready");
        Ok(())
    }

    /// Idempotent: remove index, memory partition and ingested-document
    /// storage for the session.
    pub async fn destroy_session_workspace(&self, token: &Uuid) -> Result<()> {
        {
            let _guard = self.locks.acquire(token).await;
            self.index.invalidate(token).await;
            self.layout.destroy(token).await?;
        }
        self.locks.forget(token).await;
        tracing::info!(session = %token, "session workspace destroyed");
        Ok(())
    }

    /// Ingest one source file into the session's index.
    ///
    /// `quality` falls back to the configured default; it is a uniform
    /// parameter on every ingestion path.
    pub async fn ingest(
        &self,
        token: &Uuid,
        path: &Path,
        quality: Option<ExtractionQuality>,
    ) -> Result<IngestReceipt> {
        self.require_session(token).await?;
        let quality = quality.unwrap_or(self.config.default_quality);
        let chunks = self.pipeline.extract(path, quality).await?;
        self.add_documents(token, chunks).await
    }

    /// Ingest a batch of files with per-file error isolation.
    pub async fn ingest_files(
        &self,
        token: &Uuid,
        paths: &[PathBuf],
        quality: Option<ExtractionQuality>,
    ) -> Result<BatchIngestReceipt> {
        self.require_session(token).await?;

        let mut receipt = BatchIngestReceipt::default();
        for path in paths {
            match self.ingest(token, path, quality).await {
                Ok(file_receipt) => {
                    receipt.chunks_added += file_receipt.chunks_added;
                    receipt.chunks_dropped += file_receipt.chunks_dropped;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file ingestion failed");
                    receipt.failures.push(IngestFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                }
            }
        }
        Ok(receipt)
    }

    /// Add pre-chunked documents to the session's index.
    ///
    /// Chunks that cannot be sanitized to scalar metadata are dropped
    /// and counted in the receipt. Embedding runs before the session
    /// lock is taken; only the load-append-persist cycle holds it.
    pub async fn add_documents(
        &self,
        token: &Uuid,
        chunks: Vec<DocumentChunk>,
    ) -> Result<IngestReceipt> {
        self.require_session(token).await?;

        let (records, chunks_dropped) = self.index.prepare_records(chunks).await?;

        let _guard = self.locks.acquire(token).await;
        let chunks_added = self.index.append_records(token, records).await?;

        Ok(IngestReceipt {
            chunks_added,
            chunks_dropped,
        })
    }

    /// Run one conversational turn and return the assistant message.
    ///
    /// The turn commits exactly two durable entries on success. A
    /// provider failure or cancellation mid-turn commits nothing,
    /// leaving the session resumable from its last committed turn.
    pub async fn turn(
        &self,
        token: &Uuid,
        user_message: &str,
        cancel: CancellationToken,
    ) -> Result<String> {
        self.require_session(token).await?;

        let history = {
            let _guard = self.locks.acquire(token).await;
            self.memory.load(token).await?
        };

        let retriever =
            IndexRetriever::new(self.index.clone(), *token, self.config.retrieval_k);
        let answer = self
            .workflow
            .run_turn(&history, user_message, &retriever, &cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        {
            let _guard = self.locks.acquire(token).await;
            self.memory.append_turn(token, user_message, &answer).await?;
        }

        tracing::info!(session = %token, "turn completed");
        Ok(answer)
    }

    /// Replay the committed conversation history.
    pub async fn history(&self, token: &Uuid) -> Result<Vec<TurnMessage>> {
        self.require_session(token).await?;
        self.memory.load(token).await
    }

    /// Number of chunks currently indexed for the session.
    pub async fn indexed_chunk_count(&self, token: &Uuid) -> Result<usize> {
        self.require_session(token).await?;
        Ok(self.index.chunk_count(token).await)
    }

    async fn require_session(&self, token: &Uuid) -> Result<()> {
        if self.layout.exists(token).await {
            Ok(())
        } else {
            Err(OrchestratorError::NotFound(token.to_string()))
        }
    }
}
