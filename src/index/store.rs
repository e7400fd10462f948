// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session vector index manager
//!
//! Owns one similarity-searchable index per session: persisted chunk
//! records in a bincode artifact under the session workspace, plus a
//! derived in-memory HNSW graph. A missing or unreadable artifact is an
//! expected state (no documents yet), never a fatal error — the artifact
//! is rebuildable from source documents.
//!
//! Durability precedes response: every mutation rewrites the artifact
//! (tmp file + rename) before the call returns.

use crate::errors::{OrchestratorError, Result};
use crate::index::cache::IndexCache;
use crate::index::hnsw::HnswGraph;
use crate::ingest::DocumentChunk;
use crate::providers::EmbeddingProvider;
use crate::session::WorkspaceLayout;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A metadata value that is representable in the persisted format.
///
/// The scalar restriction of the index is enforced here at the type
/// level: nothing nested ever reaches the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ScalarValue {
    /// Convert a JSON value, or `None` when it is not a scalar.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(ScalarValue::Str(s.clone())),
            Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ScalarValue::Int(i))
                } else {
                    n.as_f64().map(ScalarValue::Float)
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Str(s) => write!(f, "{}", s),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Sanitize chunk metadata for indexing.
///
/// Null fields are stripped; any array or object value makes the chunk
/// unsanitizable and the chunk is dropped (and counted by the caller).
pub fn sanitize_metadata(
    metadata: &serde_json::Map<String, Value>,
) -> Option<BTreeMap<String, ScalarValue>> {
    let mut out = BTreeMap::new();
    for (key, value) in metadata {
        match value {
            Value::Null => continue,
            Value::Array(_) | Value::Object(_) => return None,
            other => {
                let scalar = ScalarValue::from_json(other)?;
                out.insert(key.clone(), scalar);
            }
        }
    }
    Some(out)
}

/// One persisted chunk: text, scalar metadata and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub text: String,
    pub metadata: BTreeMap<String, ScalarValue>,
    pub vector: Vec<f32>,
}

/// On-disk artifact layout. Record order is append order.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    dimensions: usize,
    records: Vec<ChunkRecord>,
}

/// A search hit: chunk content plus cosine similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub metadata: BTreeMap<String, ScalarValue>,
    pub score: f32,
}

/// Search result: an absent index is a sentinel, never an error.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The session has no index yet (no documents ingested)
    NoIndex,
    /// Hits sorted by similarity descending, at most `k`
    Hits(Vec<ScoredChunk>),
}

/// A loaded session index: records plus the derived search graph.
pub struct SessionIndex {
    dimensions: usize,
    records: Vec<ChunkRecord>,
    graph: HnswGraph,
}

impl SessionIndex {
    pub fn from_records(records: Vec<ChunkRecord>, dimensions: usize) -> anyhow::Result<Self> {
        let vectors: Vec<Vec<f32>> = records.iter().map(|r| r.vector.clone()).collect();
        let graph = HnswGraph::build(&vectors, dimensions)?;
        Ok(Self {
            dimensions,
            records,
            graph,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.records.len()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let hits = self.graph.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(position, score)| {
                self.records.get(position).map(|record| ScoredChunk {
                    chunk_id: record.chunk_id.clone(),
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    score,
                })
            })
            .collect())
    }
}

/// Per-session vector index lifecycle: load, append, search, persist.
pub struct IndexManager {
    layout: WorkspaceLayout,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Mutex<IndexCache>,
}

impl IndexManager {
    pub fn new(
        layout: WorkspaceLayout,
        embedder: Arc<dyn EmbeddingProvider>,
        cache_entries: usize,
    ) -> Self {
        Self {
            layout,
            embedder,
            cache: Mutex::new(IndexCache::new(cache_entries)),
        }
    }

    /// Load the session's index, or report it absent.
    ///
    /// Read and decode failures degrade to "absent": the artifact is
    /// derived state, rebuildable from the session's source documents.
    pub async fn load_or_create(&self, token: &Uuid) -> Option<Arc<SessionIndex>> {
        if let Some(index) = self.cache.lock().await.get(token) {
            return Some(index);
        }

        let path = self.layout.index_path(token);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(session = %token, error = %e, "index artifact unreadable, treating as absent");
                return None;
            }
        };

        let persisted: PersistedIndex = match bincode::deserialize(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!(session = %token, error = %e, "index artifact corrupt, treating as absent");
                return None;
            }
        };

        let index = match SessionIndex::from_records(persisted.records, persisted.dimensions) {
            Ok(index) => Arc::new(index),
            Err(e) => {
                tracing::warn!(session = %token, error = %e, "index graph rebuild failed, treating as absent");
                return None;
            }
        };

        self.cache.lock().await.insert(*token, index.clone());
        Some(index)
    }

    /// Sanitize and embed chunks into records, counting dropped chunks.
    ///
    /// Pure preparation: no lock is needed and no durable state is
    /// touched, so the (slow) embedding round-trip can run outside the
    /// session's critical section.
    pub async fn prepare_records(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> Result<(Vec<ChunkRecord>, usize)> {
        let mut kept: Vec<(DocumentChunk, BTreeMap<String, ScalarValue>)> = Vec::new();
        let mut dropped = 0usize;

        for chunk in chunks {
            match sanitize_metadata(&chunk.metadata) {
                Some(metadata) => kept.push((chunk, metadata)),
                None => {
                    dropped += 1;
                    tracing::warn!(chunk_id = %chunk.id, "dropping chunk with non-scalar metadata");
                }
            }
        }

        if kept.is_empty() {
            return Ok((Vec::new(), dropped));
        }

        let texts: Vec<String> = kept.iter().map(|(chunk, _)| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != kept.len() {
            return Err(OrchestratorError::Provider(format!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                kept.len()
            )));
        }

        let records = kept
            .into_iter()
            .zip(vectors)
            .map(|((chunk, metadata), vector)| ChunkRecord {
                chunk_id: chunk.id,
                text: chunk.text,
                metadata,
                vector,
            })
            .collect();

        Ok((records, dropped))
    }

    /// Append records to the session's index and persist synchronously.
    ///
    /// The caller must hold the session's exclusive lock: this is the
    /// load-append-save critical section. Empty input on an absent index
    /// is a no-op, not an error. Returns the number of records appended.
    pub async fn append_records(&self, token: &Uuid, records: Vec<ChunkRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let dimensions = self.embedder.dimensions();
        for record in &records {
            if record.vector.len() != dimensions {
                return Err(OrchestratorError::Provider(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    dimensions,
                    record.vector.len()
                )));
            }
        }

        let mut all_records = match self.load_or_create(token).await {
            Some(existing) => {
                if existing.dimensions() != dimensions {
                    return Err(OrchestratorError::Provider(format!(
                        "index dimension mismatch: artifact has {}, provider produces {}",
                        existing.dimensions(),
                        dimensions
                    )));
                }
                existing.records().to_vec()
            }
            None => Vec::new(),
        };

        let appended = records.len();
        all_records.extend(records);

        self.persist(token, dimensions, &all_records).await?;

        let index = SessionIndex::from_records(all_records, dimensions)
            .map_err(|e| OrchestratorError::Provider(format!("index rebuild failed: {}", e)))?;
        self.cache.lock().await.insert(*token, Arc::new(index));

        tracing::info!(session = %token, appended, "chunks added to session index");
        Ok(appended)
    }

    /// Search the session's index with a text query.
    pub async fn search(&self, token: &Uuid, query: &str, k: usize) -> Result<SearchOutcome> {
        let index = match self.load_or_create(token).await {
            Some(index) => index,
            None => return Ok(SearchOutcome::NoIndex),
        };

        let query_vector = self.embedder.embed_query(query).await?;
        let hits = index
            .search(&query_vector, k)
            .map_err(|e| OrchestratorError::Provider(format!("index search failed: {}", e)))?;

        Ok(SearchOutcome::Hits(hits))
    }

    /// Number of chunks currently indexed for the session.
    pub async fn chunk_count(&self, token: &Uuid) -> usize {
        match self.load_or_create(token).await {
            Some(index) => index.chunk_count(),
            None => 0,
        }
    }

    /// Drop the cached index for a session (workspace destroyed or
    /// artifact removed out of band).
    pub async fn invalidate(&self, token: &Uuid) {
        self.cache.lock().await.invalidate(token);
    }

    async fn persist(
        &self,
        token: &Uuid,
        dimensions: usize,
        records: &[ChunkRecord],
    ) -> Result<()> {
        let artifact = PersistedIndex {
            dimensions,
            records: records.to_vec(),
        };
        let bytes = bincode::serialize(&artifact).map_err(|e| {
            OrchestratorError::Provider(format!("index artifact encode failed: {}", e))
        })?;

        let path = self.layout.index_path(token);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename keeps the previous artifact intact on failure
        let tmp = path.with_extension("bin.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
