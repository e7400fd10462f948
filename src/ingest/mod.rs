// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Document ingestion pipeline
//!
//! load -> clean -> chunk. The pipeline is a pure producer: it reads a
//! source file and yields cleaned chunks with scalar metadata, and never
//! touches durable state — only the index manager writes.

pub mod chunker;
pub mod clean;
pub mod extract;

pub use extract::ExtractionQuality;

use crate::errors::Result;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A unit of retrievable text: cleaned content plus metadata.
///
/// Metadata is arbitrary JSON at this stage; the index manager sanitizes
/// it down to scalars before anything is persisted.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    /// Content hash identifying this chunk
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let text = text.into();
        let id = hash_chunk("inline", 0, &text);
        Self { id, text, metadata }
    }
}

fn hash_chunk(source: &str, ordinal: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(ordinal.to_le_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Document ingestion pipeline: extraction, cleaning and chunking.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionPipeline {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Load one source file and produce cleaned chunks.
    ///
    /// `quality` selects the extraction strategy only; cleaning, chunking
    /// and metadata behavior are identical across qualities.
    pub async fn extract(
        &self,
        path: &Path,
        quality: ExtractionQuality,
    ) -> Result<Vec<DocumentChunk>> {
        let raw = extract::extract_text(path, quality).await?;
        let cleaned = clean::clean_text(&raw);

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let chunks = chunker::chunk_text(&cleaned, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| {
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), Value::from(source.clone()));
                metadata.insert("ordinal".to_string(), Value::from(ordinal as u64));
                metadata.insert("quality".to_string(), Value::from(quality.as_str()));
                let id = hash_chunk(&source, ordinal, &text);
                DocumentChunk { id, text, metadata }
            })
            .collect::<Vec<_>>();

        tracing::info!(
            source = %source,
            chunks = chunks.len(),
            quality = quality.as_str(),
            "documents loaded"
        );

        Ok(chunks)
    }
}
