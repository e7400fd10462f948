// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval capability
//!
//! The single callable exposed to the language model mid-reasoning. The
//! contract is infallible: whatever happens underneath — absent index,
//! empty session, embedding failure — the model always receives a
//! well-formed tool result it can answer from.

use crate::index::{IndexManager, ScalarValue, ScoredChunk, SearchOutcome};
use crate::providers::ToolSpec;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Fixed summary returned whenever there is nothing to retrieve.
pub const NO_DOCUMENTS_SUMMARY: &str = "No documents in vector store";

/// Name the retrieval tool is declared under.
pub const RETRIEVAL_TOOL_NAME: &str = "retrieve_docs";

/// Result of one retrieval: a model-readable summary plus the raw
/// evidence chunks backing it.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub summary: String,
    pub evidence: Vec<ScoredChunk>,
}

impl RetrievalOutcome {
    fn no_documents() -> Self {
        Self {
            summary: NO_DOCUMENTS_SUMMARY.to_string(),
            evidence: Vec::new(),
        }
    }
}

/// Capability injected into the workflow. Must never fail.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> RetrievalOutcome;
}

/// Retrieval over one session's vector index.
pub struct IndexRetriever {
    manager: Arc<IndexManager>,
    token: Uuid,
    k: usize,
}

impl IndexRetriever {
    pub fn new(manager: Arc<IndexManager>, token: Uuid, k: usize) -> Self {
        Self { manager, token, k }
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str) -> RetrievalOutcome {
        match self.manager.search(&self.token, query, self.k).await {
            Ok(SearchOutcome::NoIndex) => RetrievalOutcome::no_documents(),
            Ok(SearchOutcome::Hits(hits)) if hits.is_empty() => RetrievalOutcome::no_documents(),
            Ok(SearchOutcome::Hits(hits)) => RetrievalOutcome {
                summary: serialize_evidence(&hits),
                evidence: hits,
            },
            Err(e) => {
                // The tool contract forbids raising; degrade to "nothing found"
                tracing::warn!(session = %self.token, error = %e, "retrieval failed, returning empty result");
                RetrievalOutcome::no_documents()
            }
        }
    }
}

/// Declaration handed to the language model at the DECIDE step.
pub fn retrieval_tool_spec() -> ToolSpec {
    ToolSpec {
        name: RETRIEVAL_TOOL_NAME.to_string(),
        description: "Retrieve information related to a query".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        }),
    }
}

fn serialize_evidence(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "Source: {}\nContent: {}",
                format_metadata(&hit.metadata),
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_metadata(metadata: &BTreeMap<String, ScalarValue>) -> String {
    let fields = metadata
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", fields)
}
