// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Ingestion: receipts, sanitization drops, batch isolation, index growth

use super::support::{test_config, HashEmbedder, ScriptedModel, EMBED_DIMENSIONS};
use fabstir_rag_node::{
    DocumentChunk, ExtractionQuality, IndexManager, Orchestrator, SearchOutcome, WorkspaceLayout,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

fn orchestrator(data_root: &std::path::Path) -> Orchestrator {
    super::support::init_tracing();
    Orchestrator::with_providers(
        test_config(data_root),
        Arc::new(HashEmbedder::new()),
        Arc::new(ScriptedModel::new(vec![])),
    )
}

fn chunk_with_metadata(text: &str, metadata: Value) -> DocumentChunk {
    let metadata = match metadata {
        Value::Object(map) => map,
        _ => panic!("metadata must be an object"),
    };
    DocumentChunk::new(text, metadata)
}

fn chunk(text: &str) -> DocumentChunk {
    DocumentChunk::new(text, Map::new())
}

#[tokio::test]
async fn test_ingest_file_produces_receipt() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let doc = tmp.path().join("upload.txt");
    std::fs::write(&doc, "a short document about nothing in particular").unwrap();

    let receipt = orch
        .ingest(&token, &doc, Some(ExtractionQuality::Fast))
        .await
        .unwrap();

    assert_eq!(receipt.chunks_added, 1);
    assert_eq!(receipt.chunks_dropped, 0);
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 1);
}

#[tokio::test]
async fn test_non_scalar_metadata_chunks_are_dropped_and_counted() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let chunks = vec![
        chunk_with_metadata("first", json!({"source": "a.txt"})),
        chunk_with_metadata("second", json!({"source": "a.txt", "page": 1})),
        chunk_with_metadata("third", json!({"source": "a.txt", "draft": true})),
        chunk_with_metadata("fourth", json!({"source": "a.txt", "score": 0.5})),
        chunk_with_metadata("fifth", json!({"source": "a.txt", "tags": ["x", "y"]})),
    ];

    let receipt = orch.add_documents(&token, chunks).await.unwrap();
    assert_eq!(receipt.chunks_added, 4);
    assert_eq!(receipt.chunks_dropped, 1);
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 4);
}

#[tokio::test]
async fn test_empty_input_is_a_no_op() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let receipt = orch.add_documents(&token, vec![]).await.unwrap();
    assert_eq!(receipt.chunks_added, 0);
    assert_eq!(receipt.chunks_dropped, 0);
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 0);

    // No artifact is created for an empty add
    let layout = WorkspaceLayout::new(tmp.path());
    assert!(!layout.index_path(&token).exists());
}

#[tokio::test]
async fn test_sequential_ingestion_accumulates() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let first = vec![chunk("the sky is blue"), chunk("grass is green")];
    let second = vec![chunk("water is wet")];

    orch.add_documents(&token, first).await.unwrap();
    orch.add_documents(&token, second).await.unwrap();

    // Earlier chunks survive later additions
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 3);

    // Search over the union finds content from both batches
    let manager = IndexManager::new(
        WorkspaceLayout::new(tmp.path()),
        Arc::new(HashEmbedder::new()),
        4,
    );
    let outcome = manager
        .search(&token, "the sky is blue", 3)
        .await
        .unwrap();
    match outcome {
        SearchOutcome::Hits(hits) => {
            assert_eq!(hits.len(), 3);
            assert_eq!(hits[0].text, "the sky is blue");
        }
        SearchOutcome::NoIndex => panic!("index should exist"),
    }
}

#[tokio::test]
async fn test_search_on_fresh_session_reports_no_index() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let manager = IndexManager::new(
        WorkspaceLayout::new(tmp.path()),
        Arc::new(HashEmbedder::new()),
        4,
    );
    let outcome = manager.search(&token, "anything", 2).await.unwrap();
    assert!(matches!(outcome, SearchOutcome::NoIndex));
}

#[tokio::test]
async fn test_unsupported_format_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let doc = tmp.path().join("spreadsheet.xlsx");
    std::fs::write(&doc, "not really a spreadsheet").unwrap();

    let err = orch.ingest(&token, &doc, None).await.unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_batch_ingestion_isolates_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let good = tmp.path().join("good.txt");
    std::fs::write(&good, "usable content").unwrap();
    let bad = tmp.path().join("bad.xlsx");
    std::fs::write(&bad, "unusable").unwrap();
    let missing = tmp.path().join("missing.txt");

    let receipt = orch
        .ingest_files(&token, &[good, bad, missing], None)
        .await
        .unwrap();

    assert_eq!(receipt.chunks_added, 1);
    assert_eq!(receipt.failures.len(), 2);
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 1);
}

#[tokio::test]
async fn test_index_survives_corrupt_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path());
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    orch.add_documents(&token, vec![chunk("original content")])
        .await
        .unwrap();

    // Corrupt the artifact on disk; a fresh manager must treat it as
    // absent, not fail
    let layout = WorkspaceLayout::new(tmp.path());
    std::fs::write(layout.index_path(&token), b"garbage bytes").unwrap();

    let manager = IndexManager::new(layout, Arc::new(HashEmbedder::new()), 4);
    let outcome = manager.search(&token, "original content", 1).await.unwrap();
    assert!(matches!(outcome, SearchOutcome::NoIndex));
}

#[tokio::test]
async fn test_embedder_dimensions_match_fixture() {
    use fabstir_rag_node::EmbeddingProvider;
    let embedder = HashEmbedder::new();
    let vectors = embedder.embed(&["sample".to_string()]).await.unwrap();
    assert_eq!(vectors[0].len(), EMBED_DIMENSIONS);
}
