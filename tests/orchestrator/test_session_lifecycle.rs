// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Session workspace lifecycle: isolation, idempotency, unknown sessions

use super::support::{direct_answer, test_config, HashEmbedder, ScriptedModel};
use fabstir_rag_node::{DocumentChunk, Orchestrator};
use serde_json::Map;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn orchestrator(data_root: &std::path::Path, responses: Vec<fabstir_rag_node::ChatOutcome>) -> Orchestrator {
    super::support::init_tracing();
    Orchestrator::with_providers(
        test_config(data_root),
        Arc::new(HashEmbedder::new()),
        Arc::new(ScriptedModel::new(responses)),
    )
}

fn chunk(text: &str) -> DocumentChunk {
    DocumentChunk::new(text, Map::new())
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path(), vec![]);
    let token = Uuid::new_v4();

    orch.create_session_workspace(&token).await.unwrap();
    orch.create_session_workspace(&token).await.unwrap();
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 0);
}

#[tokio::test]
async fn test_destroy_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path(), vec![]);
    let token = Uuid::new_v4();

    orch.create_session_workspace(&token).await.unwrap();
    orch.destroy_session_workspace(&token).await.unwrap();
    orch.destroy_session_workspace(&token).await.unwrap();
}

#[tokio::test]
async fn test_destroy_then_create_yields_fresh_session() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path(), vec![direct_answer("hi")]);
    let token = Uuid::new_v4();

    orch.create_session_workspace(&token).await.unwrap();
    orch.add_documents(&token, vec![chunk("some indexed content")])
        .await
        .unwrap();
    orch.turn(&token, "hello", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 1);
    assert_eq!(orch.history(&token).await.unwrap().len(), 2);

    // Recreating under the same token must leak nothing from the
    // previous generation
    orch.destroy_session_workspace(&token).await.unwrap();
    orch.create_session_workspace(&token).await.unwrap();

    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 0);
    assert!(orch.history(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_surfaced() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path(), vec![]);
    let token = Uuid::new_v4();

    let err = orch.history(&token).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");

    let err = orch
        .turn(&token, "hello", CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");

    let err = orch
        .add_documents(&token, vec![chunk("text")])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(tmp.path(), vec![]);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    orch.create_session_workspace(&first).await.unwrap();
    orch.create_session_workspace(&second).await.unwrap();

    orch.add_documents(&first, vec![chunk("belongs to the first session")])
        .await
        .unwrap();

    assert_eq!(orch.indexed_chunk_count(&first).await.unwrap(), 1);
    assert_eq!(orch.indexed_chunk_count(&second).await.unwrap(), 0);

    orch.destroy_session_workspace(&first).await.unwrap();
    assert_eq!(orch.indexed_chunk_count(&second).await.unwrap(), 0);
}
