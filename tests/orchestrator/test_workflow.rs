// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Conversation turns: decide/retrieve/respond, commits, resumption

use super::support::{
    direct_answer, retrieval_request, test_config, HashEmbedder, ScriptedModel,
};
use fabstir_rag_node::{
    ChatOutcome, DocumentChunk, MessageRole, Orchestrator, Role, NO_DOCUMENTS_SUMMARY,
};
use serde_json::Map;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn orchestrator_with_model(
    data_root: &std::path::Path,
    responses: Vec<ChatOutcome>,
) -> (Orchestrator, Arc<ScriptedModel>) {
    super::support::init_tracing();
    let model = Arc::new(ScriptedModel::new(responses));
    let orch = Orchestrator::with_providers(
        test_config(data_root),
        Arc::new(HashEmbedder::new()),
        model.clone(),
    );
    (orch, model)
}

fn chunk(text: &str) -> DocumentChunk {
    DocumentChunk::new(text, Map::new())
}

#[tokio::test]
async fn test_direct_answer_commits_one_turn() {
    let tmp = tempfile::tempdir().unwrap();
    let (orch, _model) = orchestrator_with_model(tmp.path(), vec![direct_answer("just an answer")]);
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let answer = orch
        .turn(&token, "no retrieval needed", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answer, "just an answer");

    // Exactly one user + one assistant entry, index untouched
    let history = orch.history(&token).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "no retrieval needed");
    assert_eq!(history[1].role, MessageRole::Assistant);
    assert_eq!(history[1].content, "just an answer");
    assert_eq!(orch.indexed_chunk_count(&token).await.unwrap(), 0);
}

#[tokio::test]
async fn test_retrieval_against_empty_session_still_answers() {
    let tmp = tempfile::tempdir().unwrap();
    let (orch, model) = orchestrator_with_model(
        tmp.path(),
        vec![
            retrieval_request("user documents"),
            direct_answer("I have no documents to draw from."),
        ],
    );
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let answer = orch
        .turn(
            &token,
            "What is in my documents?",
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(answer, "I have no documents to draw from.");

    // The RESPOND generation saw the no-documents tool result
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[1][0].role, Role::System);
    assert!(prompts[1][0].content.contains(NO_DOCUMENTS_SUMMARY));

    // Scaffolding stays transient: exactly two durable entries
    let history = orch.history(&token).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_retrieval_feeds_ingested_content_to_respond() {
    let tmp = tempfile::tempdir().unwrap();
    let (orch, model) = orchestrator_with_model(
        tmp.path(),
        vec![
            retrieval_request("the transcript grade"),
            direct_answer("Your grade was excellent."),
        ],
    );
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    orch.add_documents(&token, vec![chunk("the transcript grade"), chunk("unrelated note")])
        .await
        .unwrap();

    let answer = orch
        .turn(&token, "What was my grade?", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answer, "Your grade was excellent.");

    // The retrieved chunk content reaches the constrained generation
    let prompts = model.prompts();
    let system = &prompts[1][0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("the transcript grade"));

    // Filtered history excludes tool scaffolding
    assert!(prompts[1].iter().all(|m| m.role != Role::Tool));
}

#[tokio::test]
async fn test_resume_in_new_process_reproduces_history() {
    let tmp = tempfile::tempdir().unwrap();
    let token = Uuid::new_v4();

    {
        let (orch, _model) =
            orchestrator_with_model(tmp.path(), vec![direct_answer("first answer")]);
        orch.create_session_workspace(&token).await.unwrap();
        orch.turn(&token, "first question", CancellationToken::new())
            .await
            .unwrap();
    }

    // A fresh orchestrator over the same data root stands in for a new
    // process resuming the session
    let (orch, model) = orchestrator_with_model(tmp.path(), vec![direct_answer("second answer")]);
    let history = orch.history(&token).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "first question");
    assert_eq!(history[1].content, "first answer");

    orch.turn(&token, "second question", CancellationToken::new())
        .await
        .unwrap();

    // The prior committed turn was replayed into the new turn's prompt
    let prompts = model.prompts();
    let decide_prompt = &prompts[0];
    assert_eq!(decide_prompt.len(), 3);
    assert_eq!(decide_prompt[0].content, "first question");
    assert_eq!(decide_prompt[1].content, "first answer");
    assert_eq!(decide_prompt[2].content, "second question");

    assert_eq!(orch.history(&token).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_cancelled_turn_commits_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let (orch, _model) = orchestrator_with_model(tmp.path(), vec![direct_answer("unused")]);
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orch.turn(&token, "abandoned", cancel).await.unwrap_err();
    assert_eq!(err.error_code(), "CANCELLED");
    assert!(orch.history(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provider_failure_mid_turn_commits_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    // Script covers DECIDE only; the RESPOND call fails
    let (orch, _model) =
        orchestrator_with_model(tmp.path(), vec![retrieval_request("some query")]);
    let token = Uuid::new_v4();
    orch.create_session_workspace(&token).await.unwrap();

    let err = orch
        .turn(&token, "doomed turn", CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PROVIDER_ERROR");
    assert!(err.is_retryable());

    // Aborted turn leaves the session resumable from its last commit
    assert!(orch.history(&token).await.unwrap().is_empty());
}
