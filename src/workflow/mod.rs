// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Conversation workflow module
// Fixed decide/retrieve/respond state machine plus the retrieval tool

pub mod engine;
pub mod retrieval;

pub use engine::ConversationWorkflow;
pub use retrieval::{
    retrieval_tool_spec, IndexRetriever, RetrievalOutcome, Retriever, NO_DOCUMENTS_SUMMARY,
    RETRIEVAL_TOOL_NAME,
};
