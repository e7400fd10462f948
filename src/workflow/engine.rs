// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Conversation workflow state machine
//!
//! One turn runs a fixed graph: DECIDE either answers directly or
//! requests retrieval; RETRIEVE invokes the tool and always succeeds;
//! RESPOND generates the final answer constrained to the retrieved
//! context. The run is transient — committing the completed turn to
//! durable memory is the orchestrator's job, so an abort anywhere in
//! here leaves no trace.

use crate::errors::{OrchestratorError, Result};
use crate::memory::{MessageRole, TurnMessage};
use crate::providers::{ChatMessage, LanguageModel, Role};
use crate::workflow::retrieval::{retrieval_tool_spec, Retriever, RETRIEVAL_TOOL_NAME};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Workflow position within one turn.
#[derive(Debug)]
enum TurnState {
    Decide,
    Retrieve { query: String },
    Respond,
}

const ANSWER_INSTRUCTION: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// The decide/retrieve/respond state machine over one conversation.
pub struct ConversationWorkflow {
    llm: Arc<dyn LanguageModel>,
}

impl ConversationWorkflow {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Execute one turn and return the terminal assistant message.
    ///
    /// `history` is the committed conversation replayed from memory;
    /// retrieval scaffolding produced here stays inside this run.
    pub async fn run_turn(
        &self,
        history: &[TurnMessage],
        user_message: &str,
        retriever: &dyn Retriever,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut messages: Vec<ChatMessage> = history.iter().map(to_chat_message).collect();
        messages.push(ChatMessage::user(user_message));

        let mut state = TurnState::Decide;
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            state = match state {
                TurnState::Decide => {
                    let outcome = self
                        .llm
                        .chat(&messages, std::slice::from_ref(&retrieval_tool_spec()))
                        .await?;

                    match retrieval_query(&outcome.tool_calls, user_message) {
                        Some(query) => {
                            if outcome.tool_calls.len() > 1 {
                                tracing::debug!(
                                    requested = outcome.tool_calls.len(),
                                    "multiple tool calls requested, honoring the first"
                                );
                            }
                            messages.push(ChatMessage::assistant_tool_request(outcome.tool_calls));
                            TurnState::Retrieve { query }
                        }
                        // Direct answer: no retrieval message, RESPOND skipped
                        None => return Ok(outcome.content),
                    }
                }

                TurnState::Retrieve { query } => {
                    tracing::debug!(query = %query, "retrieving context");
                    let result = retriever.retrieve(&query).await;
                    messages.push(ChatMessage::tool(result.summary));
                    TurnState::Respond
                }

                TurnState::Respond => {
                    let context = recent_tool_context(&messages);
                    let system = ChatMessage::system(format!("{}\n\n{}", ANSWER_INSTRUCTION, context));

                    let mut prompt = vec![system];
                    prompt.extend(
                        messages
                            .iter()
                            .filter(|m| keeps_in_filtered_history(m))
                            .cloned(),
                    );

                    let outcome = self.llm.chat(&prompt, &[]).await?;
                    return Ok(outcome.content);
                }
            };
        }
    }
}

fn to_chat_message(entry: &TurnMessage) -> ChatMessage {
    match entry.role {
        MessageRole::User => ChatMessage::user(entry.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(entry.content.clone()),
    }
}

/// Extract the query of the first retrieval request, if any.
fn retrieval_query(
    calls: &[crate::providers::ToolCall],
    fallback: &str,
) -> Option<String> {
    let call = calls
        .iter()
        .find(|c| c.function.name == RETRIEVAL_TOOL_NAME)?;

    match call.function.arguments.get("query").and_then(|v| v.as_str()) {
        Some(query) => Some(query.to_string()),
        None => {
            // Malformed arguments: retrieve with the user's words instead
            tracing::debug!("retrieval call without query argument, using user message");
            Some(fallback.to_string())
        }
    }
}

/// The most recent contiguous run of tool-result messages, oldest first.
fn recent_tool_context(messages: &[ChatMessage]) -> String {
    let mut recent: Vec<&str> = messages
        .iter()
        .rev()
        .take_while(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    recent.reverse();
    recent.join("\n\n")
}

/// History filter for the final generation: system and user messages,
/// plus assistant messages that did not themselves request a tool call.
/// Retrieval scaffolding never pollutes future context.
fn keeps_in_filtered_history(message: &ChatMessage) -> bool {
    match message.role {
        Role::System | Role::User => true,
        Role::Assistant => !message.requests_tool(),
        Role::Tool => false,
    }
}
