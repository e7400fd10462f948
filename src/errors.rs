// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the session RAG orchestrator
//!
//! One taxonomy for every public operation:
//! - Session/workspace errors (unknown session)
//! - Ingestion errors (unsupported format, extraction failure)
//! - Provider errors (embedding or chat endpoint failures)
//! - Durable-state errors (corrupt conversation memory)

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the orchestration core.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Session, index, or memory partition absent where it is required
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The source file type has no registered extractor
    #[error("Unsupported document format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Document parsing failed; caller may retry with the other quality mode
    #[error("Extraction failed for {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    /// Embedding or language-model provider failure (network, quota, timeout)
    #[error("Provider request failed: {0}")]
    Provider(String),

    /// Durable conversation memory failed to deserialize.
    ///
    /// Conversation history is not reconstructible from source documents,
    /// so this is surfaced rather than treated as absent.
    #[error("Corrupt conversation state for session {session}: {reason}")]
    CorruptState { session: String, reason: String },

    /// The caller abandoned the turn before the terminal state was reached
    #[error("Turn cancelled before completion")]
    Cancelled,

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            OrchestratorError::NotFound(_) => "NOT_FOUND",
            OrchestratorError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            OrchestratorError::Extraction { .. } => "EXTRACTION_ERROR",
            OrchestratorError::Provider(_) => "PROVIDER_ERROR",
            OrchestratorError::CorruptState { .. } => "CORRUPT_STATE",
            OrchestratorError::Cancelled => "CANCELLED",
            OrchestratorError::Io(_) => "IO_ERROR",
        }
    }

    /// Check if this error is retryable by the caller
    ///
    /// Extraction failures may succeed with the other quality mode;
    /// provider failures are transient by definition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Extraction { .. } | OrchestratorError::Provider(_)
        )
    }
}

/// Result alias used by the public contract.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
