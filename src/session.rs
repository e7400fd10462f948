// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session identity and on-disk workspace layout
//!
//! A session is the unit of isolation: one vector-index artifact, one
//! conversation log and one documents directory, all keyed by the same
//! opaque token so that deleting a session is a single directory removal.

use crate::errors::{OrchestratorError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A reference to a session as received at the boundary.
///
/// Callers may address sessions by their relational row id or by their
/// opaque token. The distinction is resolved exactly once — the core
/// operates on tokens only and never re-inspects the shape of an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRef {
    /// Relational row id, resolvable only through the external registry
    ById(i64),
    /// Opaque session token
    ByToken(Uuid),
}

impl SessionRef {
    /// Parse a path-segment style reference: an integer is a row id,
    /// a UUID is a token. Anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(id) = raw.parse::<i64>() {
            return Some(SessionRef::ById(id));
        }
        Uuid::parse_str(raw).ok().map(SessionRef::ByToken)
    }

    /// The token, when this reference already carries one.
    pub fn token(&self) -> Option<Uuid> {
        match self {
            SessionRef::ById(_) => None,
            SessionRef::ByToken(token) => Some(*token),
        }
    }
}

/// Session registry interface, implemented by the external relational
/// store. The core never queries it directly: HTTP callers resolve a
/// `SessionRef` into a token before invoking any orchestrator operation.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, session: &SessionRef) -> Result<Uuid>;
}

/// Session-keyed filesystem layout under one data root.
///
/// ```text
/// {data_root}/sessions/{token}/index.bin
/// {data_root}/sessions/{token}/conversation.jsonl
/// {data_root}/sessions/{token}/documents/
/// ```
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    data_root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn session_dir(&self, token: &Uuid) -> PathBuf {
        self.data_root.join("sessions").join(token.to_string())
    }

    pub fn index_path(&self, token: &Uuid) -> PathBuf {
        self.session_dir(token).join("index.bin")
    }

    pub fn conversation_path(&self, token: &Uuid) -> PathBuf {
        self.session_dir(token).join("conversation.jsonl")
    }

    pub fn documents_dir(&self, token: &Uuid) -> PathBuf {
        self.session_dir(token).join("documents")
    }

    /// Idempotent creation of the session's storage locations.
    pub async fn create(&self, token: &Uuid) -> Result<()> {
        tokio::fs::create_dir_all(self.documents_dir(token)).await?;
        Ok(())
    }

    /// Whether a workspace exists for this token.
    pub async fn exists(&self, token: &Uuid) -> bool {
        tokio::fs::try_exists(self.session_dir(token))
            .await
            .unwrap_or(false)
    }

    /// Idempotent removal of every artifact owned by the session.
    pub async fn destroy(&self, token: &Uuid) -> Result<()> {
        let dir = self.session_dir(token);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OrchestratorError::Io(e)),
        }
    }
}
