// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Vector index module
// One persisted similarity index per session, searched via HNSW

pub mod cache;
pub mod hnsw;
pub mod store;

pub use cache::{CacheMetrics, IndexCache};
pub use hnsw::HnswGraph;
pub use store::{
    sanitize_metadata, ChunkRecord, IndexManager, ScalarValue, ScoredChunk, SearchOutcome,
    SessionIndex,
};
