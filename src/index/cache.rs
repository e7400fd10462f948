// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Loaded-index cache
//!
//! Loading a session index means reading the artifact and rebuilding its
//! HNSW graph, so loaded indexes are kept in an LRU cache keyed by
//! session token. Entries are replaced on mutation and dropped when a
//! workspace is destroyed.

use crate::index::store::SessionIndex;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use uuid::Uuid;

/// Cache metrics for monitoring performance
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of loaded session indexes.
pub struct IndexCache {
    cache: LruCache<Uuid, Arc<SessionIndex>>,
    metrics: CacheMetrics,
}

impl IndexCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            cache: LruCache::new(capacity),
            metrics: CacheMetrics::default(),
        }
    }

    pub fn get(&mut self, token: &Uuid) -> Option<Arc<SessionIndex>> {
        match self.cache.get(token) {
            Some(index) => {
                self.metrics.hits += 1;
                Some(index.clone())
            }
            None => {
                self.metrics.misses += 1;
                None
            }
        }
    }

    /// Insert or replace the loaded index for a session.
    pub fn insert(&mut self, token: Uuid, index: Arc<SessionIndex>) {
        if let Some((evicted, _)) = self.cache.push(token, index) {
            if evicted != token {
                self.metrics.evictions += 1;
            }
        }
    }

    /// Drop a session's entry, if loaded.
    pub fn invalidate(&mut self, token: &Uuid) {
        self.cache.pop(token);
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.clone()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
