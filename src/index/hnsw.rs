// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HNSW search graph
//!
//! Approximate nearest-neighbor structure over a session's chunk
//! vectors, using cosine distance. The graph is derived state: it is
//! rebuilt from persisted chunk records on load and after every
//! mutation, never serialized itself.

use anyhow::{anyhow, Result};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use std::sync::Arc;

/// In-memory similarity graph over record vectors.
///
/// Neighbour ids map back to positions in the record list the graph was
/// built from.
pub struct HnswGraph {
    hnsw: Arc<Hnsw<'static, f32, DistCosine>>,
    dimensions: usize,
    len: usize,
}

impl HnswGraph {
    /// Build a graph from record vectors, all of `dimensions` width.
    pub fn build(vectors: &[Vec<f32>], dimensions: usize) -> Result<Self> {
        if vectors.is_empty() {
            return Ok(Self {
                hnsw: Arc::new(Hnsw::new(16, 1, 4, 16, DistCosine)),
                dimensions,
                len: 0,
            });
        }

        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(anyhow!(
                    "vector {} has wrong dimensions: expected {}, got {}",
                    i,
                    dimensions,
                    vector.len()
                ));
            }
            if vector.iter().any(|&v| !v.is_finite()) {
                return Err(anyhow!("vector {} contains NaN or Infinity values", i));
            }
        }

        // Parameters tuned for fast construction on session-sized corpora
        let max_nb_connection = 12;
        let ef_construction = 48;
        let nb_layer = ((vectors.len() as f32).log2().ceil() as usize).clamp(4, 16);

        let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
            max_nb_connection,
            vectors.len(),
            nb_layer,
            ef_construction,
            DistCosine,
        );

        for (position, vector) in vectors.iter().enumerate() {
            let normalized = normalize_vector(vector);
            hnsw.insert((&normalized, position));
        }

        hnsw.set_searching_mode(true);

        Ok(Self {
            hnsw: Arc::new(hnsw),
            dimensions,
            len: vectors.len(),
        })
    }

    /// k-NN search. Returns `(record_position, score)` pairs sorted by
    /// cosine similarity descending, at most `k` of them.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(anyhow!(
                "query has wrong dimensions: expected {}, got {}",
                self.dimensions,
                query.len()
            ));
        }
        if query.iter().any(|&v| !v.is_finite()) {
            return Err(anyhow!("query contains NaN or Infinity values"));
        }
        if self.len == 0 || k == 0 {
            return Ok(vec![]);
        }

        let normalized = normalize_vector(query);
        let ef_search = (k * 2).max(50);
        let neighbours: Vec<Neighbour> = self.hnsw.search(&normalized, k, ef_search);

        let mut results: Vec<(usize, f32)> = neighbours
            .into_iter()
            .map(|n| (n.d_id, 1.0 - n.distance))
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Normalize to unit length so cosine similarity is computed correctly.
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }
    vector.iter().map(|&x| x / magnitude).collect()
}
