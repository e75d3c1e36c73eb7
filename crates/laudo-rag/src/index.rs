//! In-memory similarity index over embedded chunks.
//!
//! The index is built once at startup and shared read-only behind an `Arc`;
//! concurrent request handlers only ever scan it. A brute-force cosine scan is
//! deliberate: the corpus is tens to low hundreds of chunks, and the interface
//! does not preclude swapping in an ANN structure later.

use laudo_core::{Chunk, ScoredChunk};
use serde::{Deserialize, Serialize};

/// One indexed entry: the chunk plus its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn new(entries: Vec<IndexedChunk>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k entries by cosine similarity, most relevant first.
    ///
    /// Sorting is stable, so ties keep insertion order and identical queries
    /// always return identical results.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    let len = a.len().min(b.len());
    for i in 0..len {
        dot_product += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(ord: usize, text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::nil(),
                source: "manual.txt".into(),
                ord,
                overlap: 0,
                text: text.into(),
            },
            embedding,
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.5, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_empty_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn search_returns_descending_scores() {
        let index = VectorIndex::new(vec![
            entry(0, "longe", vec![0.0, 1.0]),
            entry(1, "perto", vec![1.0, 0.0]),
            entry(2, "meio", vec![0.7, 0.7]),
        ]);
        let results = index.search(&[1.0, 0.0], 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "perto");
        assert_eq!(results[1].chunk.text, "meio");
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[test]
    fn search_is_deterministic_on_ties() {
        let index = VectorIndex::new(vec![
            entry(0, "primeiro", vec![1.0, 0.0]),
            entry(1, "segundo", vec![1.0, 0.0]),
            entry(2, "terceiro", vec![1.0, 0.0]),
        ]);
        let first = index.search(&[1.0, 0.0], 3);
        let second = index.search(&[1.0, 0.0], 3);
        let texts: Vec<_> = first.iter().map(|s| s.chunk.text.clone()).collect();
        assert_eq!(texts, vec!["primeiro", "segundo", "terceiro"]);
        assert_eq!(
            texts,
            second.iter().map(|s| s.chunk.text.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn search_caps_at_k_and_at_index_size() {
        let index = VectorIndex::new(vec![
            entry(0, "a", vec![1.0, 0.0]),
            entry(1, "b", vec![0.0, 1.0]),
        ]);
        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
        assert_eq!(index.search(&[1.0, 0.0], 10).len(), 2);
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = VectorIndex::empty();
        assert!(index.search(&[1.0, 0.0], 4).is_empty());
    }
}
