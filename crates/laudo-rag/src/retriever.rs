//! Semantic nearest-neighbor lookup for one conversation turn.

use crate::index::VectorIndex;
use laudo_core::ScoredChunk;
use laudo_error::{LaudoError, Result};
use laudo_llm::EmbedModel;
use std::sync::Arc;
use tracing::instrument;

/// Read-only retrieval handle shared by all request handlers.
///
/// The query must be embedded with the same model used at index time;
/// the retriever owns that consistency by holding the one embed model.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embed_model: Arc<dyn EmbedModel>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embed_model: Arc<dyn EmbedModel>, top_k: usize) -> Self {
        Self {
            index,
            embed_model,
            top_k,
        }
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    /// Top-k chunks most similar to `query`, most relevant first.
    ///
    /// An empty index short-circuits to an empty result before any embedding
    /// call, so a corpus-less deployment never touches the network here.
    #[instrument(skip(self, query), fields(top_k = self.top_k))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        if self.index.is_empty() {
            return Ok(vec![]);
        }

        let query_embedding = self
            .embed_model
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LaudoError::EmbeddingService {
                provider: "query".to_string(),
                message: "embedding response was empty".to_string(),
                retry_after: None,
            })?;

        Ok(self.index.search(&query_embedding, self.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexedChunk;
    use async_trait::async_trait;
    use laudo_core::Chunk;
    use uuid::Uuid;

    struct FixedEmbed(Vec<f32>);

    #[async_trait]
    impl EmbedModel for FixedEmbed {
        async fn embed(&self, texts: &[String]) -> laudo_error::Result<Vec<Vec<f32>>> {
            Ok(vec![self.0.clone(); texts.len()])
        }
    }

    struct PanickingEmbed;

    #[async_trait]
    impl EmbedModel for PanickingEmbed {
        async fn embed(&self, _texts: &[String]) -> laudo_error::Result<Vec<Vec<f32>>> {
            panic!("embed must not be called for an empty index");
        }
    }

    fn entry(text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::nil(),
                source: "manual.txt".into(),
                ord: 0,
                overlap: 0,
                text: text.into(),
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn empty_index_returns_empty_without_embedding() {
        let retriever = Retriever::new(
            Arc::new(VectorIndex::empty()),
            Arc::new(PanickingEmbed),
            4,
        );
        let results = retriever.retrieve("qualquer consulta").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn returns_at_most_k_results_in_relevance_order() {
        let index = VectorIndex::new(vec![
            entry("sobre veículos", vec![0.0, 1.0]),
            entry("sobre edificações", vec![1.0, 0.0]),
            entry("sobre vegetação", vec![0.9, 0.1]),
        ]);
        let retriever = Retriever::new(
            Arc::new(index),
            Arc::new(FixedEmbed(vec![1.0, 0.0])),
            2,
        );
        let results = retriever.retrieve("origem em edificação").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "sobre edificações");
        assert_eq!(results[1].chunk.text, "sobre vegetação");
    }

    #[tokio::test]
    async fn identical_queries_return_identical_results() {
        let index = Arc::new(VectorIndex::new(vec![
            entry("a", vec![1.0, 0.0]),
            entry("b", vec![1.0, 0.0]),
        ]));
        let retriever = Retriever::new(index, Arc::new(FixedEmbed(vec![1.0, 0.0])), 2);
        let first = retriever.retrieve("consulta").await.unwrap();
        let second = retriever.retrieve("consulta").await.unwrap();
        assert_eq!(
            first.iter().map(|s| s.chunk.id).collect::<Vec<_>>(),
            second.iter().map(|s| s.chunk.id).collect::<Vec<_>>()
        );
    }
}
