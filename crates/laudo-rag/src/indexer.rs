//! Startup corpus indexing: scan, load, split, embed, index.
//!
//! Runs once before the server starts accepting traffic; the embedding calls
//! are the dominant startup cost, so chunks are embedded in batches. An empty
//! or missing corpus directory is not an error: document context is an
//! enhancement, and the assistant must keep working without it.

use crate::index::{IndexedChunk, VectorIndex};
use crate::loader::LoaderRegistry;
use crate::splitter::{split_text, SplitConfig};
use chrono::Utc;
use laudo_core::{Chunk, Document};
use laudo_error::Result;
use laudo_llm::EmbedModel;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks per embedding request.
    pub embed_batch: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
            embed_batch: 16,
        }
    }
}

pub struct CorpusIndexer {
    loaders: LoaderRegistry,
    embed_model: Arc<dyn EmbedModel>,
    config: IndexerConfig,
}

impl CorpusIndexer {
    pub fn new(
        loaders: LoaderRegistry,
        embed_model: Arc<dyn EmbedModel>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            loaders,
            embed_model,
            config,
        }
    }

    /// Build the similarity index from every recognized file in `dir`.
    ///
    /// Fails open on an absent or empty directory; propagates embedding
    /// failures so the binary can apply its corpus-requirement policy.
    #[instrument(skip(self), fields(dir = %dir.as_ref().display()))]
    pub async fn build(&self, dir: impl AsRef<Path>) -> Result<VectorIndex> {
        let documents = self.load_documents(dir.as_ref())?;
        if documents.is_empty() {
            warn!("no corpus documents found; serving without retrieval context");
            return Ok(VectorIndex::empty());
        }

        let mut chunks = Vec::new();
        let split_cfg = SplitConfig {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        };
        for document in &documents {
            for (ord, piece) in split_text(&document.text, &split_cfg).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: Uuid::new_v4(),
                    document_id: document.id,
                    source: document.source.clone(),
                    ord,
                    overlap: piece.overlap,
                    text: piece.text,
                });
            }
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embed_batch.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embed_model.embed(&texts).await?;
            for (chunk, embedding) in batch.iter().cloned().zip(embeddings) {
                entries.push(IndexedChunk { chunk, embedding });
            }
        }

        info!(
            documents = documents.len(),
            chunks = entries.len(),
            "corpus indexed"
        );
        Ok(VectorIndex::new(entries))
    }

    fn load_documents(&self, dir: &Path) -> Result<Vec<Document>> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "corpus directory missing");
            return Ok(vec![]);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        // Stable indexing order keeps tie-breaking reproducible across runs.
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            let Some(loader) = self.loaders.loader_for(&path) else {
                continue;
            };
            match loader.load(&path) {
                Ok(text) if text.trim().is_empty() => {
                    warn!(path = %path.display(), "skipping empty document");
                }
                Ok(text) => documents.push(Document {
                    id: Uuid::new_v4(),
                    source: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                    format: loader.format(),
                    text,
                    loaded_at: Utc::now(),
                }),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to load document, skipping");
                }
            }
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use laudo_error::LaudoError;

    struct HashEmbed;

    #[async_trait]
    impl EmbedModel for HashEmbed {
        async fn embed(&self, texts: &[String]) -> laudo_error::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0, 0.0])
                .collect())
        }
    }

    struct FailingEmbed;

    #[async_trait]
    impl EmbedModel for FailingEmbed {
        async fn embed(&self, _texts: &[String]) -> laudo_error::Result<Vec<Vec<f32>>> {
            Err(LaudoError::EmbeddingService {
                provider: "gemini".into(),
                message: "missing credentials".into(),
                retry_after: None,
            })
        }
    }

    fn indexer(embed: Arc<dyn EmbedModel>) -> CorpusIndexer {
        CorpusIndexer::new(LoaderRegistry::with_defaults(), embed, IndexerConfig::default())
    }

    #[tokio::test]
    async fn missing_directory_builds_an_empty_index() {
        let index = indexer(Arc::new(HashEmbed))
            .build("/definitely/not/a/real/dir")
            .await
            .unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn empty_directory_builds_an_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = indexer(Arc::new(HashEmbed)).build(dir.path()).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn indexes_recognized_files_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manual.txt"), "análise de vestígios").unwrap();
        std::fs::write(dir.path().join("norma.md"), "padrões de queima").unwrap();
        std::fs::write(dir.path().join("foto.jpg"), [0xFFu8, 0xD8]).unwrap();

        let index = indexer(Arc::new(HashEmbed)).build(dir.path()).await.unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn long_documents_produce_multiple_chunks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("manual.txt"),
            "vestígio de origem. ".repeat(300),
        )
        .unwrap();

        let index = indexer(Arc::new(HashEmbed)).build(dir.path()).await.unwrap();
        assert!(index.len() > 1);
    }

    #[tokio::test]
    async fn embedding_failure_propagates_when_there_are_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manual.txt"), "conteúdo").unwrap();

        let err = indexer(Arc::new(FailingEmbed))
            .build(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LaudoError::EmbeddingService { .. }));
    }

    #[tokio::test]
    async fn embedding_is_not_called_for_an_empty_corpus() {
        // FailingEmbed would error if any embed call happened.
        let dir = tempfile::tempdir().unwrap();
        let index = indexer(Arc::new(FailingEmbed))
            .build(dir.path())
            .await
            .unwrap();
        assert!(index.is_empty());
    }
}
