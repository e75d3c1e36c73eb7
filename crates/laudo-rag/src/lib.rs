//! Retrieval-augmented prompt assembly for the forensic assistant.
//!
//! The pipeline has four pieces, wired at startup and read-only afterwards:
//! the [`indexer::CorpusIndexer`] turns the corpus directory into an
//! in-memory [`index::VectorIndex`]; the [`retriever::Retriever`] answers
//! per-turn similarity queries against it; the [`prompt::PromptAssembler`]
//! folds policy, retrieved context and history into the message sequence the
//! model receives.

pub mod index;
pub mod indexer;
pub mod loader;
pub mod prompt;
pub mod retriever;
pub mod splitter;

pub use index::{IndexedChunk, VectorIndex};
pub use indexer::{CorpusIndexer, IndexerConfig};
pub use loader::{DocumentLoader, LoaderRegistry, PlainTextLoader};
pub use prompt::PromptAssembler;
pub use retriever::Retriever;
pub use splitter::{split_text, SplitConfig};

pub use laudo_core::{Chunk, Document, ScoredChunk};
pub use laudo_error::{LaudoError, Result};
