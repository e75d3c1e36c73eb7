//! Format-specific document loaders.
//!
//! The indexer only cares about "path in, plain text out"; each recognized
//! extension maps to a loader. Plain text and markdown ship built in; PDF and
//! DOCX extraction are external collaborators plugged in through the same
//! trait.

use laudo_core::DocumentFormat;
use laudo_error::{LaudoError, Result};
use std::path::Path;

pub trait DocumentLoader: Send + Sync {
    /// Lowercase extensions (without dot) this loader handles.
    fn extensions(&self) -> &[&str];

    fn format(&self) -> DocumentFormat;

    /// Extract the full plain text of the file.
    fn load(&self, path: &Path) -> Result<String>;
}

/// Loader for plain-text corpus files.
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn extensions(&self) -> &[&str] {
        &["txt", "md", "text"]
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn load(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| LaudoError::Internal {
            message: format!("failed to read {}", path.display()),
            details: Some(e.to_string()),
        })
    }
}

/// Extension-to-loader registry, consulted while scanning the corpus
/// directory. Files with no registered loader are skipped.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self { loaders: vec![] }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PlainTextLoader));
        registry
    }

    pub fn register(&mut self, loader: Box<dyn DocumentLoader>) {
        self.loaders.push(loader);
    }

    pub fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.loaders
            .iter()
            .find(|l| l.extensions().contains(&ext.as_str()))
            .map(|l| l.as_ref())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
