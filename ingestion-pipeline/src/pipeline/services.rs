use std::{
    collections::HashSet,
    path::Path,
    sync::Mutex,
};

use common::{
    error::AppError,
    storage::types::{source_document::FileFormat, text_chunk::IndexRecord},
};
use tracing::debug;

use crate::utils::file_text_extraction::extract_pages_from_file;

/// Produces the raw text of a source file as ordered `(page_number, text)`
/// pairs, page numbers zero-based.
pub trait DocumentSource: Send + Sync {
    fn load_pages(&self, path: &Path, format: FileFormat) -> Result<Vec<(u32, String)>, AppError>;
}

/// Destination for embedded chunks.
///
/// How records are embedded, stored and compared is up to the
/// implementation.
pub trait VectorStore: Send + Sync {
    /// Returns the number of records accepted.
    fn index(&self, records: &[IndexRecord]) -> Result<usize, AppError>;

    /// Up to `k` records most similar to `query`, best first.
    fn similar(&self, query: &str, k: usize) -> Result<Vec<IndexRecord>, AppError>;
}

/// Reads PDFs through `lopdf` and plain-text exports directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSource;

impl DocumentSource for LopdfSource {
    fn load_pages(&self, path: &Path, format: FileFormat) -> Result<Vec<(u32, String)>, AppError> {
        extract_pages_from_file(path, format)
    }
}

/// Keeps records in memory and ranks them by shared lower-cased terms.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: Mutex<Vec<IndexRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<IndexRecord>>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::Processing("vector store lock poisoned".into()))
    }

    pub fn len(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.lock()?.is_empty())
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl VectorStore for InMemoryVectorStore {
    fn index(&self, records: &[IndexRecord]) -> Result<usize, AppError> {
        self.lock()?.extend_from_slice(records);
        debug!(records = records.len(), "indexed records in memory");
        Ok(records.len())
    }

    fn similar(&self, query: &str, k: usize) -> Result<Vec<IndexRecord>, AppError> {
        let query_terms = terms(query);
        let records = self.lock()?;
        let mut scored: Vec<(usize, &IndexRecord)> = records
            .iter()
            .map(|record| (terms(&record.text).intersection(&query_terms).count(), record))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
