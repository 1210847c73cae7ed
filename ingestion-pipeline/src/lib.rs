#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunking;
pub mod cleaning;
pub mod pipeline;
pub mod sourcing;
pub mod utils;

use std::path::PathBuf;

use common::utils::config::AuthorSettings;
pub use pipeline::{
    DocumentSource, InMemoryVectorStore, LopdfSource, PreparationConfig, PreparationPipeline,
    PreparedDocument, VectorStore,
};
use tracing::{error, info};

/// A step that failed without stopping the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub author: String,
    /// `None` for author-wide steps such as source pruning.
    pub document: Option<String>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub prepared: Vec<PreparedDocument>,
    pub removed_files: Vec<PathBuf>,
    pub corpora: Vec<(String, usize)>,
    pub failures: Vec<DocumentFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, author: &str, document: Option<&str>, error: String) {
        self.failures.push(DocumentFailure {
            author: author.to_string(),
            document: document.map(ToString::to_string),
            error,
        });
    }
}

/// Prepares every configured work of every author. A failing work is logged
/// and recorded; the remaining works are still prepared.
pub fn run_batch(pipeline: &PreparationPipeline, authors: &[AuthorSettings]) -> BatchReport {
    let mut report = BatchReport::default();
    for author in authors {
        prepare_author(pipeline, author, &mut report);
    }
    info!(
        prepared = report.prepared.len(),
        removed = report.removed_files.len(),
        failures = report.failures.len(),
        "batch finished"
    );
    report
}

/// Source pruning, then each work, then the author's merged corpus.
pub fn prepare_author(
    pipeline: &PreparationPipeline,
    author: &AuthorSettings,
    report: &mut BatchReport,
) {
    let options = pipeline.pipeline_config();

    if options.prune_sources {
        if let Err(err) = pipeline.prune_sources(author, &mut report.removed_files) {
            error!(author = %author.name, error = %err, "source pruning failed");
            report.record_failure(&author.name, None, err.to_string());
        }
    }

    let mut prepared_works = Vec::new();
    for work in &author.works {
        match pipeline.prepare_work(author, work) {
            Ok(document) => {
                prepared_works.push(work.clone());
                report.prepared.push(document);
            }
            Err(err) => {
                error!(
                    author = %author.name,
                    work = %work.title,
                    error = %err,
                    "work preparation failed"
                );
                report.record_failure(&author.name, Some(&work.title), err.to_string());
            }
        }
    }

    if options.merge_corpus && !prepared_works.is_empty() {
        match pipeline.merge_corpus(author, &prepared_works) {
            Ok(corpus) => report
                .corpora
                .push((author.name.clone(), corpus.chars().count())),
            Err(err) => {
                error!(author = %author.name, error = %err, "corpus merge failed");
                report.record_failure(&author.name, None, err.to_string());
            }
        }
    }
}
