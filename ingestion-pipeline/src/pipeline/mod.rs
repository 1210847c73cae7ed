mod config;
mod services;

pub use config::PreparationConfig;
pub use services::{DocumentSource, InMemoryVectorStore, LopdfSource, VectorStore};

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use common::{
    error::AppError,
    storage::{
        cache::{digest_bytes, digest_file, ArtifactCache},
        types::{
            page_details::{
                CleanedText, MergedCorpus, PageDetailSet, SentenceChunkSet, TEXT_SEPARATOR,
            },
            source_document::{FileFormat, SourceDocument},
            text_chunk::{ChunkSet, IndexRecord},
            text_unit::TextUnit,
        },
    },
    utils::{
        config::{AppConfig, AuthorSettings, WorkSettings},
        tokenizer::ModelTokenizer,
    },
};
use tracing::{debug, info};

use crate::{chunking::TextChunker, cleaning::TextCleaner, sourcing::SourceManager};

/// Everything derived from one work during preparation.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub title: String,
    pub base_name: String,
    pub source: PathBuf,
    pub format: FileFormat,
    pub chunks: ChunkSet,
    pub sentence_chunks: Option<SentenceChunkSet>,
    pub indexed: usize,
}

/// A configured work resolved to the file that survived deduplication.
struct LocatedWork {
    document: SourceDocument,
    format: FileFormat,
    path: PathBuf,
    digest: String,
}

impl LocatedWork {
    fn file_name(&self) -> String {
        self.document.file_name(self.format)
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct PreparationPipeline {
    config: AppConfig,
    pipeline_config: PreparationConfig,
    cleaner: TextCleaner,
    chunker: TextChunker,
    cache: ArtifactCache,
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn VectorStore>,
}

impl PreparationPipeline {
    pub fn new(
        config: AppConfig,
        tokenizer: Arc<dyn ModelTokenizer>,
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, AppError> {
        Self::new_with_config(config, tokenizer, source, store, PreparationConfig::default())
    }

    pub fn new_with_config(
        config: AppConfig,
        tokenizer: Arc<dyn ModelTokenizer>,
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn VectorStore>,
        pipeline_config: PreparationConfig,
    ) -> Result<Self, AppError> {
        let cleaner = TextCleaner::new(&config.cleaning)?;
        let chunker = TextChunker::new(config.chunking.clone(), tokenizer)?;
        let cache = ArtifactCache::open(&config.cache_dir)?;
        Ok(Self {
            config,
            pipeline_config,
            cleaner,
            chunker,
            cache,
            source,
            store,
        })
    }

    pub fn pipeline_config(&self) -> &PreparationConfig {
        &self.pipeline_config
    }

    pub fn raw_data_dir(&self, author: &AuthorSettings) -> PathBuf {
        author.raw_data_dir(Path::new(&self.config.data_dir))
    }

    fn source_manager(&self, author: &AuthorSettings) -> SourceManager {
        SourceManager::new(self.raw_data_dir(author), self.config.sources.preferred_format)
    }

    /// Source directory pass for one author: deletes biographies,
    /// compilations and omnibus editions, then duplicate copies of every
    /// remaining work. Deleted paths are appended to `removed`, including
    /// those deleted before an error.
    #[tracing::instrument(skip_all, fields(author = %author.name))]
    pub fn prune_sources(
        &self,
        author: &AuthorSettings,
        removed: &mut Vec<PathBuf>,
    ) -> Result<(), AppError> {
        let manager = self.source_manager(author);
        let before = removed.len();

        let fragments: Vec<String> = author
            .biographers_and_compilers
            .iter()
            .chain(&self.config.sources.excluded_name_fragments)
            .cloned()
            .collect();
        removed.extend(manager.remove_matching(&manager.file_names()?, &fragments));

        let candidates = manager.list_candidates()?;
        let result = manager.resolve_duplicates_into(&candidates, removed);

        info!(removed = removed.len().saturating_sub(before), "pruned source directory");
        result
    }

    fn locate(
        &self,
        author: &AuthorSettings,
        work: &WorkSettings,
    ) -> Result<LocatedWork, AppError> {
        let directory = self.raw_data_dir(author);
        let formats: BTreeSet<FileFormat> = FileFormat::RANKED
            .iter()
            .chain(&[FileFormat::Txt])
            .copied()
            .filter(|format| {
                directory
                    .join(format!("{}{}", work.file_name, format.extension()))
                    .is_file()
            })
            .collect();
        let document = SourceDocument::new(
            work.title.clone(),
            work.file_name.clone(),
            formats,
            work.core_pages.clone(),
        );

        // Extracted text exports are the fallback when no ranked copy exists.
        let format = document
            .retained_format(self.config.sources.preferred_format)
            .or_else(|| document.formats.contains(&FileFormat::Txt).then_some(FileFormat::Txt))
            .ok_or_else(|| AppError::MissingVersion(work.file_name.clone()))?;

        let path = document.path_in(&directory, format);
        let digest = digest_file(&path)?;
        debug!(path = %path.display(), %format, "located source file");
        Ok(LocatedWork {
            document,
            format,
            path,
            digest,
        })
    }

    fn load_units(&self, located: &LocatedWork) -> Result<Vec<TextUnit>, AppError> {
        let pages = self.source.load_pages(&located.path, located.format)?;
        let units = self
            .cleaner
            .clean_document(pages, located.document.core_pages.as_ref());
        debug!(units = units.len(), "cleaned document");
        Ok(units)
    }

    /// Loads and cleans the document on first use only.
    fn units<'u>(
        &self,
        located: &LocatedWork,
        slot: &'u mut Option<Vec<TextUnit>>,
    ) -> Result<&'u [TextUnit], AppError> {
        if slot.is_none() {
            *slot = Some(self.load_units(located)?);
        }
        Ok(slot.as_deref().unwrap_or_default())
    }

    /// Digest of cleaning inputs: source bytes, core pages and the table.
    fn cleaning_digest(&self, located: &LocatedWork) -> String {
        digest_bytes(
            format!(
                "{}|{:?}|{:?}",
                located.digest, located.document.core_pages, self.cleaner
            )
            .as_bytes(),
        )
    }

    fn chunking_digest(&self, cleaning_digest: &str) -> String {
        digest_bytes(format!("{cleaning_digest}|{:?}", self.chunker.settings()).as_bytes())
    }

    fn cleaned_text(&self, located: &LocatedWork) -> Result<CleanedText, AppError> {
        let mut units = None;
        self.cache.get_or_try_insert_with(
            &located.document.base_name,
            &self.cleaning_digest(located),
            || Ok(CleanedText::from_units(self.units(located, &mut units)?)),
        )
    }

    /// Cleans, chunks and indexes one work. Every derived artifact is served
    /// from the cache while its inputs are unchanged.
    #[tracing::instrument(skip_all, fields(author = %author.name, work = %work.title))]
    pub fn prepare_work(
        &self,
        author: &AuthorSettings,
        work: &WorkSettings,
    ) -> Result<PreparedDocument, AppError> {
        let located = self.locate(author, work)?;
        let key = located.document.base_name.as_str();
        let cleaning_digest = self.cleaning_digest(&located);
        let chunking_digest = self.chunking_digest(&cleaning_digest);
        let mut units = None;

        let chunks: ChunkSet = self.cache.get_or_try_insert_with(key, &chunking_digest, || {
            self.chunker.chunk(self.units(&located, &mut units)?)
        })?;

        // Read back by corpus merges.
        self.cache
            .get_or_try_insert_with::<CleanedText, _>(key, &cleaning_digest, || {
                Ok(CleanedText::from_units(self.units(&located, &mut units)?))
            })?;

        let sentence_chunks = if self.pipeline_config.sentence_details {
            let pages: PageDetailSet =
                self.cache.get_or_try_insert_with(key, &cleaning_digest, || {
                    Ok(PageDetailSet {
                        pages: self.chunker.page_details(self.units(&located, &mut units)?),
                    })
                })?;
            let sentence_chunks: SentenceChunkSet = self
                .cache
                .get_or_try_insert_with(key, &chunking_digest, || {
                    self.chunker.sentence_chunks(&pages.pages)
                })?;
            Some(sentence_chunks)
        } else {
            None
        };

        let indexed = if self.pipeline_config.index_chunks {
            let source_name = located.file_name();
            let records: Vec<IndexRecord> = chunks
                .chunks
                .iter()
                .map(|chunk| IndexRecord::from_chunk(chunk, &source_name, &work.title))
                .collect();
            self.store.index(&records)?
        } else {
            0
        };

        info!(
            source = %located.path.display(),
            chunks = chunks.chunks.len(),
            mode = ?chunks.mode,
            indexed,
            "prepared work"
        );

        Ok(PreparedDocument {
            title: work.title.clone(),
            base_name: located.document.base_name.clone(),
            source: located.path,
            format: located.format,
            chunks,
            sentence_chunks,
            indexed,
        })
    }

    /// Cleaned text of `works` joined in order, cached under the author's
    /// name.
    #[tracing::instrument(skip_all, fields(author = %author.name, works = works.len()))]
    pub fn merge_corpus(
        &self,
        author: &AuthorSettings,
        works: &[WorkSettings],
    ) -> Result<String, AppError> {
        let mut texts = Vec::with_capacity(works.len());
        let mut documents = Vec::with_capacity(works.len());
        for work in works {
            let located = self.locate(author, work)?;
            texts.push(self.cleaned_text(&located)?.text);
            documents.push(located.document.base_name);
        }

        let corpus_digest = digest_bytes(
            texts
                .iter()
                .map(|text| digest_bytes(text.as_bytes()))
                .collect::<Vec<_>>()
                .join("|")
                .as_bytes(),
        );
        let corpus: MergedCorpus =
            self.cache
                .get_or_try_insert_with(&author.name, &corpus_digest, || {
                    Ok(MergedCorpus {
                        documents,
                        text: texts.join(TEXT_SEPARATOR),
                    })
                })?;

        info!(characters = corpus.text.chars().count(), "merged corpus");
        Ok(corpus.text)
    }
}

#[cfg(test)]
mod tests;
