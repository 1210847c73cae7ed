use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use common::{
    error::AppError,
    storage::types::{
        source_document::FileFormat,
        text_chunk::{ChunkingMode, IndexRecord},
    },
    utils::{
        config::{AppConfig, AuthorSettings, WorkSettings},
        tokenizer::ModelTokenizer,
    },
};
use tempfile::{tempdir, TempDir};

use super::{
    config::PreparationConfig,
    services::{DocumentSource, VectorStore},
    PreparationPipeline,
};
use crate::run_batch;

struct WhitespaceTokenizer;

impl ModelTokenizer for WhitespaceTokenizer {
    fn model_id(&self) -> &str {
        "whitespace"
    }

    fn try_count_tokens(&self, text: &str) -> Result<usize, AppError> {
        Ok(text.split_whitespace().count())
    }

    fn max_input_tokens(&self) -> usize {
        512
    }
}

struct MockSource {
    pages: HashMap<String, Vec<(u32, String)>>,
    calls: Mutex<Vec<(String, FileFormat)>>,
}

impl MockSource {
    fn new(documents: &[(&str, &[&str])]) -> Self {
        let pages = documents
            .iter()
            .map(|(file_name, pages)| {
                let numbered = pages
                    .iter()
                    .zip(0_u32..)
                    .map(|(text, number)| (number, (*text).to_string()))
                    .collect();
                ((*file_name).to_string(), numbered)
            })
            .collect();
        Self {
            pages,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn loads(&self) -> Vec<(String, FileFormat)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl DocumentSource for MockSource {
    fn load_pages(&self, path: &Path, format: FileFormat) -> Result<Vec<(u32, String)>, AppError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls
            .lock()
            .expect("calls lock")
            .push((file_name.clone(), format));
        self.pages
            .get(&file_name)
            .cloned()
            .ok_or(AppError::NotFound(file_name))
    }
}

#[derive(Default)]
struct MockStore {
    records: Mutex<Vec<IndexRecord>>,
}

impl MockStore {
    fn records(&self) -> Vec<IndexRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

impl VectorStore for MockStore {
    fn index(&self, records: &[IndexRecord]) -> Result<usize, AppError> {
        self.records
            .lock()
            .expect("records lock")
            .extend_from_slice(records);
        Ok(records.len())
    }

    fn similar(&self, _query: &str, k: usize) -> Result<Vec<IndexRecord>, AppError> {
        Ok(self.records().into_iter().take(k).collect())
    }
}

struct Fixture {
    dir: TempDir,
    config: AppConfig,
    source: Arc<MockSource>,
    store: Arc<MockStore>,
}

const AUTHOR: &str = "Kwame Nkrumah";

impl Fixture {
    fn new(documents: &[(&str, &[&str])]) -> Self {
        let dir = tempdir().expect("tempdir");
        let config = AppConfig {
            data_dir: dir.path().join("data").to_string_lossy().into_owned(),
            cache_dir: dir.path().join("cache").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let fixture = Self {
            dir,
            config,
            source: Arc::new(MockSource::new(documents)),
            store: Arc::new(MockStore::default()),
        };
        fs::create_dir_all(fixture.raw_dir()).expect("raw dir");
        fixture
    }

    fn raw_dir(&self) -> PathBuf {
        self.dir.path().join("data").join(AUTHOR).join("raw")
    }

    fn write(&self, file_name: &str, bytes: &[u8]) {
        fs::write(self.raw_dir().join(file_name), bytes).expect("write source file");
    }

    fn remaining(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.raw_dir())
            .expect("read raw dir")
            .map(|entry| {
                entry
                    .expect("entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    fn pipeline_with(&self, pipeline_config: PreparationConfig) -> PreparationPipeline {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        PreparationPipeline::new_with_config(
            self.config.clone(),
            Arc::new(WhitespaceTokenizer),
            source,
            store,
            pipeline_config,
        )
        .expect("pipeline")
    }

    fn pipeline(&self) -> PreparationPipeline {
        self.pipeline_with(PreparationConfig::default())
    }
}

fn work(title: &str, file_name: &str, core_pages: Option<std::ops::Range<u32>>) -> WorkSettings {
    WorkSettings {
        title: title.to_string(),
        file_name: file_name.to_string(),
        core_pages,
    }
}

fn author(works: Vec<WorkSettings>) -> AuthorSettings {
    AuthorSettings {
        name: AUTHOR.to_string(),
        biographers_and_compilers: vec!["June Milne".to_string()],
        works,
    }
}

const CONSCIENCISM: &[&str] = &[
    "Front matter",
    "Africa must\nunite.",
    "In 19 66 the coup.",
    "Index",
];

#[test]
fn prepare_work_cleans_chunks_and_indexes_core_pages() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    let consciencism = work("Consciencism", "Consciencism", Some(1..3));

    let prepared = fixture
        .pipeline()
        .prepare_work(&author(vec![consciencism.clone()]), &consciencism)
        .expect("prepared");

    assert_eq!(prepared.format, FileFormat::Pdf);
    assert_eq!(prepared.chunks.mode, ChunkingMode::Characters);
    assert_eq!(prepared.chunks.chunks.len(), 1);
    let chunk = &prepared.chunks.chunks[0];
    assert_eq!(chunk.text, "Africa must unite.\n\nIn 1966 the coup.");
    assert_eq!(chunk.page_numbers, vec![1, 2]);

    let sentence_chunks = prepared.sentence_chunks.expect("sentence chunks");
    assert_eq!(sentence_chunks.group_size, 30);
    assert_eq!(sentence_chunks.chunks.len(), 2);

    let records = fixture.store.records();
    assert_eq!(prepared.indexed, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.source, "Consciencism.pdf");
    assert_eq!(records[0].metadata.title, "Consciencism");
    assert_eq!(records[0].metadata.page_numbers, vec![1, 2]);
}

#[test]
fn unchanged_sources_are_served_from_cache() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    let consciencism = work("Consciencism", "Consciencism", Some(1..3));
    let author = author(vec![consciencism.clone()]);

    let first = fixture
        .pipeline()
        .prepare_work(&author, &consciencism)
        .expect("first run");
    let second = fixture
        .pipeline()
        .prepare_work(&author, &consciencism)
        .expect("second run");

    assert_eq!(fixture.source.loads().len(), 1);
    assert_eq!(first.chunks, second.chunks);
    assert_eq!(first.sentence_chunks, second.sentence_chunks);
}

#[test]
fn changed_sources_invalidate_the_cache() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF first edition");
    let consciencism = work("Consciencism", "Consciencism", Some(1..3));
    let author = author(vec![consciencism.clone()]);
    let pipeline = fixture.pipeline();

    pipeline
        .prepare_work(&author, &consciencism)
        .expect("first run");
    fixture.write("Consciencism.pdf", b"%PDF revised edition");
    pipeline
        .prepare_work(&author, &consciencism)
        .expect("second run");

    assert_eq!(fixture.source.loads().len(), 2);
}

#[test]
fn changed_core_pages_invalidate_the_cache() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    let pipeline = fixture.pipeline();
    let narrow = work("Consciencism", "Consciencism", Some(1..2));
    let wide = work("Consciencism", "Consciencism", Some(1..3));

    let first = pipeline
        .prepare_work(&author(vec![narrow.clone()]), &narrow)
        .expect("narrow");
    let second = pipeline
        .prepare_work(&author(vec![wide.clone()]), &wide)
        .expect("wide");

    assert_eq!(first.chunks.chunks[0].page_numbers, vec![1]);
    assert_eq!(second.chunks.chunks[0].page_numbers, vec![1, 2]);
}

#[test]
fn best_remaining_format_is_loaded() {
    let fixture = Fixture::new(&[("Dark Days in Ghana.epub", &["Page one."])]);
    fixture.write("Dark Days in Ghana.epub", b"epub");
    fixture.write("Dark Days in Ghana.mobi", b"mobi");
    let dark_days = work("Dark Days in Ghana", "Dark Days in Ghana", None);

    fixture
        .pipeline_with(PreparationConfig::chunk_only())
        .prepare_work(&author(vec![dark_days.clone()]), &dark_days)
        .expect("prepared");

    assert_eq!(
        fixture.source.loads(),
        vec![("Dark Days in Ghana.epub".to_string(), FileFormat::Epub)]
    );
}

#[test]
fn chunk_only_skips_indexing_and_sentence_details() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    let consciencism = work("Consciencism", "Consciencism", None);

    let prepared = fixture
        .pipeline_with(PreparationConfig::chunk_only())
        .prepare_work(&author(vec![consciencism.clone()]), &consciencism)
        .expect("prepared");

    assert!(prepared.sentence_chunks.is_none());
    assert_eq!(prepared.indexed, 0);
    assert!(fixture.store.records().is_empty());
    assert!(!prepared.chunks.chunks.is_empty());
}

#[test]
fn prune_sources_removes_duplicates_biographies_and_omnibus_editions() {
    let fixture = Fixture::new(&[]);
    for file_name in [
        "Consciencism.pdf",
        "Consciencism.epub",
        "Consciencism.mobi",
        "Kwame Nkrumah - June Milne.pdf",
        "Nkrumah complete works.epub",
    ] {
        fixture.write(file_name, b"content");
    }

    let mut removed = Vec::new();
    fixture
        .pipeline()
        .prune_sources(&author(Vec::new()), &mut removed)
        .expect("pruned");

    assert_eq!(removed.len(), 4);
    assert_eq!(fixture.remaining(), vec!["Consciencism.pdf"]);
}

#[test]
fn merge_corpus_joins_cleaned_works_in_order() {
    let fixture = Fixture::new(&[
        ("Consciencism.pdf", &["Philosophy and\nideology."]),
        ("Africa Must Unite.pdf", &["Unity is strength."]),
    ]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    fixture.write("Africa Must Unite.pdf", b"%PDF africa must unite");
    let works = vec![
        work("Consciencism", "Consciencism", None),
        work("Africa Must Unite", "Africa Must Unite", None),
    ];
    let author = author(works.clone());
    let pipeline = fixture.pipeline();

    let corpus = pipeline.merge_corpus(&author, &works).expect("corpus");
    let again = pipeline.merge_corpus(&author, &works).expect("cached corpus");

    assert_eq!(corpus, "Philosophy and ideology.\n\nUnity is strength.");
    assert_eq!(again, corpus);
    assert_eq!(fixture.source.loads().len(), 2);
}

#[test]
fn run_batch_isolates_failing_documents() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    let author = author(vec![
        work("Lost Manuscript", "Lost Manuscript", None),
        work("Consciencism", "Consciencism", Some(1..3)),
    ]);

    let report = run_batch(&fixture.pipeline(), &[author]);

    assert!(!report.is_clean());
    assert_eq!(report.prepared.len(), 1);
    assert_eq!(report.prepared[0].title, "Consciencism");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].document.as_deref(),
        Some("Lost Manuscript")
    );
    assert!(report.failures[0].error.contains("Lost Manuscript"));
    assert_eq!(report.corpora.len(), 1);
}

#[test]
fn failing_extraction_is_recorded_not_fatal() {
    let fixture = Fixture::new(&[("Consciencism.pdf", CONSCIENCISM)]);
    fixture.write("Consciencism.pdf", b"%PDF consciencism");
    fixture.write("Neo-Colonialism.pdf", b"%PDF neo-colonialism");
    let author = author(vec![
        work("Neo-Colonialism", "Neo-Colonialism", None),
        work("Consciencism", "Consciencism", None),
    ]);

    let report = run_batch(&fixture.pipeline(), &[author]);

    assert_eq!(report.prepared.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(fixture.store.records().len(), 1);
    assert!(fixture
        .store
        .similar("anything", 5)
        .expect("similar")
        .iter()
        .all(|record| record.metadata.title == "Consciencism"));
}
