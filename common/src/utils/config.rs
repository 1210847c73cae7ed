use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::storage::types::source_document::FileFormat;

/// A single known OCR/typo fix applied to every cleaned page.
#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub target: String,
    pub replacement: String,
}

impl Substitution {
    pub fn new(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct SourceSettings {
    #[serde(default = "default_preferred_format")]
    pub preferred_format: FileFormat,
    /// Name fragments of omnibus editions that duplicate individually kept works.
    #[serde(default = "default_excluded_name_fragments")]
    pub excluded_name_fragments: Vec<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            preferred_format: default_preferred_format(),
            excluded_name_fragments: default_excluded_name_fragments(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CleaningSettings {
    #[serde(default = "default_substitutions")]
    pub substitutions: Vec<Substitution>,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            substitutions: default_substitutions(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct ChunkingSettings {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Local `tokenizer.json` used instead of downloading the model's.
    #[serde(default)]
    pub tokenizer_path: Option<String>,
    /// Used when the tokenizer does not advertise a truncation length.
    #[serde(default = "default_fallback_max_input_tokens")]
    pub fallback_max_input_tokens: usize,
    #[serde(default = "default_characters_per_chunk")]
    pub characters_per_chunk: usize,
    #[serde(default = "default_overlapping_characters")]
    pub overlapping_characters: usize,
    #[serde(default = "default_token_overlap_ratio")]
    pub token_overlap_ratio: f64,
    #[serde(default = "default_sentences_per_chunk")]
    pub sentences_per_chunk: usize,
    /// Tried in order, coarsest first.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            tokenizer_path: None,
            fallback_max_input_tokens: default_fallback_max_input_tokens(),
            characters_per_chunk: default_characters_per_chunk(),
            overlapping_characters: default_overlapping_characters(),
            token_overlap_ratio: default_token_overlap_ratio(),
            sentences_per_chunk: default_sentences_per_chunk(),
            separators: default_separators(),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct WorkSettings {
    pub title: String,
    /// Base file name on disk, without extension.
    pub file_name: String,
    /// Zero-based, half-open page range holding the substantive text.
    #[serde(default)]
    pub core_pages: Option<Range<u32>>,
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
pub struct AuthorSettings {
    pub name: String,
    #[serde(default)]
    pub biographers_and_compilers: Vec<String>,
    #[serde(default)]
    pub works: Vec<WorkSettings>,
}

impl AuthorSettings {
    pub fn raw_data_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.name).join("raw")
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub cleaning: CleaningSettings,
    #[serde(default)]
    pub chunking: ChunkingSettings,
    #[serde(default)]
    pub authors: Vec<AuthorSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
            sources: SourceSettings::default(),
            cleaning: CleaningSettings::default(),
            chunking: ChunkingSettings::default(),
            authors: Vec::new(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_cache_dir() -> String {
    "./data/cache".to_string()
}

fn default_preferred_format() -> FileFormat {
    FileFormat::Pdf
}

fn default_excluded_name_fragments() -> Vec<String> {
    vec!["complete works".to_string()]
}

fn default_substitutions() -> Vec<Substitution> {
    vec![
        Substitution::new("\u{ad}", ""),
        Substitution::new("Cl.A", "C.I.A"),
        Substitution::new("fkunkeys", "flunkeys"),
        Substitution::new("'coup'", "coup"),
        Substitution::new("19 66", "1966"),
        Substitution::new("I 966", "1966"),
    ]
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".to_string()
}

fn default_fallback_max_input_tokens() -> usize {
    384
}

fn default_characters_per_chunk() -> usize {
    400
}

fn default_overlapping_characters() -> usize {
    100
}

fn default_token_overlap_ratio() -> f64 {
    0.1
}

fn default_sentences_per_chunk() -> usize {
    30
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ".", " "]
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    config.try_deserialize()
}
