use serde::{Deserialize, Serialize};

use super::{text_unit::TextUnit, CachedArtifact};

/// Separates pages in a cleaned text, and documents in a merged corpus.
pub const TEXT_SEPARATOR: &str = "\n\n";

/// Per-page statistics collected on the sentence chunking path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetails {
    pub page_number: u32,
    pub sentences: Vec<String>,
    pub character_count: usize,
    pub sentence_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceChunkDetails {
    pub merged_chunk: String,
    pub page_number: u32,
    pub character_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetailSet {
    pub pages: Vec<PageDetails>,
}

impl CachedArtifact for PageDetailSet {
    fn artifact_kind() -> &'static str {
        "page_details"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceChunkSet {
    pub group_size: usize,
    pub chunks: Vec<SentenceChunkDetails>,
}

impl CachedArtifact for SentenceChunkSet {
    fn artifact_kind() -> &'static str {
        "sentence_chunks"
    }
}

/// Cleaned full text of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedText {
    pub text: String,
}

impl CleanedText {
    /// Joins the non-empty cleaned pages of a document.
    pub fn from_units(units: &[TextUnit]) -> Self {
        Self {
            text: units
                .iter()
                .map(|unit| unit.cleaned_text.as_str())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(TEXT_SEPARATOR),
        }
    }
}

impl CachedArtifact for CleanedText {
    fn artifact_kind() -> &'static str {
        "cleaned_text"
    }
}

/// Cleaned text of several documents merged into one corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedCorpus {
    pub documents: Vec<String>,
    pub text: String,
}

impl CachedArtifact for MergedCorpus {
    fn artifact_kind() -> &'static str {
        "merged_corpus"
    }
}
