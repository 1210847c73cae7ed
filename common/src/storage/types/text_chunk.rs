use serde::{Deserialize, Serialize};

use super::CachedArtifact;

/// A bounded span of cleaned text, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Pages the span touches, ascending.
    pub page_numbers: Vec<u32>,
    /// Character offset of the span in the document's joined text.
    pub start_index: usize,
    pub character_count: usize,
    /// Only measured when chunking by tokens.
    pub token_count: Option<usize>,
}

impl TextChunk {
    pub fn new(
        text: String,
        page_numbers: Vec<u32>,
        start_index: usize,
        token_count: Option<usize>,
    ) -> Self {
        let character_count = text.chars().count();
        Self {
            text,
            page_numbers,
            start_index,
            character_count,
            token_count,
        }
    }
}

/// Unit the chunk sizes of a chunk set are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMode {
    Characters,
    Tokens,
}

/// The chunks of one document together with the mode that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSet {
    pub mode: ChunkingMode,
    pub chunks: Vec<TextChunk>,
}

impl CachedArtifact for ChunkSet {
    fn artifact_kind() -> &'static str {
        "chunks"
    }
}

/// Metadata handed to the vector store next to each chunk text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    pub page_numbers: Vec<u32>,
    pub start_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl IndexRecord {
    pub fn from_chunk(chunk: &TextChunk, source: &str, title: &str) -> Self {
        Self {
            text: chunk.text.clone(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                title: title.to_string(),
                page_numbers: chunk.page_numbers.clone(),
                start_index: chunk.start_index,
            },
        }
    }
}
