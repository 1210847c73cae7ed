pub mod sentences;
pub mod splitter;

use std::{ops::Range, sync::Arc};

use common::{
    error::AppError,
    storage::types::{
        page_details::{PageDetails, SentenceChunkSet, TEXT_SEPARATOR},
        text_chunk::{ChunkSet, ChunkingMode, TextChunk},
        text_unit::TextUnit,
    },
    utils::{config::ChunkingSettings, tokenizer::ModelTokenizer},
};
use text_splitter::{ChunkSizer, Characters};
use tracing::{debug, info};

use self::splitter::{RecursiveSplitter, TokenCount};

/// Splits cleaned documents into chunks sized for the embedding model.
pub struct TextChunker {
    settings: ChunkingSettings,
    tokenizer: Arc<dyn ModelTokenizer>,
}

impl TextChunker {
    pub fn new(
        settings: ChunkingSettings,
        tokenizer: Arc<dyn ModelTokenizer>,
    ) -> Result<Self, AppError> {
        if settings.characters_per_chunk == 0 {
            return Err(AppError::Validation(
                "characters_per_chunk must be at least 1".into(),
            ));
        }
        if settings.sentences_per_chunk == 0 {
            return Err(AppError::Validation(
                "sentences_per_chunk must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&settings.token_overlap_ratio) {
            return Err(AppError::Validation(format!(
                "token_overlap_ratio must be in [0, 1), got {}",
                settings.token_overlap_ratio
            )));
        }
        Ok(Self {
            settings,
            tokenizer,
        })
    }

    pub fn settings(&self) -> &ChunkingSettings {
        &self.settings
    }

    pub fn max_input_capacity(&self) -> usize {
        let capacity = self.tokenizer.max_input_tokens();
        debug!(model_id = %self.tokenizer.model_id(), capacity, "embedding model capacity");
        capacity
    }

    /// True if any single unit is longer than `capacity` tokens. A unit the
    /// tokenizer rejects is an error here rather than an estimate.
    pub fn exceeds_capacity(&self, units: &[TextUnit], capacity: usize) -> Result<bool, AppError> {
        for unit in units {
            if self.tokenizer.try_count_tokens(&unit.cleaned_text)? > capacity {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Tokens left for text once the model's special tokens are added.
    fn content_capacity(&self) -> usize {
        self.max_input_capacity().saturating_sub(self.tokenizer.special_tokens())
    }

    pub fn chunk_by_tokens(
        &self,
        units: &[TextUnit],
        capacity: usize,
        overlap_ratio: f64,
    ) -> Result<Vec<TextChunk>, AppError> {
        if capacity == 0 {
            return Err(AppError::Validation("token capacity must be at least 1".into()));
        }
        let overlap = overlap_tokens(capacity, overlap_ratio);
        let splitter = RecursiveSplitter::new(
            TokenCount(self.tokenizer.as_ref()),
            capacity,
            overlap,
            &self.settings.separators,
        );
        Ok(assemble(units, &splitter, true))
    }

    pub fn chunk_by_characters(
        &self,
        units: &[TextUnit],
        max_chars: usize,
        overlap_chars: usize,
    ) -> Result<Vec<TextChunk>, AppError> {
        if max_chars == 0 {
            return Err(AppError::Validation("chunk size must be at least 1".into()));
        }
        let splitter =
            RecursiveSplitter::new(Characters, max_chars, overlap_chars, &self.settings.separators);
        Ok(assemble(units, &splitter, false))
    }

    /// Chunks by tokens when some unit would not fit the model in one
    /// input, by characters otherwise.
    pub fn chunk(&self, units: &[TextUnit]) -> Result<ChunkSet, AppError> {
        let capacity = self.content_capacity();
        let (mode, chunks) = if self.exceeds_capacity(units, capacity)? {
            let chunks = self.chunk_by_tokens(units, capacity, self.settings.token_overlap_ratio)?;
            (ChunkingMode::Tokens, chunks)
        } else {
            let chunks = self.chunk_by_characters(
                units,
                self.settings.characters_per_chunk,
                self.settings.overlapping_characters,
            )?;
            (ChunkingMode::Characters, chunks)
        };
        info!(units = units.len(), chunks = chunks.len(), ?mode, "chunked document");
        Ok(ChunkSet { mode, chunks })
    }

    pub fn page_details(&self, units: &[TextUnit]) -> Vec<PageDetails> {
        sentences::page_details(units)
    }

    pub fn sentence_chunks(&self, pages: &[PageDetails]) -> Result<SentenceChunkSet, AppError> {
        let group_size = self.settings.sentences_per_chunk;
        let chunks = sentences::sentence_chunk_details(pages, group_size)?;
        Ok(SentenceChunkSet { group_size, chunks })
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn overlap_tokens(capacity: usize, ratio: f64) -> usize {
    (capacity as f64 * ratio.clamp(0.0, 1.0)).round() as usize
}

/// A unit's span in the joined text, trailing separator included.
struct UnitSpan {
    page_number: u32,
    bytes: Range<usize>,
}

fn join_units(units: &[TextUnit]) -> (String, Vec<UnitSpan>) {
    let mut text = String::new();
    let mut spans: Vec<UnitSpan> = Vec::new();
    for unit in units.iter().filter(|unit| !unit.cleaned_text.is_empty()) {
        if let Some(previous) = spans.last_mut() {
            text.push_str(TEXT_SEPARATOR);
            previous.bytes.end = text.len();
        }
        let start = text.len();
        text.push_str(&unit.cleaned_text);
        spans.push(UnitSpan {
            page_number: unit.page_number,
            bytes: start..text.len(),
        });
    }
    (text, spans)
}

fn pages_touched(spans: &[UnitSpan], window: &Range<usize>) -> Vec<u32> {
    let mut pages: Vec<u32> = spans
        .iter()
        .filter(|span| span.bytes.start < window.end && window.start < span.bytes.end)
        .map(|span| span.page_number)
        .collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}

fn assemble<S: ChunkSizer>(
    units: &[TextUnit],
    splitter: &RecursiveSplitter<'_, S>,
    count_tokens: bool,
) -> Vec<TextChunk> {
    let (text, spans) = join_units(units);
    let mut chunks = Vec::new();
    let mut char_offset: usize = 0;
    let mut byte_offset = 0;

    for window in splitter.split(&text) {
        let skipped = text
            .get(byte_offset..window.start)
            .unwrap_or_default()
            .chars()
            .count();
        char_offset = char_offset.saturating_add(skipped);
        byte_offset = window.start;

        let chunk_text = text.get(window.clone()).unwrap_or_default();
        if chunk_text.trim().is_empty() {
            continue;
        }
        let token_count = count_tokens.then(|| splitter.size_of(chunk_text));
        chunks.push(TextChunk::new(
            chunk_text.to_string(),
            pages_touched(&spans, &window),
            char_offset,
            token_count,
        ));
    }
    chunks
}
