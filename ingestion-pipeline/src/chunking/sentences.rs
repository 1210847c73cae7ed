use std::sync::LazyLock;

use common::{
    error::AppError,
    storage::types::{
        page_details::{PageDetails, SentenceChunkDetails},
        text_unit::TextUnit,
    },
};
use regex::Regex;

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space run pattern is valid"));

static GLUED_SENTENCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([A-Z])").expect("sentence boundary pattern is valid"));

/// Splits on a period followed by a space, keeping the period.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(". ")
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Consecutive, non-overlapping groups of `group_size` items. The last
/// group holds whatever remains.
pub fn chunk_sentences_fixed_count<T: Clone>(
    sentences: &[T],
    group_size: usize,
) -> Result<Vec<Vec<T>>, AppError> {
    if group_size == 0 {
        return Err(AppError::Validation(
            "sentence group size must be at least 1".into(),
        ));
    }
    Ok(sentences.chunks(group_size).map(<[T]>::to_vec).collect())
}

/// Joins a sentence group into one passage.
pub fn merge_chunk<S: AsRef<str>>(group: &[S]) -> String {
    let joined: String = group.iter().map(AsRef::as_ref).collect();
    let collapsed = SPACE_RUNS.replace_all(&joined, " ");
    GLUED_SENTENCES
        .replace_all(&collapsed, ". $1")
        .trim()
        .to_string()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn page_details(units: &[TextUnit]) -> Vec<PageDetails> {
    units
        .iter()
        .map(|unit| {
            let sentences = split_sentences(&unit.cleaned_text);
            PageDetails {
                page_number: unit.page_number,
                character_count: unit.cleaned_text.chars().count(),
                sentence_count: sentences.len(),
                word_count: word_count(&unit.cleaned_text),
                sentences,
            }
        })
        .collect()
}

pub fn sentence_chunk_details(
    pages: &[PageDetails],
    group_size: usize,
) -> Result<Vec<SentenceChunkDetails>, AppError> {
    let mut details = Vec::new();
    for page in pages {
        for group in chunk_sentences_fixed_count(&page.sentences, group_size)? {
            let merged_chunk = merge_chunk(&group).replace('\n', " ");
            details.push(SentenceChunkDetails {
                page_number: page.page_number,
                character_count: merged_chunk.chars().count(),
                word_count: word_count(&merged_chunk),
                merged_chunk,
            });
        }
    }
    Ok(details)
}
