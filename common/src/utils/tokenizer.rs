use std::path::Path;

use tokenizers::{PostProcessor, Tokenizer};
use tracing::{info, warn};

use crate::error::AppError;

/// Token counting and input capacity of an embedding model.
///
/// Loading a tokenizer is expensive, so implementations are meant to be
/// built once per process and shared behind an `Arc`.
pub trait ModelTokenizer: Send + Sync {
    fn model_id(&self) -> &str;

    /// Tokens of `text` alone, without the special tokens the model wraps
    /// every input in.
    fn try_count_tokens(&self, text: &str) -> Result<usize, AppError>;

    /// Infallible form used while sizing windows. Implementations that can
    /// fail fall back to an upper bound and log it.
    fn count_tokens(&self, text: &str) -> usize {
        self.try_count_tokens(text).unwrap_or_else(|err| {
            warn!(
                model_id = %self.model_id(),
                error = %err,
                "tokenization failed; counting characters"
            );
            text.chars().count()
        })
    }

    /// Special tokens added to every input, such as `[CLS]` and `[SEP]`.
    fn special_tokens(&self) -> usize {
        0
    }

    /// Largest number of tokens the model accepts in one input, special
    /// tokens included.
    fn max_input_tokens(&self) -> usize;
}

/// Hugging Face tokenizer of an embedding model.
pub struct HfTokenizer {
    model_id: String,
    tokenizer: Tokenizer,
    max_input_tokens: usize,
}

impl HfTokenizer {
    pub fn from_pretrained(
        model_id: &str,
        fallback_max_input_tokens: usize,
    ) -> Result<Self, AppError> {
        let tokenizer = Tokenizer::from_pretrained(model_id, None).map_err(|e| {
            AppError::Tokenizer(format!("failed to load tokenizer for {model_id}: {e}"))
        })?;
        Self::from_tokenizer(model_id, tokenizer, fallback_max_input_tokens)
    }

    pub fn from_file(
        model_id: &str,
        path: &Path,
        fallback_max_input_tokens: usize,
    ) -> Result<Self, AppError> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            AppError::Tokenizer(format!(
                "failed to read tokenizer {}: {e}",
                path.display()
            ))
        })?;
        Self::from_tokenizer(model_id, tokenizer, fallback_max_input_tokens)
    }

    /// The capacity is taken from the tokenizer's truncation length. Truncation
    /// and padding are switched off afterwards so counts reflect the real input.
    pub fn from_tokenizer(
        model_id: &str,
        mut tokenizer: Tokenizer,
        fallback_max_input_tokens: usize,
    ) -> Result<Self, AppError> {
        let max_input_tokens = tokenizer
            .get_truncation()
            .map_or(fallback_max_input_tokens, |params| params.max_length);

        tokenizer
            .with_truncation(None)
            .map_err(|e| AppError::Tokenizer(format!("failed to disable truncation: {e}")))?;
        tokenizer.with_padding(None);

        info!(model_id, max_input_tokens, "loaded embedding tokenizer");

        Ok(Self {
            model_id: model_id.to_string(),
            tokenizer,
            max_input_tokens,
        })
    }
}

impl ModelTokenizer for HfTokenizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn try_count_tokens(&self, text: &str) -> Result<usize, AppError> {
        self.tokenizer
            .encode(text, false)
            .map(|encoding| encoding.len())
            .map_err(|e| {
                AppError::Tokenizer(format!("failed to tokenize with {}: {e}", self.model_id))
            })
    }

    fn special_tokens(&self) -> usize {
        self.tokenizer
            .get_post_processor()
            .map_or(0, |processor| processor.added_tokens(false))
    }

    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }
}
