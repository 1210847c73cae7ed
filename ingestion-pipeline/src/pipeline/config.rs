/// Switches for the optional stages of document preparation.
#[derive(Debug, Clone)]
pub struct PreparationConfig {
    /// Run the source directory pass (duplicates, biographies, omnibus
    /// editions) before preparing an author's works.
    pub prune_sources: bool,
    /// Compute per-page details and fixed-count sentence chunks.
    pub sentence_details: bool,
    /// Hand the chunks to the vector store.
    pub index_chunks: bool,
    /// Merge the cleaned text of every prepared work into one corpus.
    pub merge_corpus: bool,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            prune_sources: true,
            sentence_details: true,
            index_chunks: true,
            merge_corpus: true,
        }
    }
}

impl PreparationConfig {
    /// Only cleaning and chunking; nothing outside the cache is touched.
    pub fn chunk_only() -> Self {
        Self {
            prune_sources: false,
            sentence_details: false,
            index_chunks: false,
            merge_corpus: false,
        }
    }
}
