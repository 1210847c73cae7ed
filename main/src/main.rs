use std::{path::Path, sync::Arc};

use common::utils::{config::get_config, tokenizer::HfTokenizer};
use ingestion_pipeline::{run_batch, InMemoryVectorStore, LopdfSource, PreparationPipeline};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    info!(
        data_dir = %config.data_dir,
        cache_dir = %config.cache_dir,
        authors = config.authors.len(),
        "loaded configuration"
    );

    // One tokenizer per process, shared by every document.
    let chunking = &config.chunking;
    let tokenizer = Arc::new(match &chunking.tokenizer_path {
        Some(path) => HfTokenizer::from_file(
            &chunking.embedding_model,
            Path::new(path),
            chunking.fallback_max_input_tokens,
        )?,
        None => HfTokenizer::from_pretrained(
            &chunking.embedding_model,
            chunking.fallback_max_input_tokens,
        )?,
    });
    let store = Arc::new(InMemoryVectorStore::new());
    let indexed_store = Arc::clone(&store);

    let authors = config.authors.clone();
    let pipeline =
        PreparationPipeline::new(config, tokenizer, Arc::new(LopdfSource), indexed_store)?;

    let report = run_batch(&pipeline, &authors);
    info!(
        prepared = report.prepared.len(),
        removed_files = report.removed_files.len(),
        indexed = store.len()?,
        "corpus preparation finished"
    );
    if store.is_empty()? && !report.prepared.is_empty() {
        warn!("no chunks were indexed");
    }

    for failure in &report.failures {
        error!(
            author = %failure.author,
            document = failure.document.as_deref().unwrap_or("-"),
            error = %failure.error,
            "document was not prepared"
        );
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(format!("{} document(s) failed; see the log", report.failures.len()).into())
    }
}
