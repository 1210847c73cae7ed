use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use common::error::AppError;

/// Extracts the text layer of every page, in page order.
///
/// Page numbers are zero-based: the first page of the file is page 0.
/// Pages whose text cannot be decoded are kept as empty strings so the
/// numbering of later pages stays aligned with the file.
pub fn extract_pdf_pages(file_path: &Path) -> Result<Vec<(u32, String)>, AppError> {
    let document = Document::load(file_path).map_err(|err| {
        AppError::Pdf(format!("failed to parse {}: {err}", file_path.display()))
    })?;

    let page_numbers = load_page_numbers(&document);
    debug!(path = %file_path.display(), pages = page_numbers.len(), "loaded PDF");

    Ok(page_numbers
        .into_iter()
        .map(|page_number| {
            let text = document.extract_text(&[page_number]).unwrap_or_else(|err| {
                warn!(
                    path = %file_path.display(),
                    page_number,
                    error = %err,
                    "failed to extract page text; keeping it empty"
                );
                String::new()
            });
            (page_number.saturating_sub(1), text)
        })
        .collect())
}

/// One-based page numbers of the document, ascending.
fn load_page_numbers(document: &Document) -> Vec<u32> {
    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();
    page_numbers
}
