use std::{fs, path::Path};

use common::{error::AppError, storage::types::source_document::FileFormat};

use super::pdf_ingestion::extract_pdf_pages;

/// Form feed; text exports keep one page per form-feed separated block.
const PAGE_BREAK: char = '\u{c}';

pub fn extract_pages_from_file(
    path: &Path,
    format: FileFormat,
) -> Result<Vec<(u32, String)>, AppError> {
    match format {
        FileFormat::Pdf => extract_pdf_pages(path),
        FileFormat::Txt => {
            let content = fs::read_to_string(path)?;
            Ok(content
                .split(PAGE_BREAK)
                .zip(0_u32..)
                .map(|(page, number)| (number, page.to_string()))
                .collect())
        }
        FileFormat::Epub | FileFormat::Mobi => Err(AppError::UnsupportedFormat(format!(
            "no text extraction for {format} files ({})",
            path.display()
        ))),
    }
}
