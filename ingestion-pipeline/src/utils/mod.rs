pub mod file_names;
pub mod file_text_extraction;
pub mod pdf_ingestion;
