use common::{error::AppError, storage::types::source_document::FileFormat};

/// Length of the extension at the end of `file_name`, dot included.
///
/// Looked up from the known endings rather than searched for with the last
/// `.`, because titles may themselves contain periods.
fn extension_length(file_name: &str) -> Result<usize, AppError> {
    if file_name.ends_with(".epub") || file_name.ends_with(".mobi") {
        Ok(5)
    } else if file_name.ends_with(".pdf") || file_name.ends_with(".txt") {
        Ok(4)
    } else {
        Err(AppError::UnsupportedFormat(format!(
            "{file_name} is neither a .mobi, .epub, .txt nor .pdf file"
        )))
    }
}

pub fn get_file_extension(file_name: &str) -> Result<&str, AppError> {
    let length = extension_length(file_name)?;
    let split_at = file_name.len().saturating_sub(length);
    Ok(file_name.get(split_at..).unwrap_or_default())
}

pub fn get_file_name_without_extension(file_name: &str) -> Result<&str, AppError> {
    let length = extension_length(file_name)?;
    let split_at = file_name.len().saturating_sub(length);
    Ok(file_name.get(..split_at).unwrap_or_default())
}

pub fn get_file_format(file_name: &str) -> Result<FileFormat, AppError> {
    let extension = get_file_extension(file_name)?;
    FileFormat::from_extension(extension)
        .ok_or_else(|| AppError::UnsupportedFormat(file_name.to_string()))
}
