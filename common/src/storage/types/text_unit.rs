use serde::{Deserialize, Serialize};

/// One page (or contiguous extracted block) of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub page_number: u32,
    pub raw_text: String,
    pub cleaned_text: String,
}

impl TextUnit {
    pub fn new(page_number: u32, raw_text: String, cleaned_text: String) -> Self {
        Self {
            page_number,
            raw_text,
            cleaned_text,
        }
    }

    /// Wraps text that has already been cleaned, e.g. a segmented sentence.
    pub fn from_cleaned(page_number: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            page_number,
            raw_text: text.clone(),
            cleaned_text: text,
        }
    }
}
