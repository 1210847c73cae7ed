use std::ops::Range;

use common::{
    error::AppError,
    storage::types::text_unit::TextUnit,
    utils::config::{CleaningSettings, Substitution},
};
use tracing::{debug, warn};

/// Upper bound on passes over the substitution table before giving up on
/// reaching a fixed point.
const MAX_SUBSTITUTION_PASSES: usize = 8;

/// Turns raw extracted pages into cleaned [`TextUnit`]s.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    substitutions: Vec<Substitution>,
}

impl TextCleaner {
    pub fn new(settings: &CleaningSettings) -> Result<Self, AppError> {
        Self::with_substitutions(settings.substitutions.clone())
    }

    pub fn with_substitutions(substitutions: Vec<Substitution>) -> Result<Self, AppError> {
        for substitution in &substitutions {
            if substitution.target.is_empty() {
                return Err(AppError::Validation(
                    "substitution targets must not be empty".into(),
                ));
            }
            if substitution.replacement.contains(&substitution.target) {
                return Err(AppError::Validation(format!(
                    "replacement '{}' contains its own target '{}'",
                    substitution.replacement, substitution.target
                )));
            }
        }
        Ok(Self { substitutions })
    }

    /// Keeps the pages inside `core_pages`, preserving order. Without a range
    /// every page is core.
    pub fn select_core_pages(
        units: Vec<TextUnit>,
        core_pages: Option<&Range<u32>>,
    ) -> Vec<TextUnit> {
        let Some(range) = core_pages else {
            return units;
        };
        let total = units.len();
        let kept: Vec<TextUnit> = units
            .into_iter()
            .filter(|unit| range.contains(&unit.page_number))
            .collect();
        debug!(total, kept = kept.len(), "selected core pages");
        kept
    }

    pub fn remove_line_breaks(text: &str) -> String {
        text.replace("\r\n", " ")
            .replace(['\n', '\r'], " ")
            .trim()
            .to_string()
    }

    /// Applies the table in order until nothing changes, so cleaning an
    /// already cleaned text is a no-op.
    pub fn apply_substitutions(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_SUBSTITUTION_PASSES {
            let next = self
                .substitutions
                .iter()
                .fold(current.clone(), |acc, substitution| {
                    if acc.contains(&substitution.target) {
                        acc.replace(&substitution.target, &substitution.replacement)
                    } else {
                        acc
                    }
                });
            if next == current {
                return current;
            }
            current = next;
        }
        warn!("substitution table did not settle; keeping the last pass");
        current
    }

    pub fn clean_text(&self, raw_text: &str) -> String {
        let text = self.apply_substitutions(&Self::remove_line_breaks(raw_text));
        // Substitutions may expose surrounding whitespace.
        text.trim().to_string()
    }

    pub fn clean_page(&self, page_number: u32, raw_text: String) -> TextUnit {
        let cleaned_text = self.clean_text(&raw_text);
        TextUnit::new(page_number, raw_text, cleaned_text)
    }

    pub fn clean_document(
        &self,
        pages: Vec<(u32, String)>,
        core_pages: Option<&Range<u32>>,
    ) -> Vec<TextUnit> {
        let units = pages
            .into_iter()
            .map(|(page_number, raw_text)| self.clean_page(page_number, raw_text))
            .collect();
        Self::select_core_pages(units, core_pages)
    }
}
