use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use common::{
    error::AppError,
    storage::types::source_document::{FileFormat, SourceDocument},
};
use tracing::{debug, error, info, warn};

use crate::utils::file_names::{get_file_format, get_file_name_without_extension};

/// Base name (no extension) mapped to the formats found for it.
pub type Candidates = BTreeMap<String, BTreeSet<FileFormat>>;

/// Reduces a directory of downloaded works to one canonical file per work.
#[derive(Debug, Clone)]
pub struct SourceManager {
    directory: PathBuf,
    preferred_format: FileFormat,
}

impl SourceManager {
    pub fn new(directory: impl Into<PathBuf>, preferred_format: FileFormat) -> Self {
        Self {
            directory: directory.into(),
            preferred_format,
        }
    }

    fn version_path(&self, base_name: &str, format: FileFormat) -> PathBuf {
        self.directory
            .join(format!("{base_name}{}", format.extension()))
    }

    fn version_exists(&self, base_name: &str, format: FileFormat) -> bool {
        self.version_path(base_name, format).is_file()
    }

    /// Regular files directly inside the directory, sorted by name.
    pub fn file_names(&self) -> Result<Vec<String>, AppError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().into_string().map_err(|raw| {
                AppError::UnsupportedFormat(format!("file name {raw:?} is not valid UTF-8"))
            })?;
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    pub fn list_candidates(&self) -> Result<Candidates, AppError> {
        let mut candidates = Candidates::new();
        for name in self.file_names()? {
            let base_name = get_file_name_without_extension(&name)?;
            let format = get_file_format(&name)?;
            candidates
                .entry(base_name.to_string())
                .or_default()
                .insert(format);
        }
        Ok(candidates)
    }

    /// Every work in the directory, titled after its base name.
    pub fn documents(&self) -> Result<Vec<SourceDocument>, AppError> {
        Ok(self
            .list_candidates()?
            .into_iter()
            .map(|(base_name, formats)| {
                SourceDocument::new(base_name.clone(), base_name, formats, None)
            })
            .collect())
    }

    /// Keeps the highest-ranked format of every duplicated work and deletes
    /// the other ranked copies. `txt` artifacts are never touched.
    ///
    /// A work whose ranked copies have all vanished from disk is reported as
    /// [`AppError::MissingVersion`] once every other work has been resolved.
    pub fn resolve_duplicates(&self, candidates: &Candidates) -> Result<Vec<PathBuf>, AppError> {
        let mut removed = Vec::new();
        self.resolve_duplicates_into(candidates, &mut removed)?;
        Ok(removed)
    }

    /// Like [`Self::resolve_duplicates`], but appends deleted paths to
    /// `removed` as it goes, so deletions made before an error are kept.
    pub fn resolve_duplicates_into(
        &self,
        candidates: &Candidates,
        removed: &mut Vec<PathBuf>,
    ) -> Result<(), AppError> {
        let mut unresolved = Vec::new();

        for (base_name, formats) in candidates {
            match self.resolve_base_name(base_name, formats) {
                Ok(paths) => removed.extend(paths),
                Err(err) => {
                    error!(base_name = %base_name, error = %err, "unable to resolve duplicates");
                    unresolved.push(base_name.clone());
                }
            }
        }

        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingVersion(unresolved.join(", ")))
        }
    }

    pub fn resolve_base_name(
        &self,
        base_name: &str,
        formats: &BTreeSet<FileFormat>,
    ) -> Result<Vec<PathBuf>, AppError> {
        let ranking = FileFormat::ranking(self.preferred_format);
        let copies: Vec<FileFormat> = ranking
            .iter()
            .copied()
            .filter(|format| formats.contains(format))
            .collect();

        if copies.len() <= 1 {
            debug!(base_name, "no duplicate found");
            return Ok(Vec::new());
        }
        info!(base_name, copies = copies.len(), "found duplicate copies");

        let keep = ranking
            .iter()
            .copied()
            .find(|format| self.version_exists(base_name, *format))
            .ok_or_else(|| AppError::MissingVersion(base_name.to_string()))?;

        if keep != self.preferred_format {
            warn!(
                base_name,
                preferred = %self.preferred_format,
                kept = %keep,
                "preferred format missing; keeping the next best copy"
            );
        }

        Ok(copies
            .into_iter()
            .filter(|format| *format != keep)
            .filter_map(|format| delete_file(&self.version_path(base_name, format)))
            .collect())
    }

    /// Deletes every listed file whose name contains one of `substrings`.
    pub fn remove_matching(&self, file_names: &[String], substrings: &[String]) -> Vec<PathBuf> {
        file_names
            .iter()
            .filter(|name| {
                substrings
                    .iter()
                    .any(|fragment| !fragment.is_empty() && name.contains(fragment.as_str()))
            })
            .filter_map(|name| delete_file(&self.directory.join(name)))
            .collect()
    }
}

/// Deletion failures are logged and skipped; a previous pass may already
/// have removed the file.
fn delete_file(path: &Path) -> Option<PathBuf> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "deleted file");
            Some(path.to_path_buf())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "file already gone; nothing to delete");
            None
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to delete file");
            None
        }
    }
}
