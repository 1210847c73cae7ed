use std::{
    collections::BTreeSet,
    fmt,
    ops::Range,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// On-disk formats a downloaded work can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Pdf,
    Epub,
    Mobi,
    Txt,
}

impl FileFormat {
    /// Formats that compete with each other during deduplication, best first.
    pub const RANKED: [Self; 3] = [Self::Pdf, Self::Epub, Self::Mobi];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Epub => ".epub",
            Self::Mobi => ".mobi",
            Self::Txt => ".txt",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".pdf" => Some(Self::Pdf),
            ".epub" => Some(Self::Epub),
            ".mobi" => Some(Self::Mobi),
            ".txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Preference order used when resolving duplicates: the preferred format
    /// first, then the remaining ranked formats in their fixed order. `txt`
    /// never takes part, even when configured as preferred.
    pub fn ranking(preferred: Self) -> Vec<Self> {
        if !Self::RANKED.contains(&preferred) {
            return Self::RANKED.to_vec();
        }
        std::iter::once(preferred)
            .chain(Self::RANKED.into_iter().filter(|format| *format != preferred))
            .collect()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

/// One logical work and the formats of it currently found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub title: String,
    pub base_name: String,
    pub formats: BTreeSet<FileFormat>,
    pub core_pages: Option<Range<u32>>,
}

impl SourceDocument {
    pub fn new(
        title: impl Into<String>,
        base_name: impl Into<String>,
        formats: BTreeSet<FileFormat>,
        core_pages: Option<Range<u32>>,
    ) -> Self {
        Self {
            title: title.into(),
            base_name: base_name.into(),
            formats,
            core_pages,
        }
    }

    pub fn file_name(&self, format: FileFormat) -> String {
        format!("{}{}", self.base_name, format.extension())
    }

    pub fn path_in(&self, directory: &Path, format: FileFormat) -> PathBuf {
        directory.join(self.file_name(format))
    }

    /// The format that survives deduplication under the given preference.
    pub fn retained_format(&self, preferred: FileFormat) -> Option<FileFormat> {
        FileFormat::ranking(preferred)
            .into_iter()
            .find(|format| self.formats.contains(format))
    }
}
