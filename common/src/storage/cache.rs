use std::{
    fs::{self, File},
    io::{BufReader, ErrorKind, Read},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{error::AppError, storage::types::CachedArtifact};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    key: String,
    kind: String,
    source_digest: String,
    created_at: DateTime<Utc>,
    payload: T,
}

/// Key-addressed store of derived artifacts (cleaned text, page details,
/// chunks) on the local filesystem.
///
/// Every entry records the SHA-256 digest of the input it was derived from.
/// An entry is only served while that digest matches the caller's current
/// one; anything else counts as a miss and is overwritten on the next
/// insert.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating cache directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn entry_path<T: CachedArtifact>(&self, key: &str) -> Result<PathBuf, AppError> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(AppError::Validation(format!(
                "invalid cache key '{key}'; keys must be plain file names"
            )));
        }
        Ok(self
            .root
            .join(T::artifact_kind())
            .join(format!("{key}.json")))
    }

    pub fn get<T: CachedArtifact>(
        &self,
        key: &str,
        source_digest: &str,
    ) -> Result<Option<T>, AppError> {
        let path = self.entry_path::<T>(key)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "discarding unreadable cache entry"
                );
                return Ok(None);
            }
        };

        if envelope.source_digest != source_digest {
            debug!(
                key,
                kind = T::artifact_kind(),
                "cache entry is stale; source digest changed"
            );
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    pub fn put<T: CachedArtifact>(
        &self,
        key: &str,
        source_digest: &str,
        artifact: &T,
    ) -> Result<(), AppError> {
        let path = self.entry_path::<T>(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating cache directory {}", parent.display()))?;
        }

        let envelope = CacheEnvelope {
            key: key.to_string(),
            kind: T::artifact_kind().to_string(),
            source_digest: source_digest.to_string(),
            created_at: Utc::now(),
            payload: artifact,
        };
        let body = serde_json::to_vec_pretty(&envelope)?;

        let staging = path.with_extension("json.partial");
        fs::write(&staging, body)
            .with_context(|| format!("writing cache entry {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("moving cache entry into {}", path.display()))?;
        Ok(())
    }

    /// Removes an entry; returns whether one existed.
    pub fn invalidate<T: CachedArtifact>(&self, key: &str) -> Result<bool, AppError> {
        let path = self.entry_path::<T>(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Serves a valid entry, or computes, stores and returns a fresh one.
    pub fn get_or_try_insert_with<T, F>(
        &self,
        key: &str,
        source_digest: &str,
        compute: F,
    ) -> Result<T, AppError>
    where
        T: CachedArtifact,
        F: FnOnce() -> Result<T, AppError>,
    {
        if let Some(cached) = self.get::<T>(key, source_digest)? {
            debug!(key, kind = T::artifact_kind(), "serving artifact from cache");
            return Ok(cached);
        }

        let artifact = compute()?;
        self.put(key, source_digest, &artifact)?;
        Ok(artifact)
    }
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn digest_file(path: &Path) -> Result<String, AppError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192]; // 8KB buffer

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(buffer.get(..n).unwrap_or_default());
    }

    Ok(format!("{:x}", hasher.finalize()))
}
