use serde::{de::DeserializeOwned, Serialize};
pub mod page_details;
pub mod source_document;
pub mod text_chunk;
pub mod text_unit;

/// A derived artifact that can be memoised in the artifact cache.
///
/// The kind names the file an artifact is stored under, next to the
/// document key, so two artifacts of the same document never collide.
pub trait CachedArtifact: Serialize + DeserializeOwned {
    fn artifact_kind() -> &'static str;
}
