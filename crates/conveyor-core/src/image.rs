//! Image tags, tag derivation and the image-definition manifest.

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The mutable tag every successful build also points at the new content.
pub const LATEST_TAG: &str = "latest";

/// Length of the content-derived tag prefix.
pub const COMMIT_HASH_LEN: usize = 7;

/// Filename of the manifest artifact handed to the deployment consumer.
pub const MANIFEST_NAME: &str = "imagedefinitions.json";

/// The 7-character commit hash, or `None` when the resolved version is empty
/// or too short to yield a full prefix. The input is taken exactly as
/// resolved; no normalization.
pub fn commit_hash(resolved_version: &str) -> Option<String> {
    if resolved_version.chars().count() < COMMIT_HASH_LEN {
        return None;
    }
    Some(resolved_version.chars().take(COMMIT_HASH_LEN).collect())
}

/// Derive the image tag for a resolved source version: the 7-character
/// commit hash, falling back to `latest` when there is none.
pub fn image_tag(resolved_version: &str) -> String {
    commit_hash(resolved_version).unwrap_or_else(|| LATEST_TAG.to_string())
}

/// A (repository, tag) pair addressing image content in a registry.
/// Multiple tags may reference identical content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{repository}:{tag}")]
pub struct ImageTag {
    pub repository: String,
    pub tag: String,
}

impl ImageTag {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    pub fn latest(repository: impl Into<String>) -> Self {
        Self::new(repository, LATEST_TAG)
    }

    /// The fully qualified `repository:tag` image URI.
    pub fn uri(&self) -> String {
        self.to_string()
    }
}

/// One entry of the image-definition manifest consumed downstream. The
/// `imageUri` always carries the content-derived tag, never `latest`, so the
/// deployment consumer pins an exact artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDefinition {
    pub name: String,
    #[serde(rename = "imageUri")]
    pub image_uri: String,
}

impl ImageDefinition {
    pub fn new(name: impl Into<String>, image_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_uri: image_uri.into(),
        }
    }
}

/// Serialize an image definition as the single-entry manifest array.
pub fn manifest_bytes(definition: &ImageDefinition) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&[definition])
}

/// Capability interface over a tagged container-image registry.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Authenticate to the registry. Called once, before any build step.
    async fn authenticate(&self) -> Result<()>;

    /// Push a tag. The referenced content is whatever the local image store
    /// currently holds under that tag.
    async fn push(&self, tag: &ImageTag) -> Result<()>;
}
