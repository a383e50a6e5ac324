//! Artifact storage abstraction.
//!
//! Artifacts are immutable, versioned units passed between stages: a stage
//! writes its output once, the next stage reads it, nothing ever edits an
//! earlier stage's artifact.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, RunId};

/// Key for storing an artifact: one artifact per (run, stage, name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub run_id: RunId,
    pub stage: String,
    pub name: String,
}

impl ArtifactKey {
    pub fn new(run_id: RunId, stage: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            run_id,
            stage: stage.into(),
            name: name.into(),
        }
    }
}

/// Reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub key: ArtifactKey,
    /// Storage location (backend-specific).
    pub location: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Capability interface for durable, versioned artifact storage. Retention
/// and lifecycle are owned by the surrounding environment, not by pipeline
/// logic.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store an artifact. Artifacts are write-once: storing twice under the
    /// same key is an error.
    async fn put(&self, key: &ArtifactKey, data: Bytes) -> Result<ArtifactRef>;

    /// Retrieve an artifact by reference.
    async fn get(&self, reference: &ArtifactRef) -> Result<Bytes>;
}
