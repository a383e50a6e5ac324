//! Source types: commits, source watches and the snapshot provider.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A resolved source version on a tracked branch. Exactly one per pipeline
/// run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The resolved source version (full commit SHA). May be empty when
    /// resolution yielded nothing; tag derivation falls back to `latest`.
    pub resolved_version: String,
    /// The branch the commit was pushed to.
    pub branch: String,
}

impl Commit {
    pub fn new(resolved_version: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            resolved_version: resolved_version.into(),
            branch: branch.into(),
        }
    }
}

/// The (repository, branch) pair a tracker watches. One pipeline execution
/// starts per qualifying push to this pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWatch {
    pub repository: String,
    pub branch: String,
}

/// A qualifying change on a watched source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub commit: Commit,
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(commit: Commit) -> Self {
        Self {
            commit,
            received_at: Utc::now(),
        }
    }
}

/// Resolves commits and materializes immutable source snapshots.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Resolve the tracked location to a concrete commit.
    async fn resolve(&self) -> Result<Commit>;

    /// Materialize a snapshot of the source tree at the given commit.
    async fn snapshot(&self, commit: &Commit) -> Result<Bytes>;
}
