//! Git-backed source provider.

use async_trait::async_trait;
use bytes::Bytes;
use conveyor_core::source::{Commit, SourceProvider};
use conveyor_core::{Error, Result};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Resolves commits and snapshots a local git checkout.
pub struct GitSource {
    repo: PathBuf,
}

impl GitSource {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    async fn run_git(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .await
            .map_err(|e| Error::SourceResolution(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::SourceResolution(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SourceProvider for GitSource {
    async fn resolve(&self) -> Result<Commit> {
        let sha = String::from_utf8_lossy(&self.run_git(&["rev-parse", "HEAD"]).await?)
            .trim()
            .to_string();
        let branch =
            String::from_utf8_lossy(&self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?)
                .trim()
                .to_string();

        debug!(sha = %sha, branch = %branch, "Resolved source version");
        Ok(Commit::new(sha, branch))
    }

    async fn snapshot(&self, commit: &Commit) -> Result<Bytes> {
        let treeish = if commit.resolved_version.is_empty() {
            "HEAD"
        } else {
            commit.resolved_version.as_str()
        };
        let tar = self
            .run_git(&["archive", "--format=tar", treeish])
            .await?;
        Ok(Bytes::from(tar))
    }
}
