//! GitHub-style push webhook payload.

use serde::Deserialize;

/// The sha a provider sends for the deleted side of a ref update.
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// The subset of a push payload the tracker acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub r#ref: String,
    /// Head commit sha after the push.
    pub after: String,
    #[serde(default)]
    pub deleted: bool,
    pub repository: RepositoryInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
}

impl PushPayload {
    /// The branch name, if the pushed ref is a branch at all. Tag pushes and
    /// other refs yield `None` and are never qualifying.
    pub fn branch(&self) -> Option<&str> {
        self.r#ref.strip_prefix("refs/heads/")
    }

    /// Branch deletions arrive as pushes too; they must not start a run.
    pub fn is_delete(&self) -> bool {
        self.deleted || self.after == ZERO_SHA
    }
}
