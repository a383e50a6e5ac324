//! Push filtering and change-event emission.

use conveyor_core::source::{ChangeEvent, Commit, SourceWatch};
use conveyor_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::payload::PushPayload;

/// Watches one (repository, branch) pair. Every qualifying push becomes
/// exactly one change event on the channel; everything else is dropped with
/// a log line.
pub struct SourceTracker {
    watch: SourceWatch,
    tx: mpsc::Sender<ChangeEvent>,
}

impl SourceTracker {
    pub fn new(watch: SourceWatch, tx: mpsc::Sender<ChangeEvent>) -> Self {
        Self { watch, tx }
    }

    /// Convenience constructor returning the receiving half alongside.
    pub fn channel(watch: SourceWatch, capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(watch, tx), rx)
    }

    pub fn watch(&self) -> &SourceWatch {
        &self.watch
    }

    /// Decide whether a push qualifies. Pushes to other repositories or
    /// branches, tag pushes and branch deletions never start a run.
    pub fn evaluate(&self, payload: &PushPayload) -> Option<ChangeEvent> {
        let Some(branch) = payload.branch() else {
            info!(r#ref = %payload.r#ref, "Ignoring non-branch push");
            return None;
        };
        if payload.repository.full_name != self.watch.repository {
            info!(
                repo = %payload.repository.full_name,
                "Push for untracked repository"
            );
            return None;
        }
        if branch != self.watch.branch {
            info!(branch = %branch, "Push to untracked branch");
            return None;
        }
        if payload.is_delete() {
            info!(branch = %branch, "Ignoring branch deletion");
            return None;
        }
        Some(ChangeEvent::new(Commit::new(&payload.after, branch)))
    }

    /// Evaluate a push and emit the change event if it qualifies. Returns
    /// whether an event was emitted.
    pub async fn ingest(&self, payload: &PushPayload) -> Result<bool> {
        match self.evaluate(payload) {
            Some(event) => {
                info!(
                    sha = %event.commit.resolved_version,
                    branch = %event.commit.branch,
                    "Qualifying push, emitting change event"
                );
                self.tx
                    .send(event)
                    .await
                    .map_err(|_| Error::Internal("change event channel closed".to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
