//! Pipeline definitions, stage descriptors and run states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::RunId;
use crate::artifact::ArtifactRef;
use crate::buildspec::{BuildEnv, BuildSpec};
use crate::image::MANIFEST_NAME;
use crate::source::{Commit, SourceWatch};

/// Name of the source-snapshot artifact a Source stage produces.
pub const SOURCE_ARTIFACT_NAME: &str = "source.tar";

/// A delivery pipeline definition. Loaded once per run and never mutated
/// during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name (e.g., "line-bot-hands-on").
    pub name: String,
    /// Service name written into the image-definition manifest.
    pub service: String,
    /// The (repository, branch) pair whose pushes trigger runs.
    pub watch: SourceWatch,
    /// Fully qualified registry + repository URI for produced images.
    pub repository_uri: String,
    /// Fixed environment-variable bindings (account id, region, extras).
    pub env: HashMap<String, String>,
    /// Build phases and commands.
    pub build: BuildSpec,
}

impl PipelineDefinition {
    /// The stage topology, fixed at definition time: an explicit ordered
    /// list with each stage's sole input being the prior stage's output.
    pub fn stages(&self) -> Vec<StageDescriptor> {
        vec![
            StageDescriptor {
                name: "Source".to_string(),
                action: StageAction::Source,
                input: None,
                output: SOURCE_ARTIFACT_NAME.to_string(),
            },
            StageDescriptor {
                name: "Build".to_string(),
                action: StageAction::Build,
                input: Some(SOURCE_ARTIFACT_NAME.to_string()),
                output: MANIFEST_NAME.to_string(),
            },
        ]
    }

    /// The explicit build-time inputs for a run at the given commit.
    pub fn build_env(&self, commit: &Commit) -> BuildEnv {
        BuildEnv {
            account_id: self.env.get("AWS_ACCOUNT_ID").cloned().unwrap_or_default(),
            region: self.env.get("AWS_REGION").cloned().unwrap_or_default(),
            repository_uri: self.repository_uri.clone(),
            resolved_source_version: commit.resolved_version.clone(),
        }
    }
}

/// A stage in the fixed linear chain: name, action and declared input/output
/// artifact references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub name: String,
    pub action: StageAction,
    /// Artifact name consumed; `None` only for the first stage.
    pub input: Option<String>,
    /// Artifact name produced for the next stage.
    pub output: String,
}

/// What a stage does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Resolve the commit and materialize the source snapshot.
    Source,
    /// Build, tag and push the image; emit the manifest.
    Build,
}

/// Overall run state. The chain is linear, so the non-terminal running state
/// carries the active stage name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No stage has started.
    Idle,
    /// The named stage is executing.
    InStage { stage: String },
    /// Every stage completed.
    Succeeded,
    /// A stage action failed; remaining stages were halted.
    Failed { stage: String, message: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Succeeded)
    }
}

/// Result of a stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub status: StageStatus,
    /// Artifact produced, if the stage completed.
    pub output: Option<ArtifactRef>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Status of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Succeeded,
    Failed { message: String },
}

/// One end-to-end pipeline execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    /// Pipeline definition name.
    pub pipeline: String,
    pub commit: Commit,
    pub state: RunState,
    pub stages: Vec<StageResult>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> PipelineDefinition {
        PipelineDefinition {
            name: "line-bot-hands-on".into(),
            service: "line-bot-hands-on".into(),
            watch: SourceWatch {
                repository: "line-bot-hands-on".into(),
                branch: "main".into(),
            },
            repository_uri: "repo.example/line-bot-hands-on".into(),
            env: HashMap::from([
                ("AWS_ACCOUNT_ID".to_string(), "123456789012".to_string()),
                ("AWS_REGION".to_string(), "ap-northeast-1".to_string()),
            ]),
            build: BuildSpec::docker_image(),
        }
    }

    #[test]
    fn test_stage_chain_is_linear() {
        let stages = definition().stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].input, None);
        // Each stage's sole input is the prior stage's output.
        assert_eq!(stages[1].input.as_deref(), Some(stages[0].output.as_str()));
    }

    #[test]
    fn test_build_env_from_definition() {
        let commit = Commit::new("abcdef1234567", "main");
        let env = definition().build_env(&commit);
        assert_eq!(env.account_id, "123456789012");
        assert_eq!(env.region, "ap-northeast-1");
        assert_eq!(env.repository_uri, "repo.example/line-bot-hands-on");
        assert_eq!(env.resolved_source_version, "abcdef1234567");
    }

    #[test]
    fn test_run_state_terminality() {
        assert!(!RunState::Idle.is_terminal());
        assert!(
            !RunState::InStage {
                stage: "Build".into()
            }
            .is_terminal()
        );
        assert!(RunState::Succeeded.is_terminal());
        assert!(
            RunState::Failed {
                stage: "Build".into(),
                message: "exit 1".into()
            }
            .is_terminal()
        );
    }
}
