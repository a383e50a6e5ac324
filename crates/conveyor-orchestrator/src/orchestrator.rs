//! Pipeline orchestrator - executes the stage chain strictly in order.

use chrono::Utc;
use conveyor_core::artifact::{ArtifactKey, ArtifactRef, ArtifactStore};
use conveyor_core::pipeline::{
    PipelineDefinition, PipelineRun, RunState, StageAction, StageDescriptor, StageResult,
    StageStatus,
};
use conveyor_core::source::{Commit, SourceProvider};
use conveyor_core::{Error, Result, RunId};
use conveyor_executor::BuildExecutor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Event emitted while a run executes.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted { run_id: RunId, commit: Commit },
    StageStarted { stage: String },
    StageCompleted { stage: String, success: bool },
    RunCompleted { success: bool },
}

/// Every stage's declared input must be the prior stage's output. The chain
/// is fixed at definition time, so a mismatch is a definition bug.
pub fn validate_chain(stages: &[StageDescriptor]) -> Result<()> {
    match stages.first() {
        None => return Err(Error::Internal("pipeline has no stages".to_string())),
        Some(first) if first.input.is_some() => {
            return Err(Error::Internal(format!(
                "first stage '{}' declares an input but nothing precedes it",
                first.name
            )));
        }
        Some(_) => {}
    }
    for pair in stages.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.input.as_deref() != Some(prev.output.as_str()) {
            return Err(Error::Internal(format!(
                "stage '{}' expects input {:?} but '{}' produces '{}'",
                next.name, next.input, prev.name, prev.output
            )));
        }
    }
    Ok(())
}

/// Drives one pipeline run through its stages in order. The first stage
/// failure halts everything after it; there is no retry and no partial
/// re-execution.
pub struct PipelineOrchestrator {
    source: Arc<dyn SourceProvider>,
    executor: Arc<BuildExecutor>,
    store: Arc<dyn ArtifactStore>,
}

impl PipelineOrchestrator {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        executor: Arc<BuildExecutor>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            source,
            executor,
            store,
        }
    }

    /// Execute one run, returning a channel of events and a handle resolving
    /// to the final run record.
    pub fn execute(
        &self,
        definition: &PipelineDefinition,
        commit: Commit,
    ) -> (
        mpsc::Receiver<PipelineEvent>,
        tokio::task::JoinHandle<PipelineRun>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let source = self.source.clone();
        let executor = self.executor.clone();
        let store = self.store.clone();
        let definition = definition.clone();

        let handle = tokio::spawn(async move {
            Self::execute_inner(source, executor, store, definition, commit, tx).await
        });

        (rx, handle)
    }

    async fn execute_inner(
        source: Arc<dyn SourceProvider>,
        executor: Arc<BuildExecutor>,
        store: Arc<dyn ArtifactStore>,
        definition: PipelineDefinition,
        mut commit: Commit,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> PipelineRun {
        let run_id = RunId::new();
        let created_at = Utc::now();
        let mut run = PipelineRun {
            id: run_id,
            pipeline: definition.name.clone(),
            commit: commit.clone(),
            state: RunState::Idle,
            stages: Vec::new(),
            created_at,
            finished_at: None,
        };

        let stages = definition.stages();
        if let Err(e) = validate_chain(&stages) {
            error!(pipeline = %definition.name, error = %e, "Invalid stage chain");
            run.state = RunState::Failed {
                stage: "Source".to_string(),
                message: e.to_string(),
            };
            run.finished_at = Some(Utc::now());
            let _ = tx.send(PipelineEvent::RunCompleted { success: false }).await;
            return run;
        }

        let _ = tx
            .send(PipelineEvent::RunStarted {
                run_id,
                commit: commit.clone(),
            })
            .await;

        // The chain is linear: each stage consumes the prior stage's output.
        let mut prior_output: Option<ArtifactRef> = None;

        for stage in &stages {
            run.state = RunState::InStage {
                stage: stage.name.clone(),
            };
            let _ = tx
                .send(PipelineEvent::StageStarted {
                    stage: stage.name.clone(),
                })
                .await;
            let started_at = Utc::now();

            let outcome = Self::execute_stage(
                &source,
                &executor,
                &store,
                &definition,
                run_id,
                stage,
                &mut commit,
                prior_output.as_ref(),
            )
            .await;

            match outcome {
                Ok(output) => {
                    info!(stage = %stage.name, "Stage completed successfully");
                    run.stages.push(StageResult {
                        name: stage.name.clone(),
                        status: StageStatus::Succeeded,
                        output: Some(output.clone()),
                        started_at,
                        finished_at: Utc::now(),
                    });
                    prior_output = Some(output);
                    let _ = tx
                        .send(PipelineEvent::StageCompleted {
                            stage: stage.name.clone(),
                            success: true,
                        })
                        .await;
                }
                Err(e) => {
                    error!(stage = %stage.name, error = %e, "Stage failed");
                    run.stages.push(StageResult {
                        name: stage.name.clone(),
                        status: StageStatus::Failed {
                            message: e.to_string(),
                        },
                        output: None,
                        started_at,
                        finished_at: Utc::now(),
                    });
                    run.state = RunState::Failed {
                        stage: stage.name.clone(),
                        message: e.to_string(),
                    };
                    let _ = tx
                        .send(PipelineEvent::StageCompleted {
                            stage: stage.name.clone(),
                            success: false,
                        })
                        .await;
                    // Fail fast: remaining stages never start.
                    break;
                }
            }
        }

        if !matches!(run.state, RunState::Failed { .. }) {
            run.state = RunState::Succeeded;
        }
        run.commit = commit;
        run.finished_at = Some(Utc::now());

        let _ = tx
            .send(PipelineEvent::RunCompleted {
                success: run.state.is_success(),
            })
            .await;

        run
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_stage(
        source: &Arc<dyn SourceProvider>,
        executor: &Arc<BuildExecutor>,
        store: &Arc<dyn ArtifactStore>,
        definition: &PipelineDefinition,
        run_id: RunId,
        stage: &StageDescriptor,
        commit: &mut Commit,
        prior_output: Option<&ArtifactRef>,
    ) -> Result<ArtifactRef> {
        match stage.action {
            StageAction::Source => {
                // A change event may arrive without a resolved version, e.g.
                // a manually started run. Resolve it here so tag derivation
                // downstream sees the real commit.
                if commit.resolved_version.is_empty() {
                    *commit = source.resolve().await?;
                }
                let snapshot = source.snapshot(commit).await?;
                let key = ArtifactKey::new(run_id, &stage.name, &stage.output);
                store.put(&key, snapshot).await
            }
            StageAction::Build => {
                let input = prior_output.ok_or_else(|| {
                    Error::Internal(format!("stage '{}' has no input artifact", stage.name))
                })?;
                let env = definition.build_env(commit);
                let output = executor
                    .execute(run_id, &definition.service, input, &definition.build, &env)
                    .await?;
                Ok(output.manifest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use conveyor_core::buildspec::{CommandOutcome, CommandRecord, CommandRunner};
    use conveyor_core::image::{ImageRegistry, ImageTag};
    use conveyor_core::pipeline::SOURCE_ARTIFACT_NAME;
    use conveyor_core::source::SourceWatch;
    use conveyor_executor::MemoryStore;
    use std::collections::HashMap;

    struct FakeSource {
        fail_snapshot: bool,
    }

    #[async_trait]
    impl SourceProvider for FakeSource {
        async fn resolve(&self) -> conveyor_core::Result<Commit> {
            Ok(Commit::new("abcdef1234567", "main"))
        }

        async fn snapshot(&self, _commit: &Commit) -> conveyor_core::Result<Bytes> {
            if self.fail_snapshot {
                return Err(Error::SourceResolution("repository unreachable".into()));
            }
            Ok(Bytes::from_static(b"tree"))
        }
    }

    struct OkRunner;

    #[async_trait]
    impl CommandRunner for OkRunner {
        async fn run(
            &self,
            _command: &CommandRecord,
            _vars: &HashMap<String, String>,
        ) -> conveyor_core::Result<CommandOutcome> {
            Ok(CommandOutcome {
                exit_code: 0,
                output: String::new(),
            })
        }
    }

    struct FakeRegistry {
        fail_auth: bool,
    }

    #[async_trait]
    impl ImageRegistry for FakeRegistry {
        async fn authenticate(&self) -> conveyor_core::Result<()> {
            if self.fail_auth {
                return Err(Error::Authentication("token expired".into()));
            }
            Ok(())
        }

        async fn push(&self, _tag: &ImageTag) -> conveyor_core::Result<()> {
            Ok(())
        }
    }

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
            build: conveyor_core::buildspec::BuildSpec::docker_image(),
        }
    }

    fn orchestrator(fail_snapshot: bool, fail_auth: bool) -> PipelineOrchestrator {
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new());
        let executor = Arc::new(BuildExecutor::new(
            Arc::new(OkRunner),
            Arc::new(FakeRegistry { fail_auth }),
            store.clone(),
        ));
        PipelineOrchestrator::new(Arc::new(FakeSource { fail_snapshot }), executor, store)
    }

    async fn drain(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_successful_run_executes_stages_in_order() {
        let orch = orchestrator(false, false);
        let (rx, handle) = orch.execute(&definition(), Commit::new("abcdef1234567", "main"));

        let events = drain(rx).await;
        let run = handle.await.unwrap();

        assert!(run.state.is_success());
        assert_eq!(run.stages.len(), 2);
        assert_eq!(run.stages[0].name, "Source");
        assert_eq!(run.stages[1].name, "Build");
        assert!(run.finished_at.is_some());

        let stage_events: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageStarted { stage } => Some(format!("start {stage}")),
                PipelineEvent::StageCompleted { stage, success } => {
                    Some(format!("done {stage} {success}"))
                }
                _ => None,
            })
            .collect();
        // Build starts only after Source completed.
        assert_eq!(
            stage_events,
            [
                "start Source",
                "done Source true",
                "start Build",
                "done Build true"
            ]
        );
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::RunCompleted { success: true })
        ));
    }

    #[tokio::test]
    async fn test_source_failure_halts_the_run() {
        let orch = orchestrator(true, false);
        let (rx, handle) = orch.execute(&definition(), Commit::new("abcdef1234567", "main"));

        let events = drain(rx).await;
        let run = handle.await.unwrap();

        assert!(matches!(
            &run.state,
            RunState::Failed { stage, .. } if stage == "Source"
        ));
        // Build was never attempted.
        assert_eq!(run.stages.len(), 1);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, PipelineEvent::StageStarted { stage } if stage == "Build"))
        );
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::RunCompleted { success: false })
        ));
    }

    #[tokio::test]
    async fn test_build_failure_marks_the_run_failed() {
        let orch = orchestrator(false, true);
        let (rx, handle) = orch.execute(&definition(), Commit::new("abcdef1234567", "main"));

        drain(rx).await;
        let run = handle.await.unwrap();

        assert!(matches!(
            &run.state,
            RunState::Failed { stage, .. } if stage == "Build"
        ));
        assert_eq!(run.stages.len(), 2);
        assert_eq!(run.stages[0].status, StageStatus::Succeeded);
        assert!(matches!(run.stages[1].status, StageStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unresolved_commit_is_resolved_by_the_source_stage() {
        let orch = orchestrator(false, false);
        let (rx, handle) = orch.execute(&definition(), Commit::new("", "main"));

        drain(rx).await;
        let run = handle.await.unwrap();

        assert!(run.state.is_success());
        assert_eq!(run.commit.resolved_version, "abcdef1234567");
    }

    #[tokio::test]
    async fn test_source_stage_produces_the_snapshot_artifact() {
        let orch = orchestrator(false, false);
        let (rx, handle) = orch.execute(&definition(), Commit::new("abcdef1234567", "main"));

        drain(rx).await;
        let run = handle.await.unwrap();

        let source_output = run.stages[0].output.as_ref().unwrap();
        assert!(source_output.key.name == SOURCE_ARTIFACT_NAME);
        let manifest_output = run.stages[1].output.as_ref().unwrap();
        assert_eq!(manifest_output.key.name, "imagedefinitions.json");
    }

    #[test]
    fn test_validate_chain_rejects_broken_links() {
        let mut stages = definition().stages();
        assert!(validate_chain(&stages).is_ok());

        stages[1].input = Some("wrong.tar".to_string());
        assert!(validate_chain(&stages).is_err());

        stages[0].input = Some("ghost".to_string());
        assert!(validate_chain(&stages).is_err());

        assert!(validate_chain(&[]).is_err());
    }
}
