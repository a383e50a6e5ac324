//! One-shot local pipeline execution.

use anyhow::{Context, Result};
use conveyor_config::parse_pipeline;
use conveyor_core::pipeline::StageStatus;
use conveyor_core::source::Commit;
use conveyor_executor::{BuildExecutor, DockerRegistry, FsStore, GitSource, ProcessRunner};
use conveyor_orchestrator::{PipelineEvent, PipelineOrchestrator};
use std::sync::Arc;

/// Run the pipeline once against a local repository.
pub async fn run_local(
    config_path: &str,
    repo: &str,
    sha: Option<String>,
    artifacts: &str,
) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;
    let pipeline = parse_pipeline(&content)
        .with_context(|| format!("Failed to parse pipeline config: {}", config_path))?;

    println!("Running pipeline: {}", pipeline.name);

    let repo = std::path::Path::new(repo)
        .canonicalize()
        .context("Failed to resolve repository path")?;

    let registry = DockerRegistry::new().context("Failed to connect to Docker")?;
    let store = Arc::new(FsStore::new(artifacts));
    let executor = Arc::new(BuildExecutor::new(
        Arc::new(ProcessRunner::new(&repo)),
        Arc::new(registry),
        store.clone(),
    ));
    let orchestrator =
        PipelineOrchestrator::new(Arc::new(GitSource::new(&repo)), executor, store);

    // An explicit sha pins the run; otherwise the source stage resolves the
    // repository head.
    let commit = Commit::new(sha.unwrap_or_default(), &pipeline.watch.branch);

    let (mut rx, result_handle) = orchestrator.execute(&pipeline, commit);

    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::RunStarted { run_id, commit } => {
                println!(
                    "--- Run {} started (commit: {}) ---\n",
                    run_id,
                    if commit.resolved_version.is_empty() {
                        "HEAD"
                    } else {
                        &commit.resolved_version
                    }
                );
            }
            PipelineEvent::StageStarted { stage } => {
                println!("▶ Stage '{}' started", stage);
            }
            PipelineEvent::StageCompleted { stage, success } => {
                if success {
                    println!("✓ Stage '{}' completed successfully\n", stage);
                } else {
                    println!("✗ Stage '{}' failed\n", stage);
                }
            }
            PipelineEvent::RunCompleted { success } => {
                if success {
                    println!("--- Run completed successfully ---");
                } else {
                    println!("--- Run failed ---");
                }
            }
        }
    }

    let run = result_handle.await.context("Run task failed")?;

    println!("\n--- Stage Summary ---");
    for stage in &run.stages {
        match &stage.status {
            StageStatus::Succeeded => println!("  {} - ✓ succeeded", stage.name),
            StageStatus::Failed { message } => {
                println!("  {} - ✗ failed: {}", stage.name, message)
            }
        }
    }

    if run.state.is_success() {
        println!("\n✓ Run succeeded!");
        Ok(())
    } else {
        anyhow::bail!("Run failed");
    }
}
