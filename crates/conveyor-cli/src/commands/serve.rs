//! Webhook server mode: track pushes and run the pipeline per change event.

use anyhow::{Context, Result};
use conveyor_config::parse_pipeline;
use conveyor_executor::{BuildExecutor, DockerRegistry, FsStore, GitSource, ProcessRunner};
use conveyor_orchestrator::PipelineOrchestrator;
use conveyor_tracker::{AppState, SourceTracker, router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub async fn serve(
    config_path: &str,
    repo: &str,
    addr: &str,
    secret: Option<String>,
    artifacts: &str,
) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path))?;
    let pipeline = parse_pipeline(&content)
        .with_context(|| format!("Failed to parse pipeline config: {}", config_path))?;

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

    let (tracker, mut events) = SourceTracker::channel(pipeline.watch.clone(), 100);

    // Change events run the pipeline one at a time, in arrival order.
    let definition = pipeline.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(
                sha = %event.commit.resolved_version,
                branch = %event.commit.branch,
                "Starting run for change event"
            );
            let (mut rx, handle) = orchestrator.execute(&definition, event.commit);
            while rx.recv().await.is_some() {}
            match handle.await {
                Ok(run) => {
                    info!(run_id = %run.id, success = run.state.is_success(), "Run finished");
                }
                Err(e) => {
                    error!(error = %e, "Run task failed");
                }
            }
        }
    });

    let app = router(AppState {
        tracker: Arc::new(tracker),
        webhook_secret: secret,
    });

    info!(addr = %addr, pipeline = %pipeline.name, "Listening for webhooks");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
