//! The Build Executor: phase semantics, tag derivation wiring and manifest
//! production.

use bytes::Bytes;
use conveyor_core::artifact::{ArtifactKey, ArtifactRef, ArtifactStore};
use conveyor_core::buildspec::{BuildEnv, BuildSpec, CommandRunner, Phase};
use conveyor_core::image::{
    ImageDefinition, ImageRegistry, ImageTag, MANIFEST_NAME, image_tag, manifest_bytes,
};
use conveyor_core::{Error, Result, RunId};
use std::sync::Arc;
use tracing::{error, info};

/// Result of a successful build: the manifest artifact and the two tags now
/// referencing the built content.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: ArtifactRef,
    pub definition: ImageDefinition,
    /// `latest` first, the content-derived tag second.
    pub tags: [ImageTag; 2],
}

/// Executes one build: runs the spec's phases strictly in order, pushes both
/// tags, and publishes the image-definition manifest. The first failing
/// action aborts everything after it; no partial artifact is ever published.
pub struct BuildExecutor {
    runner: Arc<dyn CommandRunner>,
    registry: Arc<dyn ImageRegistry>,
    store: Arc<dyn ArtifactStore>,
}

impl BuildExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        registry: Arc<dyn ImageRegistry>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            runner,
            registry,
            store,
        }
    }

    /// Run the build for one source artifact. All build-time inputs come in
    /// through `env`; nothing is read from the ambient process environment.
    pub async fn execute(
        &self,
        run_id: RunId,
        service: &str,
        source: &ArtifactRef,
        spec: &BuildSpec,
        env: &BuildEnv,
    ) -> Result<BuildOutput> {
        // The build consumes the prior stage's output; refuse to start
        // without it.
        self.store.get(source).await?;

        // pre_build: registry login, then tag derivation. Both derived
        // variables carry the same value: the 7-char commit hash, or
        // "latest" when the resolved version is empty or too short.
        self.registry.authenticate().await?;
        let tag = image_tag(&env.resolved_source_version);
        let mut vars = env.bindings();
        vars.extend(spec.env.clone());
        vars.insert("COMMIT_HASH".to_string(), tag.clone());
        vars.insert("IMAGE_TAG".to_string(), tag.clone());

        info!(image_tag = %tag, "Starting build");

        for phase in Phase::ORDER {
            self.run_phase(phase, spec, &vars).await?;
        }

        // Both pushes must succeed for the build to report success.
        let latest = ImageTag::latest(&env.repository_uri);
        let pinned = ImageTag::new(&env.repository_uri, &tag);
        self.registry.push(&latest).await?;
        self.registry.push(&pinned).await?;

        // The manifest pins the content-derived tag, never "latest", and is
        // only written once everything before it succeeded.
        let definition = ImageDefinition::new(service, pinned.uri());
        let data = manifest_bytes(&definition).map_err(|e| Error::Internal(e.to_string()))?;
        let key = ArtifactKey::new(run_id, "Build", MANIFEST_NAME);
        let manifest = self.store.put(&key, Bytes::from(data)).await?;

        info!(image = %pinned, "Build complete");

        Ok(BuildOutput {
            manifest,
            definition,
            tags: [latest, pinned],
        })
    }

    async fn run_phase(
        &self,
        phase: Phase,
        spec: &BuildSpec,
        vars: &std::collections::HashMap<String, String>,
    ) -> Result<()> {
        for command in spec.phase(phase) {
            for name in &command.requires {
                if !vars.contains_key(name) {
                    return Err(Error::UnboundVariable {
                        name: name.clone(),
                        command: command.display_line(),
                    });
                }
            }

            let outcome = self.runner.run(command, vars).await?;
            if !outcome.is_success() {
                error!(
                    phase = %phase,
                    command = %command.display_line(),
                    exit_code = outcome.exit_code,
                    "Command failed"
                );
                return Err(Error::Build {
                    command: command.display_line(),
                    exit_code: outcome.exit_code,
                });
            }
        }
        Ok(())
    }
}
