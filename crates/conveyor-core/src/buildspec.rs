//! Build specifications: ordered phases of typed command records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Result;

/// The three build phases, executed strictly in this order. The first
/// non-zero exit aborts the phase and the entire build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreBuild,
    Build,
    PostBuild,
}

impl Phase {
    /// Phase execution order.
    pub const ORDER: [Phase; 3] = [Phase::PreBuild, Phase::Build, Phase::PostBuild];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreBuild => "pre_build",
            Phase::Build => "build",
            Phase::PostBuild => "post_build",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed command record: program, arguments and the variables the command
/// needs bound before it may run. Interpolation of `${VAR}` placeholders
/// happens at execution time against the run's variable bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub program: String,
    pub args: Vec<String>,
    /// Variable names that must be bound before this command runs.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl CommandRecord {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            requires: Vec::new(),
        }
    }

    pub fn requiring<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names.into_iter().map(Into::into).collect();
        self
    }

    /// The command line as written, for logs and error messages.
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Outcome of one executed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a single command record against a set of variable bindings.
///
/// Keeping execution behind this trait makes phase ordering and the tag
/// derivation rule unit-testable without spawning processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        command: &CommandRecord,
        vars: &HashMap<String, String>,
    ) -> Result<CommandOutcome>;
}

/// Static build configuration: ordered commands per phase plus a fixed set
/// of environment-variable bindings. Loaded once per run, never mutated
/// during execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSpec {
    pub pre_build: Vec<CommandRecord>,
    pub build: Vec<CommandRecord>,
    pub post_build: Vec<CommandRecord>,
    /// Extra variable bindings available to every phase.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl BuildSpec {
    pub fn phase(&self, phase: Phase) -> &[CommandRecord] {
        match phase {
            Phase::PreBuild => &self.pre_build,
            Phase::Build => &self.build,
            Phase::PostBuild => &self.post_build,
        }
    }

    /// The stock Docker image BuildSpec: build one image, tag it `latest`,
    /// additionally tag the same content with the derived tag, and re-tag
    /// `latest` a second time (an observable no-op kept from the original
    /// phase sequence). Registry login, the pushes and the manifest write
    /// are executor semantics, not command records; the phase banners are
    /// carried as echo records.
    pub fn docker_image() -> Self {
        Self {
            pre_build: vec![CommandRecord::new(
                "echo",
                ["Logging in to the image registry..."],
            )],
            build: vec![
                CommandRecord::new("echo", ["Building the Docker image..."]),
                CommandRecord::new(
                    "docker",
                    ["build", "-t", "${ECR_REPOSITORY_URI}:latest", "."],
                )
                .requiring(["ECR_REPOSITORY_URI"]),
                CommandRecord::new(
                    "docker",
                    [
                        "tag",
                        "${ECR_REPOSITORY_URI}:latest",
                        "${ECR_REPOSITORY_URI}:${IMAGE_TAG}",
                    ],
                )
                .requiring(["ECR_REPOSITORY_URI", "IMAGE_TAG"]),
                // Identical to the first tag target; kept as-is.
                CommandRecord::new(
                    "docker",
                    [
                        "tag",
                        "${ECR_REPOSITORY_URI}:latest",
                        "${ECR_REPOSITORY_URI}:latest",
                    ],
                )
                .requiring(["ECR_REPOSITORY_URI"]),
            ],
            post_build: vec![CommandRecord::new(
                "echo",
                ["Pushing the Docker images..."],
            )],
            env: HashMap::new(),
        }
    }
}

/// Explicit build-time inputs for the Build Executor. No ambient process
/// environment is consulted; everything a build sees is bound here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnv {
    pub account_id: String,
    pub region: String,
    /// Fully qualified registry + repository URI.
    pub repository_uri: String,
    /// The resolved source version for this run; may be empty.
    pub resolved_source_version: String,
}

impl BuildEnv {
    /// The fixed variable bindings every phase starts from. `COMMIT_HASH`
    /// and `IMAGE_TAG` are derived and injected by the executor during
    /// pre_build.
    pub fn bindings(&self) -> HashMap<String, String> {
        HashMap::from([
            ("AWS_ACCOUNT_ID".to_string(), self.account_id.clone()),
            ("AWS_REGION".to_string(), self.region.clone()),
            (
                "ECR_REPOSITORY_URI".to_string(),
                self.repository_uri.clone(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Phase::ORDER,
            [Phase::PreBuild, Phase::Build, Phase::PostBuild]
        );
        assert_eq!(Phase::PreBuild.as_str(), "pre_build");
    }

    #[test]
    fn test_display_line() {
        let cmd = CommandRecord::new("docker", ["build", "-t", "repo:latest", "."]);
        assert_eq!(cmd.display_line(), "docker build -t repo:latest .");
        assert_eq!(CommandRecord::new("true", [] as [&str; 0]).display_line(), "true");
    }

    #[test]
    fn test_stock_docker_spec_shape() {
        let spec = BuildSpec::docker_image();
        // One build, two distinct tag targets, one redundant re-tag.
        let docker_cmds: Vec<_> = spec
            .build
            .iter()
            .filter(|c| c.program == "docker")
            .collect();
        assert_eq!(docker_cmds.len(), 3);
        assert_eq!(docker_cmds[0].args[0], "build");
        assert_eq!(docker_cmds[1].args[0], "tag");
        assert_eq!(docker_cmds[2].args[0], "tag");
        // The redundant re-tag points latest at latest.
        assert_eq!(
            docker_cmds[2].args[1..],
            [
                "${ECR_REPOSITORY_URI}:latest".to_string(),
                "${ECR_REPOSITORY_URI}:latest".to_string()
            ]
        );
    }

    #[test]
    fn test_stock_docker_spec_banners() {
        let spec = BuildSpec::docker_image();
        assert_eq!(
            spec.pre_build[0].display_line(),
            "echo Logging in to the image registry..."
        );
        assert_eq!(
            spec.build[0].display_line(),
            "echo Building the Docker image..."
        );
        assert_eq!(
            spec.post_build[0].display_line(),
            "echo Pushing the Docker images..."
        );
    }

    #[test]
    fn test_build_env_bindings() {
        let env = BuildEnv {
            account_id: "123456789012".into(),
            region: "ap-northeast-1".into(),
            repository_uri: "repo.example/app".into(),
            resolved_source_version: "abcdef1234567".into(),
        };
        let vars = env.bindings();
        assert_eq!(vars["AWS_ACCOUNT_ID"], "123456789012");
        assert_eq!(vars["AWS_REGION"], "ap-northeast-1");
        assert_eq!(vars["ECR_REPOSITORY_URI"], "repo.example/app");
        // Derived variables are injected by the executor, not here.
        assert!(!vars.contains_key("IMAGE_TAG"));
    }
}
