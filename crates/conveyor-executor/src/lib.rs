//! Build execution for Conveyor.
//!
//! Provides the Build Executor and its collaborators:
//! - Phase semantics (pre_build auth + tag derivation, build, post_build
//!   pushes + manifest)
//! - Process-backed command runner
//! - Docker registry client (bollard)
//! - Artifact store backends (in-memory, filesystem)
//! - Git source provider

pub mod build;
pub mod docker;
pub mod git;
pub mod runner;
pub mod store;

pub use build::{BuildExecutor, BuildOutput};
pub use docker::DockerRegistry;
pub use git::GitSource;
pub use runner::ProcessRunner;
pub use store::{FsStore, MemoryStore};
