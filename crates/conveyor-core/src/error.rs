//! Error types for Conveyor.
//!
//! Every variant is fatal to the current run; nothing here is retried
//! automatically. Recovery is an external re-trigger of the whole pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("registry authentication failed: {0}")]
    Authentication(String),

    #[error("command failed: {command} (exit code {exit_code})")]
    Build { command: String, exit_code: i32 },

    #[error("push failed for {tag}: {message}")]
    Push { tag: String, message: String },

    #[error("source resolution failed: {0}")]
    SourceResolution(String),

    #[error("artifact store error: {0}")]
    Artifact(String),

    #[error("variable {name} required by {command} is not bound")]
    UnboundVariable { name: String, command: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
