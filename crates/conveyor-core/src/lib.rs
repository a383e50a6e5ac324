//! Core domain types and traits for the Conveyor delivery pipeline.
//!
//! This crate contains:
//! - Run identifiers and common types
//! - Commit and source-watch types, the `SourceProvider` trait
//! - BuildSpec phases and typed command records, the `CommandRunner` trait
//! - Image tags, the image-definition manifest and the `ImageRegistry` trait
//! - Artifact types and the `ArtifactStore` trait
//! - Pipeline definitions, stage descriptors and run states

pub mod artifact;
pub mod buildspec;
pub mod error;
pub mod id;
pub mod image;
pub mod pipeline;
pub mod source;

pub use error::{Error, Result};
pub use id::RunId;
