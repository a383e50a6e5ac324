//! Pipeline orchestration - runs the fixed Source then Build chain for one
//! pipeline definition, fail-fast.

pub mod orchestrator;

pub use orchestrator::{PipelineEvent, PipelineOrchestrator, validate_chain};
