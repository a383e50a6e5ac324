//! Source tracking for Conveyor.
//!
//! Ingests push webhooks from the Git provider, filters them against the
//! tracked (repository, branch) pair and emits one change event per
//! qualifying push. There is no polling; detection is event-driven.

pub mod payload;
pub mod routes;
pub mod tracker;

pub use payload::PushPayload;
pub use routes::{AppState, router};
pub use tracker::SourceTracker;
