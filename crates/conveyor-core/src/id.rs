//! Run identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run. UUIDv7, so freshly minted ids sort by
/// creation time and artifact locations group per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_render_as_uuids() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a.to_string()).is_ok());
    }
}
