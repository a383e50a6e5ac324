//! Artifact store backends.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use conveyor_core::artifact::{ArtifactKey, ArtifactRef, ArtifactStore};
use conveyor_core::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

fn relative_location(key: &ArtifactKey) -> String {
    format!("{}/{}/{}", key.run_id, key.stage, key.name)
}

/// In-memory artifact store, for tests and local dry runs.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put(&self, key: &ArtifactKey, data: Bytes) -> Result<ArtifactRef> {
        let location = relative_location(key);
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| Error::Internal("artifact store lock poisoned".to_string()))?;
        if objects.contains_key(&location) {
            return Err(Error::Artifact(format!(
                "artifact already exists: {}",
                location
            )));
        }
        let size = data.len() as u64;
        objects.insert(location.clone(), data);
        Ok(ArtifactRef {
            key: key.clone(),
            location,
            size,
            created_at: Utc::now(),
        })
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Bytes> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| Error::Internal("artifact store lock poisoned".to_string()))?;
        objects
            .get(&reference.location)
            .cloned()
            .ok_or_else(|| Error::Artifact(format!("artifact not found: {}", reference.location)))
    }
}

/// Filesystem artifact store: one file per artifact under a root directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn put(&self, key: &ArtifactKey, data: Bytes) -> Result<ArtifactRef> {
        let location = relative_location(key);
        let path = self.path_for(&location);

        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Artifact(e.to_string()))?
        {
            return Err(Error::Artifact(format!(
                "artifact already exists: {}",
                location
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Artifact(e.to_string()))?;
        }

        let size = data.len() as u64;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| Error::Artifact(e.to_string()))?;

        debug!(path = %path.display(), size, "Stored artifact");

        Ok(ArtifactRef {
            key: key.clone(),
            location,
            size,
            created_at: Utc::now(),
        })
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Bytes> {
        let path = self.path_for(&reference.location);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Artifact(format!("{}: {}", reference.location, e)))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::RunId;

    fn key(name: &str) -> ArtifactKey {
        ArtifactKey::new(RunId::new(), "Source", name)
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let key = key("source.tar");
        let reference = store.put(&key, Bytes::from_static(b"tree")).await.unwrap();
        assert_eq!(reference.size, 4);
        let data = store.get(&reference).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"tree"));
    }

    #[tokio::test]
    async fn test_memory_store_is_write_once() {
        let store = MemoryStore::new();
        let key = key("source.tar");
        store.put(&key, Bytes::from_static(b"a")).await.unwrap();
        let second = store.put(&key, Bytes::from_static(b"b")).await;
        assert!(matches!(second, Err(Error::Artifact(_))));
    }

    #[tokio::test]
    async fn test_memory_store_missing_artifact() {
        let store = MemoryStore::new();
        let key = key("missing");
        let reference = ArtifactRef {
            key: key.clone(),
            location: relative_location(&key),
            size: 0,
            created_at: Utc::now(),
        };
        assert!(store.get(&reference).await.is_err());
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("conveyor-store-{}", RunId::new()));
        let store = FsStore::new(&dir);
        let key = key("imagedefinitions.json");
        let reference = store
            .put(&key, Bytes::from_static(b"[{\"name\":\"svc\"}]"))
            .await
            .unwrap();
        let data = store.get(&reference).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"[{\"name\":\"svc\"}]"));

        // Write-once on disk too.
        assert!(store.put(&key, Bytes::from_static(b"x")).await.is_err());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
