//! # Cache File
//!
//! Reads and writes [`CacheSnapshot`] as pretty JSON. Writes go to a sibling
//! temp file first and are renamed into place.

use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use bodega_core::snapshot::SNAPSHOT_VERSION;
use bodega_core::CacheSnapshot;

use crate::error::{EngineError, EngineResult};

fn cache_error(path: &Path, err: impl std::fmt::Display) -> EngineError {
    EngineError::CacheFailed(format!("{}: {}", path.display(), err))
}

pub async fn write_snapshot(path: &Path, snapshot: &CacheSnapshot) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| cache_error(parent, e))?;
    }

    let json = serde_json::to_vec_pretty(snapshot).map_err(|e| cache_error(path, e))?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| cache_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| cache_error(path, e))?;

    debug!(path = %path.display(), products = snapshot.products.len(), "Cache written");
    Ok(())
}

/// Reads a snapshot. A missing file is `Ok(None)`.
pub async fn read_snapshot(path: &Path) -> EngineResult<Option<CacheSnapshot>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No cache file yet");
            return Ok(None);
        }
        Err(e) => return Err(cache_error(path, e)),
    };

    let snapshot: CacheSnapshot =
        serde_json::from_slice(&bytes).map_err(|e| cache_error(path, e))?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(EngineError::UnsupportedCacheVersion(snapshot.version));
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_core::{DomainState, Product};

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut state = DomainState::new();
        state.catalog.upsert(Product::new("p-1", "Polar"));
        let (snapshot, skipped) = CacheSnapshot::from_state(&state);
        assert_eq!(skipped, 0);

        write_snapshot(&path, &snapshot).await.unwrap();
        assert!(!path.with_extension("tmp").exists());

        let read = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(read.products.len(), 1);
    }

    #[tokio::test]
    async fn test_newer_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version": 99}"#).unwrap();

        assert!(matches!(
            read_snapshot(&path).await,
            Err(EngineError::UnsupportedCacheVersion(99))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            read_snapshot(&path).await,
            Err(EngineError::CacheFailed(_))
        ));
    }
}
