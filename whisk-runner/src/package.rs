//! Code package persistence
//!
//! A run saves its code package once; every task of that run reuses the same
//! url/sha pair. The cache is keyed by run id so a long-lived process serving
//! several runs never hands one run's package to another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use whisk_core::domain::datastore::PackageRef;

use crate::error::PackageError;

/// Datastore contract for saving a code package blob
#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn save(&self, blob: Vec<u8>) -> Result<PackageRef, PackageError>;
}

/// Package references memoized per run id
#[derive(Default)]
pub struct PackageCache {
    runs: Mutex<HashMap<String, Arc<OnceCell<PackageRef>>>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the package for `run_id`, saving `blob` on first use
    ///
    /// Concurrent callers for the same run wait for the single in-flight save.
    /// A failed save is not cached, so the next caller tries again.
    pub async fn get_or_save(
        &self,
        run_id: &str,
        store: &dyn PackageStore,
        blob: impl FnOnce() -> Vec<u8>,
    ) -> Result<PackageRef, PackageError> {
        let cell = self.cell(run_id)?;

        if let Some(package) = cell.get() {
            debug!("Reusing code package for run {}", run_id);
            return Ok(package.clone());
        }

        let package = cell
            .get_or_try_init(|| async move {
                let package = store.save(blob()).await?;
                info!("Saved code package for run {} at {}", run_id, package.url);
                Ok::<_, PackageError>(package)
            })
            .await?;

        Ok(package.clone())
    }

    /// Cached package for `run_id`, if one was saved
    pub fn get(&self, run_id: &str) -> Option<PackageRef> {
        let runs = self.runs.lock().ok()?;
        runs.get(run_id).and_then(|cell| cell.get().cloned())
    }

    /// Forgets the package of a finished run
    pub fn evict(&self, run_id: &str) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.remove(run_id);
        }
    }

    fn cell(&self, run_id: &str) -> Result<Arc<OnceCell<PackageRef>>, PackageError> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| PackageError("package cache lock poisoned".to_string()))?;
        Ok(Arc::clone(runs.entry(run_id.to_string()).or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingStore {
        saves: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl PackageStore for CountingStore {
        async fn save(&self, blob: Vec<u8>) -> Result<PackageRef, PackageError> {
            let n = self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PackageError("bucket unavailable".to_string()));
            }
            Ok(PackageRef {
                url: format!("s3://bucket/pkg-{}", n),
                sha: format!("sha-{}", blob.len()),
            })
        }
    }

    #[tokio::test]
    async fn test_saves_once_per_run() {
        let cache = PackageCache::new();
        let store = CountingStore::default();

        let first = cache.get_or_save("run-1", &store, || b"abc".to_vec()).await.unwrap();
        let second = cache.get_or_save("run-1", &store, || b"abcdef".to_vec()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.sha, "sha-3");
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("run-1"), Some(first));
    }

    #[tokio::test]
    async fn test_runs_do_not_share_packages() {
        let cache = PackageCache::new();
        let store = CountingStore::default();

        let a = cache.get_or_save("run-a", &store, Vec::new).await.unwrap();
        let b = cache.get_or_save("run-b", &store, Vec::new).await.unwrap();

        assert_ne!(a.url, b.url);
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);

        cache.evict("run-a");
        assert!(cache.get("run-a").is_none());
        assert!(cache.get("run-b").is_some());
    }

    #[tokio::test]
    async fn test_failed_save_is_not_cached() {
        let cache = PackageCache::new();
        let store = CountingStore {
            fail: true,
            ..Default::default()
        };

        assert!(cache.get_or_save("run-1", &store, Vec::new).await.is_err());
        assert!(cache.get_or_save("run-1", &store, Vec::new).await.is_err());
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
        assert!(cache.get("run-1").is_none());
    }
}
