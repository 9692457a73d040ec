//! Per-output-path locks for serialized artifact writes.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per output artifact path.
#[derive(Debug, Default)]
pub struct OutputLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl OutputLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `path`. The lock is released on drop.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&*self.locks.entry(path.to_path_buf()).or_default());
        lock.lock_owned().await
    }

    /// Number of paths that have been locked at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no path has been locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let locks = Arc::new(OutputLocks::new());
        let guard = locks.acquire(Path::new("/out/a.xlsx")).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(Path::new("/out/a.xlsx")).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let locks = OutputLocks::new();
        let _a = locks.acquire(Path::new("/out/a.xlsx")).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(Path::new("/out/b.xlsx")),
        )
        .await
        .unwrap();
        assert_eq!(locks.len(), 2);
    }
}
