//! Per-File Serializer (spec §4.13): at most one concurrent mutation per
//! `filepath`, with no blocking across distinct paths.
//!
//! The source expresses this as a keyed promise chain; spec §9 accepts any
//! mechanism that "serializes by key, bounded parallelism across keys". This
//! implementation keeps a per-path `tokio::sync::Mutex` in a map guarded by
//! a synchronous `std::sync::Mutex`, so acquiring a path's lock never blocks
//! unrelated paths.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct PerFileSerializer {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl PerFileSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("per-file serializer lock poisoned");
        locks.entry(path.to_string()).or_default().clone()
    }

    /// Runs `task` with exclusive access to `path`; tasks for other paths
    /// run concurrently and are not delayed by this call.
    pub async fn enqueue<F, Fut, T>(&self, path: &str, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(path);
        let _guard = lock.lock().await;
        task().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_path_tasks_run_serially() {
        let serializer = PerFileSerializer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let serializer = serializer.clone();
            let order = order.clone();
            tokio::spawn(async move {
                serializer
                    .enqueue("a.ts", || async move {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        order.lock().unwrap().push("a-start");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        order.lock().unwrap().push("a-end");
                    })
                    .await
            })
        };
        let b = {
            let serializer = serializer.clone();
            let order = order.clone();
            tokio::spawn(async move {
                serializer
                    .enqueue("a.ts", || async move {
                        order.lock().unwrap().push("b-start");
                    })
                    .await
            })
        };
        let _ = tokio::join!(a, b);
        let order = order.lock().unwrap().clone();
        // Whichever task acquires first must fully finish before the other starts.
        assert!(order == vec!["a-start", "a-end", "b-start"] || order == vec!["b-start", "a-start", "a-end"]);
    }

    #[tokio::test]
    async fn different_paths_run_concurrently() {
        let serializer = PerFileSerializer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for path in ["a.ts", "b.ts"] {
            let serializer = serializer.clone();
            let counter = counter.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                serializer
                    .enqueue(path, || async move {
                        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        counter.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
