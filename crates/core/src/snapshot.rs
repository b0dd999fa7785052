//! Build-then-swap holder for immutable snapshots
//!
//! Readers clone the current `Arc`; rebuilds construct a new value and swap
//! it in. A lazy build started by a reader runs on its own task, so a reader
//! that stops waiting does not cancel it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tracing::warn;

use crate::error::Result;

type BuildOutcome<T> = Option<Result<Arc<T>>>;

pub struct SnapshotSlot<T> {
    current: RwLock<Option<Arc<T>>>,
    rebuild: Mutex<()>,
    /// Outcome of the lazy build in flight, `None` until it finishes
    lazy: std::sync::Mutex<Option<watch::Receiver<BuildOutcome<T>>>>,
}

impl<T> Default for SnapshotSlot<T> {
    fn default() -> Self {
        Self {
            current: RwLock::new(None),
            rebuild: Mutex::new(()),
            lazy: std::sync::Mutex::new(None),
        }
    }
}

impl<T: Send + Sync + 'static> SnapshotSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<T>> {
        self.current.read().await.clone()
    }

    pub async fn swap(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.current.write().await = Some(Arc::clone(&value));
        value
    }

    /// Exclusive right to rebuild; held for the whole build
    pub async fn lock_rebuild(&self) -> MutexGuard<'_, ()> {
        self.rebuild.lock().await
    }

    /// The current snapshot, building one with `build` when none exists.
    ///
    /// At most one lazy build runs at a time; concurrent callers share it and
    /// `build` is dropped unused. Callers wait up to `wait` and get `Ok(None)`
    /// when the build has not finished by then. The build keeps running and
    /// swaps its snapshot in for later callers.
    pub async fn get_or_build<F>(self: &Arc<Self>, wait: Duration, build: F) -> Result<Option<Arc<T>>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.current().await {
            return Ok(Some(value));
        }

        let mut outcome = self.start_lazy_build(build);
        let waited = tokio::time::timeout(wait, outcome.wait_for(Option::is_some)).await;
        let finished = match waited {
            Ok(Ok(done)) => done.clone(),
            Ok(Err(_)) | Err(_) => None,
        };
        match finished {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    /// Receiver for the lazy build in flight, spawning one if there is none
    fn start_lazy_build<F>(self: &Arc<Self>, build: F) -> watch::Receiver<BuildOutcome<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut pending = self.lazy.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(outcome) = pending.as_ref() {
            // still running: not finished and the task still holds the sender
            if outcome.borrow().is_none() && outcome.has_changed().is_ok() {
                return outcome.clone();
            }
        }

        let (tx, rx) = watch::channel(None);
        *pending = Some(rx.clone());
        drop(pending);

        let slot = Arc::clone(self);
        tokio::spawn(async move {
            let result = {
                let _guard = slot.lock_rebuild().await;
                // a rebuild may have finished while we waited for the lock
                match slot.current().await {
                    Some(value) => Ok(value),
                    None => match build.await {
                        Ok(value) => Ok(slot.swap(value).await),
                        Err(e) => Err(e),
                    },
                }
            };
            if let Err(e) = &result {
                warn!(error = %e, "Lazy snapshot build failed");
            }
            tx.send_replace(Some(result));
        });
        rx
    }
}
