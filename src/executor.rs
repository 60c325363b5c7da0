//! Fire-and-forget task dispatch
//!
//! The teacher crate hands background work (flush, cleanup sweeps) to a
//! `tokio::runtime::Handle` captured at construction time rather than assuming a runtime
//! is already running on the calling thread (`disk_cache.rs`'s `cleanup_handle` /
//! `sync_handle: Option<JoinHandle<()>>` fields follow the same shape). `TaskExecutor`
//! generalizes that into a small reusable wrapper used for both the write-behind flush
//! path and the delete-behind eviction path, tracking outstanding handles so
//! `shutdown()` can wait for or abort them.

use std::future::Future;

use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::warn;

/// Dispatches fire-and-forget async work onto a captured [`Handle`], and can later abort
/// or await everything still outstanding.
pub struct TaskExecutor {
    handle: Handle,
    outstanding: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskExecutor {
    /// Build an executor that dispatches onto `handle`
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            outstanding: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `task` onto the captured runtime, logging (but not propagating) a panic or
    /// cancellation. The caller never observes the task's own `Result`; errors that
    /// matter are logged from inside `task` itself.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.handle.spawn(async move {
            task.await;
        });

        let mut outstanding = self.outstanding.lock();
        outstanding.retain(|h| !h.is_finished());
        outstanding.push(handle);
    }

    /// Abort every task still outstanding. Called on manager shutdown; in-flight flushes
    /// are abandoned rather than awaited, matching `RangeCacheManager::shutdown`'s
    /// best-effort contract.
    pub fn shutdown(&self) {
        let outstanding = self.outstanding.lock();
        for handle in outstanding.iter() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }

    /// Number of tasks submitted but not yet observed to have finished. Best-effort;
    /// only refreshed on the next `submit` or `shutdown` call.
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.lock().len()
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        let outstanding = self.outstanding.lock();
        let live = outstanding.iter().filter(|h| !h.is_finished()).count();
        if live > 0 {
            warn!(count = live, "task executor dropped with outstanding work");
        }
    }
}
