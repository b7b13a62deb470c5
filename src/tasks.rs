//! Tracked background work
//!
//! Fire-and-forget notifications are submitted here instead of being
//! detached, so each batch can wait for them and report how they ended.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome counts of drained tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub completed: usize,
    pub failed: usize,
}

/// Set of in-flight background tasks
#[derive(Default)]
pub struct TaskTracker {
    tasks: Mutex<JoinSet<(String, crate::Result<()>)>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `fut` in the background under `name`
    pub async fn submit<F>(&self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = crate::Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "Submitting background task");
        self.tasks.lock().await.spawn(async move { (name, fut.await) });
    }

    /// Number of tasks not yet drained
    pub async fn pending(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait for every submitted task and report the outcomes
    pub async fn drain(&self) -> TaskReport {
        let mut set = std::mem::take(&mut *self.tasks.lock().await);
        let mut report = TaskReport::default();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.completed += 1,
                Ok((name, Err(e))) => {
                    warn!(task = %name, "Background task failed: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Background task panicked or was cancelled: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
