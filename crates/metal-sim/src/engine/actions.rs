//! Background provisioning actions.
//!
//! Actions run on a [`TaskTracker`] so callers can wait for them instead of
//! polling. An action never borrows a lock from the operation that launched
//! it: it takes the exclusive lock itself when it runs.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::Engine;
use crate::models::{CachedPowerStatus, PowerState, ServerLockStatus, ServerPowerStatus};

/// Launches fire-and-forget background actions.
#[derive(Debug, Clone, Default)]
pub struct ActionScheduler {
    tracker: TaskTracker,
}

impl ActionScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch an action. Must be called from within a Tokio runtime.
    pub fn start<F>(&self, action: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(action, "Starting background action");
        self.tracker.spawn(task);
    }

    /// Number of running actions.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until no action is running.
    ///
    /// Actions launched by a running action are tracked too, so a chained
    /// follow-up is awaited as well.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Engine {
    /// Run an OS install: apply the image, then release the server lock in a
    /// follow-up action.
    pub(super) fn start_os_install(&self, server_id: String, os_image_id: String) {
        let store = Arc::clone(&self.store);
        let actions = self.actions.clone();

        self.actions.start("os_install", async move {
            tokio::task::yield_now().await;

            let installing = {
                let store = store.read().await;
                store
                    .server(&server_id)
                    .is_ok_and(|r| r.server.lock_status == Some(ServerLockStatus::OsInstall))
            };
            if !installing {
                warn!(server_id = %server_id, "OS install lock vanished before install step");
                return;
            }
            info!(server_id = %server_id, os_image_id = %os_image_id, "Installing OS image");

            actions.start("os_install_finish", async move {
                tokio::task::yield_now().await;

                let mut store = store.write().await;
                if let Ok(record) = store.server_mut(&server_id) {
                    record.server.lock_status = None;
                    info!(server_id = %server_id, "OS install finished");
                }
            });
        });
    }

    /// Settle the power state of a server.
    pub(super) fn start_power_control(&self, server_id: String, target: PowerState) {
        let store = Arc::clone(&self.store);

        self.actions.start("power_control", async move {
            tokio::task::yield_now().await;

            let mut store = store.write().await;
            if let Ok(record) = store.server_mut(&server_id) {
                record.power_status = ServerPowerStatus { status: target };
                record.server.cached_power_status = Some(CachedPowerStatus {
                    status: target,
                    stored: Utc::now(),
                });
                info!(server_id = %server_id, status = %target, "Power state settled");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_idle_covers_chained_actions() {
        let scheduler = ActionScheduler::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner = scheduler.clone();
        let counter = Arc::clone(&done);
        scheduler.start("outer", async move {
            tokio::task::yield_now().await;
            counter.fetch_add(1, Ordering::SeqCst);
            let counter = Arc::clone(&counter);
            inner.start("inner", async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        scheduler.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);

        // Reusable after waiting.
        let counter = Arc::clone(&done);
        scheduler.start("again", async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
