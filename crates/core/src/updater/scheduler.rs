//! Background scheduling of update cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CycleOutcome, Updater};

/// Wakes up every poll interval and runs a cycle when the last success is
/// older than the refresh interval.
pub struct UpdateScheduler {
    updater: Arc<Updater>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl UpdateScheduler {
    pub fn new(updater: Arc<Updater>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            updater,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the scheduling loop. Returns `None` if it is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Update scheduler already running");
            return None;
        }

        let updater = Arc::clone(&self.updater);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let poll_interval = updater.config().poll_interval.max(Duration::from_secs(1));
        let run_on_startup = updater.config().run_on_startup;

        Some(tokio::spawn(async move {
            info!(poll_secs = poll_interval.as_secs(), "Update scheduler started");

            if run_on_startup {
                Self::tick(&updater).await;
            }

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Update scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::tick(&updater).await;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Update scheduler stopped");
        }))
    }

    /// Ask the loop to stop. A cycle in progress runs to completion.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run a cycle if the catalog is stale.
    pub async fn tick(updater: &Updater) -> Option<CycleOutcome> {
        let state = updater.state_store().load();
        let refresh_secs = updater.config().refresh_interval.as_secs();
        if !state.needs_refresh(refresh_secs) {
            debug!(
                last_success = ?state.last_success_at,
                "Catalog is fresh, skipping update"
            );
            return None;
        }
        Some(updater.run_cycle().await)
    }
}
