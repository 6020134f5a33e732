//! The update cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{CycleError, CycleOutcome, CyclePhase, UpdaterConfig, UpdaterStatus};
use crate::fetcher::{decompress, FetchOptions, SnapshotFetcher};
use crate::importer::Importer;
use crate::metrics;
use crate::state::{CycleSuccess, StateStore};
use crate::validator::validate;

/// Clears the running flag when a cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives update cycles. Not reentrant: a second concurrent `run_cycle`
/// returns an error outcome immediately.
pub struct Updater {
    config: UpdaterConfig,
    fetcher: Arc<dyn SnapshotFetcher>,
    state_store: StateStore,
    importer: Arc<Importer>,
    running: AtomicBool,
    status: RwLock<UpdaterStatus>,
}

impl Updater {
    pub fn new(
        config: UpdaterConfig,
        fetcher: Arc<dyn SnapshotFetcher>,
        state_store: StateStore,
        importer: Importer,
    ) -> Self {
        Self {
            config,
            fetcher,
            state_store,
            importer: Arc::new(importer),
            running: AtomicBool::new(false),
            status: RwLock::new(UpdaterStatus::default()),
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state_store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> UpdaterStatus {
        self.status.read().await.clone()
    }

    /// Run one full cycle. Never fails: every error is folded into
    /// [`CycleOutcome::Error`].
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Update cycle requested while another is running");
            return CycleOutcome::Error {
                phase: self.status.read().await.phase,
                error: CycleError::Busy.to_string(),
            };
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        {
            let mut status = self.status.write().await;
            status.running = true;
            status.phase = CyclePhase::Idle;
        }
        info!(url = %self.config.source_url, "Update cycle started");

        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                let phase = self.status.read().await.phase;
                error!(phase = %phase, error = %e, "Update cycle failed");
                CycleOutcome::Error {
                    phase,
                    error: e.to_string(),
                }
            }
        };

        self.cleanup_staging().await;

        let elapsed = started.elapsed();
        metrics::CYCLES_TOTAL
            .with_label_values(&[outcome.label()])
            .inc();
        metrics::CYCLE_DURATION
            .with_label_values(&[outcome.label()])
            .observe(elapsed.as_secs_f64());

        info!(
            result = outcome.label(),
            duration_ms = elapsed.as_millis() as u64,
            "Update cycle finished"
        );

        {
            let mut status = self.status.write().await;
            status.running = false;
            status.phase = CyclePhase::Idle;
            status.last_outcome = Some(outcome.clone());
            status.last_finished_at = Some(Utc::now());
        }

        outcome
    }

    async fn set_phase(&self, phase: CyclePhase) {
        debug!(phase = %phase, "Cycle phase");
        self.status.write().await.phase = phase;
    }

    async fn execute(&self) -> Result<CycleOutcome, CycleError> {
        let mut state = self.state_store.load();
        state.record_attempt(Utc::now());
        self.state_store.save(&state)?;

        // Fetch
        self.set_phase(CyclePhase::Fetching).await;
        let download = self.config.staged_download();
        let options = FetchOptions::default()
            .with_headers(state.conditional_headers())
            .with_timeout(self.config.fetch_timeout);
        let fetched = self
            .fetcher
            .fetch(&self.config.source_url, &download, &options)
            .await?;

        if !fetched.downloaded {
            info!("Snapshot not modified upstream");
            return Ok(CycleOutcome::NotModified);
        }
        let bytes_downloaded = fetched.size_bytes.unwrap_or(0);
        metrics::SNAPSHOT_BYTES.inc_by(bytes_downloaded);

        // Decompress
        self.set_phase(CyclePhase::Decompressing).await;
        let staged = self.config.staged_snapshot();
        {
            let (src, dst) = (download.clone(), staged.clone());
            blocking(move || decompress(&src, &dst)).await??;
        }

        // Validate
        self.set_phase(CyclePhase::Validating).await;
        let validation = {
            let (path, options) = (staged.clone(), self.config.validate);
            blocking(move || validate(&path, &options)).await?
        };
        if !validation.valid {
            return Ok(CycleOutcome::ValidationFailed {
                row_count: validation.row_count,
                errors: validation.errors,
            });
        }

        // Swap
        self.set_phase(CyclePhase::Swapping).await;
        promote(&staged, &self.config.production_path).map_err(CycleError::Swap)?;
        info!(path = %self.config.production_path.display(), "Snapshot promoted");

        // Import
        self.set_phase(CyclePhase::Importing).await;
        let import = {
            let (importer, path) = (Arc::clone(&self.importer), self.config.production_path.clone());
            blocking(move || importer.run(&path)).await??
        };

        let now = Utc::now();
        state.record_success(
            now,
            CycleSuccess {
                etag: fetched.validators.etag,
                last_modified: fetched.validators.last_modified,
                row_count: validation.row_count,
                max_timestamp: validation.max_timestamp,
                source: Some(self.config.snapshot_name()),
            },
        );
        self.state_store.save(&state)?;
        metrics::LAST_SUCCESS_TIMESTAMP.set(now.timestamp());

        Ok(CycleOutcome::Updated {
            bytes_downloaded,
            row_count: validation.row_count,
            max_timestamp: validation.max_timestamp,
            import,
        })
    }

    /// Remove everything left in the staging directory.
    async fn cleanup_staging(&self) {
        let dir = self.config.staging_dir.clone();
        let removed = blocking(move || clear_dir(&dir)).await;
        match removed {
            Ok(Ok(0)) => {}
            Ok(Ok(count)) => debug!(files = count, "Staging directory cleaned"),
            Ok(Err(e)) => warn!(error = %e, "Failed to clean staging directory"),
            Err(e) => warn!(error = %e, "Failed to clean staging directory"),
        }
    }
}

async fn blocking<F, T>(f: F) -> Result<T, CycleError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CycleError::Task(e.to_string()))
}

/// Rename `staged` over `production`. Both live on the same filesystem, so
/// readers see either the old or the new file.
fn promote(staged: &Path, production: &Path) -> std::io::Result<()> {
    if let Some(parent) = production.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(staged, production)
}

fn clear_dir(dir: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}
