//! Update cycle orchestration.
//!
//! One cycle runs fetch, decompress, validate, swap, import and record
//! state in that order. The production snapshot is only ever replaced by a
//! rename of the validated staged file, so a cycle failing before the swap
//! leaves it untouched. Cycles never overlap.

mod config;
mod runner;
mod scheduler;
mod types;

pub use config::UpdaterConfig;
pub use runner::Updater;
pub use scheduler::UpdateScheduler;
pub use types::{CycleError, CycleOutcome, CyclePhase, UpdaterStatus};
