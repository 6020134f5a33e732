//! Persisted update-cycle metadata.
//!
//! The state file records when the last cycle was attempted and when one last
//! succeeded, together with the cache validators needed for the next
//! conditional download.

mod store;
mod types;

pub use store::StateStore;
pub use types::*;
