//! Schema discovery for upstream snapshots of unknown layout.

mod sqlite;
mod types;

pub(crate) use sqlite::sqlite_schema;
pub use sqlite::{guess_primary_table, inspect, open_snapshot, quote_identifier, validate_required_columns};
pub use types::*;
