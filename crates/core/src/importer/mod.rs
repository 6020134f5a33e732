//! Snapshot import: column mapping, row normalization and batched merge
//! into the catalog.

mod channels;
mod mapping;
pub mod normalize;
mod runner;
mod transform;
mod types;

pub use channels::{channel_name, poster_for_channel, resolve_channel};
pub use mapping::{build_projection, detect_column_mapping, ColumnMapping, LogicalField};
pub use runner::{ImportPlan, Importer};
pub use transform::{RowTransformer, SourceRow};
pub use types::*;
