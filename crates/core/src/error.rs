use thiserror::Error;

use crate::schema::SnapshotTable;

/// Failures that abort a whole resolution run.
///
/// Everything else (unreadable snapshots, dangling foreign keys, bad
/// timestamps) degrades into the data instead of surfacing here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A snapshot could be found neither in the listing nor at any candidate path.
    #[error("Missing remote parquet for table: {table} ({detail})")]
    MissingTable { table: SnapshotTable, detail: String },
}

impl PipelineError {
    /// The table that could not be located.
    pub fn table(&self) -> SnapshotTable {
        match self {
            PipelineError::MissingTable { table, .. } => *table,
        }
    }
}
