//! Batch location resolution over relational snapshot tables.
//!
//! The pipeline locates seven Parquet snapshots in a blob store, reads the
//! columns it needs from each, joins run steps through
//! `process_module → process → process_category → process_type_category →
//! process_type`, classifies every step, and picks one current step per run.
//!
//! The entry point is [`locate_batches`]; [`resolve`] runs the same logic
//! over tables that are already in memory.

pub mod error;
pub mod join;
pub mod locate;
pub mod pipeline;
pub mod project;
pub mod reader;
pub mod resolve;
pub mod schema;
pub mod table;
pub mod text;
pub mod timestamp;

pub use error::PipelineError;
pub use locate::{locate_all, pick_from_listing, Discovery, LocatorConfig, TableLocations};
pub use pipeline::{locate_batches, resolve, LocationReport, Resolution, Snapshots};
pub use project::{BatchLocation, DataEnvelope, ErrorEnvelope, StepLocation};
pub use reader::{read_columns, ReadError, TableRead};
pub use resolve::{SelectionRule, StepStatus};
pub use schema::{Column, SnapshotTable};
pub use table::{Cell, Table};
