//! The resolution entry point: locate, read, join, select, project.

use std::collections::BTreeMap;

use batchloc_storage::BlobStore;
use tracing::info;

use crate::error::PipelineError;
use crate::join::{join_all_steps, join_run, resolve_names, Catalog};
use crate::locate::{locate_all, LocatorConfig, TableLocations};
use crate::project::{project_batches, project_steps, BatchLocation, StepLocation};
use crate::reader::{read_columns, TableRead};
use crate::resolve::{annotate_steps, select_current, SelectionRule};
use crate::schema::SnapshotTable;
use crate::table::Table;

/// The seven snapshot tables, under logical column names.
#[derive(Debug, Clone, Default)]
pub struct Snapshots {
    pub run: Table,
    pub run_step: Table,
    pub process_module: Table,
    pub process: Table,
    pub process_category: Table,
    pub process_type_category: Table,
    pub process_type: Table,
}

impl Snapshots {
    fn slot(&mut self, table: SnapshotTable) -> &mut Table {
        match table {
            SnapshotTable::Run => &mut self.run,
            SnapshotTable::RunStep => &mut self.run_step,
            SnapshotTable::ProcessModule => &mut self.process_module,
            SnapshotTable::Process => &mut self.process,
            SnapshotTable::ProcessCategory => &mut self.process_category,
            SnapshotTable::ProcessTypeCategory => &mut self.process_type_category,
            SnapshotTable::ProcessType => &mut self.process_type,
        }
    }
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// One record per run that exists in `run` and has at least one step.
    pub batches: Vec<BatchLocation>,
    /// Every distinct `(run, process module)` pairing with its resolved names.
    pub steps: Vec<StepLocation>,
    /// The rule that picked each run's current step, by batch id.
    pub rules: BTreeMap<i64, SelectionRule>,
}

/// Everything one invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub batches: Vec<BatchLocation>,
    pub steps: Vec<StepLocation>,
    pub rules: BTreeMap<i64, SelectionRule>,
    /// Path each table was read from.
    pub sources: TableLocations,
    /// Tables that were located but could not be read, with the reason.
    pub unavailable: Vec<(SnapshotTable, String)>,
}

/// Join, classify and select over already-loaded snapshots.
pub fn resolve(snapshots: &Snapshots) -> Resolution {
    let catalog = Catalog::build(
        &snapshots.run,
        &snapshots.process_module,
        &snapshots.process,
        &snapshots.process_category,
        &snapshots.process_type_category,
        &snapshots.process_type,
    );

    let all_steps = join_all_steps(&snapshots.run_step, &catalog);
    info!(rows = all_steps.len(), "joined run steps");

    let annotated = annotate_steps(&snapshots.run_step);
    let current = select_current(&annotated);

    let named = resolve_names(&current.table, &catalog);
    let located = join_run(&named, &catalog);
    let known = located.filter_keys("RunId", &catalog.runs.key_set("RunId"));
    info!(
        runs_with_steps = current.table.len(),
        known_runs = known.len(),
        "resolved current steps"
    );

    let rules = current
        .rules
        .iter()
        .enumerate()
        .filter_map(|(r, rule)| Some((current.table.value(r, "RunId").as_i64()?, *rule)))
        .collect();

    Resolution {
        batches: project_batches(&known),
        steps: project_steps(&all_steps),
        rules,
    }
}

/// Resolve the current location of every batch in `store`.
///
/// Fails only when a snapshot cannot be located. Snapshots that are located
/// but unreadable count as empty and are listed in
/// [`LocationReport::unavailable`].
pub fn locate_batches(store: &dyn BlobStore, config: &LocatorConfig) -> Result<LocationReport, PipelineError> {
    let sources = locate_all(store, config)?;

    let mut snapshots = Snapshots::default();
    let mut unavailable = Vec::new();
    for (table, path) in sources.iter() {
        let read = read_columns(store, path, table.columns());
        if let TableRead::Unavailable { reason, .. } = &read {
            unavailable.push((table, reason.clone()));
        }
        *snapshots.slot(table) = read.into_table();
    }

    let resolution = resolve(&snapshots);
    info!(
        batches = resolution.batches.len(),
        unavailable = unavailable.len(),
        "batch locations ready"
    );

    Ok(LocationReport {
        batches: resolution.batches,
        steps: resolution.steps,
        rules: resolution.rules,
        sources,
        unavailable,
    })
}
