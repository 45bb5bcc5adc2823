//! The seven snapshot tables and the columns read from each.

use std::fmt;

/// A logical snapshot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotTable {
    Process,
    ProcessCategory,
    ProcessModule,
    ProcessType,
    ProcessTypeCategory,
    Run,
    RunStep,
}

impl SnapshotTable {
    /// All tables, in name order (the order discovery runs in).
    pub const ALL: [SnapshotTable; 7] = [
        SnapshotTable::Process,
        SnapshotTable::ProcessCategory,
        SnapshotTable::ProcessModule,
        SnapshotTable::ProcessType,
        SnapshotTable::ProcessTypeCategory,
        SnapshotTable::Run,
        SnapshotTable::RunStep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SnapshotTable::Process => "process",
            SnapshotTable::ProcessCategory => "process_category",
            SnapshotTable::ProcessModule => "process_module",
            SnapshotTable::ProcessType => "process_type",
            SnapshotTable::ProcessTypeCategory => "process_type_category",
            SnapshotTable::Run => "run",
            SnapshotTable::RunStep => "run_step",
        }
    }

    /// Leaf file name of the snapshot, e.g. `run_step.parquet`.
    pub fn file_name(self) -> String {
        format!("{}.parquet", self.name())
    }

    /// Relative paths probed, in order, when the listing does not resolve the table.
    pub fn candidate_paths(self) -> Vec<String> {
        let file = self.file_name();
        let mut dirs = vec!["", "parquet/", "tables/"];
        if matches!(self, SnapshotTable::Run | SnapshotTable::RunStep) {
            dirs.push("delta/");
        }
        dirs.into_iter().map(|d| format!("{}{}", d, file)).collect()
    }

    /// Columns read from this table.
    pub fn columns(self) -> &'static [Column] {
        match self {
            SnapshotTable::Run => RUN_COLUMNS,
            SnapshotTable::RunStep => RUN_STEP_COLUMNS,
            SnapshotTable::ProcessModule => PROCESS_MODULE_COLUMNS,
            SnapshotTable::Process => PROCESS_COLUMNS,
            SnapshotTable::ProcessCategory => PROCESS_CATEGORY_COLUMNS,
            SnapshotTable::ProcessTypeCategory => PROCESS_TYPE_CATEGORY_COLUMNS,
            SnapshotTable::ProcessType => PROCESS_TYPE_COLUMNS,
        }
    }
}

impl fmt::Display for SnapshotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A logical column and the physical names it may be stored under.
///
/// Candidates are exact, case-sensitive names tried in order; the first one
/// present in the file wins and the column is returned as `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

impl Column {
    pub const fn new(name: &'static str, candidates: &'static [&'static str]) -> Self {
        Column { name, candidates }
    }

    /// First candidate found in `present`, as an index into it.
    pub fn resolve(&self, present: &[String]) -> Option<usize> {
        self.candidates
            .iter()
            .find_map(|c| present.iter().position(|p| p == c))
    }
}

const RUN_COLUMNS: &[Column] = &[
    Column::new("RunId", &["Id", "RunId"]),
    Column::new("Label", &["Label"]),
    Column::new("Name", &["Name"]),
    Column::new("Motivation", &["Motivation"]),
    Column::new("Status", &["Status"]),
    Column::new("RunTypeId", &["RunTypeId"]),
];

pub(crate) const BATCH_INDEX: &str = "__batch_index";
pub(crate) const FRAGMENT_INDEX: &str = "__fragment_index";

const RUN_STEP_COLUMNS: &[Column] = &[
    Column::new("RunId", &["RunId"]),
    Column::new("ProcessModuleId", &["ProcessModuleId"]),
    Column::new("Sequence", &["Sequence"]),
    Column::new("StartDate", &["StartDate"]),
    Column::new("StartTime", &["StartTime"]),
    Column::new("FinishDate", &["FinishDate"]),
    Column::new("FinishTime", &["FinishTime"]),
    Column::new(BATCH_INDEX, &[BATCH_INDEX]),
    Column::new(FRAGMENT_INDEX, &[FRAGMENT_INDEX]),
];

const PROCESS_MODULE_COLUMNS: &[Column] = &[
    Column::new("Id", &["Id"]),
    Column::new("ProcessId", &["ProcessId"]),
    Column::new("ModuleId", &["ModuleId"]),
];

const PROCESS_COLUMNS: &[Column] = &[
    Column::new("ProcessId", &["Id", "ProcessId"]),
    Column::new("ProcessName", &["Name", "ProcessName"]),
    Column::new("CategoryId", &["CategoryId"]),
];

const PROCESS_CATEGORY_COLUMNS: &[Column] = &[
    Column::new("CategoryId", &["Id", "CategoryId"]),
    Column::new("CategoryName", &["Name", "CategoryName"]),
];

const PROCESS_TYPE_CATEGORY_COLUMNS: &[Column] = &[
    Column::new("TypeId", &["TypeId", "ProcessTypeId"]),
    Column::new("CategoryId", &["CategoryId"]),
];

const PROCESS_TYPE_COLUMNS: &[Column] = &[
    Column::new("ProcessTypeId", &["Id", "ProcessTypeId"]),
    Column::new("ProcessTypeName", &["Name", "ProcessTypeName"]),
];
