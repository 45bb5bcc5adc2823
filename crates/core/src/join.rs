//! Left joins and the foreign-key chain from run steps to process types.
//!
//! ```text
//! run_step.ProcessModuleId ─▶ process_module.Id
//!                             process_module.ProcessId ─▶ process.ProcessId
//!                             process.CategoryId ─▶ process_category.CategoryId
//!                             process_category.CategoryId ─▶ process_type_category.CategoryId
//!                             process_type_category.TypeId ─▶ process_type.ProcessTypeId
//! run_step.RunId ─▶ run.RunId
//! ```
//!
//! Every hop is a left join: unmatched foreign keys leave nulls behind and
//! never drop rows. Lookup tables are deduplicated on their natural key
//! before they get here (see [`Catalog`]), so hops do not fan out.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::table::{Cell, Keep, KeyPart, Table};

/// Join `right` onto `left` where `left[left_on] == right[right_on]`.
///
/// - Left row order is kept; a left row with several matches yields one row
///   per match, in right-table order.
/// - Null keys never match.
/// - When `left_on == right_on` the right key column is dropped. Any other
///   right column whose name is already taken gets `suffix` appended (more
///   than once if needed), so nothing is overwritten.
pub fn left_join(left: &Table, right: &Table, left_on: &str, right_on: &str, suffix: &str) -> Table {
    let left_key = left.column_index(left_on);
    let right_key = right.column_index(right_on);

    let mut columns: Vec<String> = left.columns().to_vec();
    let mut right_picks: Vec<usize> = Vec::new();
    for (idx, name) in right.columns().iter().enumerate() {
        if Some(idx) == right_key && left_on == right_on {
            continue;
        }
        let mut out_name = name.clone();
        while columns.contains(&out_name) {
            out_name.push_str(suffix);
        }
        columns.push(out_name);
        right_picks.push(idx);
    }

    let mut index: HashMap<KeyPart, Vec<usize>> = HashMap::new();
    if let Some(rk) = right_key {
        for (row_idx, row) in right.rows().iter().enumerate() {
            let key = row[rk].key();
            if key != KeyPart::Null {
                index.entry(key).or_default().push(row_idx);
            }
        }
    }

    let mut rows = Vec::with_capacity(left.len());
    for left_row in left.rows() {
        let matches = left_key
            .map(|lk| left_row[lk].key())
            .filter(|k| *k != KeyPart::Null)
            .and_then(|k| index.get(&k));
        match matches {
            Some(hits) => {
                for &hit in hits {
                    let mut row = left_row.clone();
                    row.extend(right_picks.iter().map(|&i| right.rows()[hit][i].clone()));
                    rows.push(row);
                }
            }
            None => {
                let mut row = left_row.clone();
                row.extend(std::iter::repeat(Cell::Null).take(right_picks.len()));
                rows.push(row);
            }
        }
    }

    Table::new(columns, rows)
}

// ──────────────────────────────────────────────
// Catalog: deduplicated lookup tables
// ──────────────────────────────────────────────

/// The six lookup tables a run step is resolved against, each holding one
/// representative row per natural key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// `RunId, Label, Name, Motivation, Status, RunTypeId`, one row per `RunId`.
    pub runs: Table,
    /// `Id, ProcessId, ModuleId`, one row per `Id`.
    pub process_modules: Table,
    /// `ProcessId, ProcessName, CategoryId`, one row per `ProcessId`.
    pub processes: Table,
    /// `CategoryId, CategoryName`, one row per `CategoryId`.
    pub categories: Table,
    /// `TypeId, CategoryId`, one row per `CategoryId`.
    pub type_categories: Table,
    /// `ProcessTypeId, ProcessTypeName`, one row per `ProcessTypeId`.
    pub types: Table,
}

impl Catalog {
    /// Deduplicate raw snapshot tables into lookup tables.
    ///
    /// Inputs use logical column names (see [`crate::schema`]).
    pub fn build(
        runs: &Table,
        process_modules: &Table,
        processes: &Table,
        categories: &Table,
        type_categories: &Table,
        types: &Table,
    ) -> Self {
        Catalog {
            runs: runs.dedup_on(&["RunId"], Keep::First),
            process_modules: representative_process_modules(process_modules),
            processes: processes.dedup_on(&["ProcessId"], Keep::First),
            categories: categories.dedup_on(&["CategoryId"], Keep::First),
            type_categories: bridge_by_category(type_categories),
            types: types.dedup_on(&["ProcessTypeId"], Keep::First),
        }
    }
}

/// One row per `Id`: the first row (in file order) whose `ProcessId` is
/// present, else the first row. Id, ProcessId and ModuleId are coerced to
/// numbers first; unparseable values count as missing.
pub fn representative_process_modules(raw: &Table) -> Table {
    let pm = raw.coerce_numeric(&["Id", "ProcessId", "ModuleId"]);
    let (Some(id_col), process_col) = (pm.column_index("Id"), pm.column_index("ProcessId")) else {
        return pm;
    };

    // key -> (row, has_process)
    let mut best: HashMap<KeyPart, (usize, bool)> = HashMap::new();
    let mut order: Vec<KeyPart> = Vec::new();
    for (row_idx, row) in pm.rows().iter().enumerate() {
        let key = row[id_col].key();
        let has_process = process_col.is_some_and(|pc| !row[pc].is_null());
        match best.get_mut(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, (row_idx, has_process));
            }
            Some(slot) => {
                if has_process && !slot.1 {
                    *slot = (row_idx, true);
                }
            }
        }
    }

    let mut kept: Vec<usize> = order.iter().map(|k| best[k].0).collect();
    kept.sort_unstable();
    if kept.len() < pm.len() {
        debug!(
            rows = pm.len(),
            representatives = kept.len(),
            "process_module ids collapsed to representatives"
        );
    }
    pm.take_rows(&kept)
}

/// One bridge row per `CategoryId`.
///
/// Exact duplicate rows are dropped first. If a category still maps to more
/// than one type, the last row in file order wins and the conflict is logged.
pub fn bridge_by_category(raw: &Table) -> Table {
    let distinct = raw.dedup_rows();
    let bridged = distinct.dedup_on(&["CategoryId"], Keep::Last);
    if bridged.len() < distinct.len() {
        let mut seen: HashMap<KeyPart, usize> = HashMap::new();
        for row in 0..distinct.len() {
            *seen.entry(distinct.value(row, "CategoryId").key()).or_default() += 1;
        }
        let conflicting: Vec<String> = seen
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(k, n)| format!("{:?}×{}", k, n))
            .collect();
        warn!(
            categories = ?conflicting,
            "process_type_category maps a category to several types; keeping the last row"
        );
    }
    bridged
}

// ──────────────────────────────────────────────
// Hops
// ──────────────────────────────────────────────

/// Hop 1: `ProcessModuleId` → `process_module.Id`. Right-side clashes get `_pm`.
pub fn join_process_module(steps: &Table, catalog: &Catalog) -> Table {
    let pm = catalog.process_modules.select(&["Id", "ProcessId", "ModuleId"]);
    left_join(steps, &pm, "ProcessModuleId", "Id", "_pm")
}

/// Hop 2: `ProcessId` → `process.ProcessId`.
pub fn join_process(rows: &Table, catalog: &Catalog) -> Table {
    left_join(rows, &catalog.processes, "ProcessId", "ProcessId", "_process")
}

/// Hop 3: `CategoryId` → `process_category.CategoryId`.
pub fn join_category(rows: &Table, catalog: &Catalog) -> Table {
    left_join(rows, &catalog.categories, "CategoryId", "CategoryId", "_category")
}

/// Hop 4: `CategoryId` → `process_type_category.CategoryId`, bringing `TypeId`.
pub fn join_type_category(rows: &Table, catalog: &Catalog) -> Table {
    left_join(rows, &catalog.type_categories, "CategoryId", "CategoryId", "_ptc")
}

/// Hop 5: `TypeId` → `process_type.ProcessTypeId`.
pub fn join_type(rows: &Table, catalog: &Catalog) -> Table {
    left_join(rows, &catalog.types, "TypeId", "ProcessTypeId", "_type")
}

/// Hop 6: `RunId` → `run.RunId`, with the run's `Name` exposed as `RunName`
/// and a tag-stripped `MotivationText` next to the raw `Motivation`.
pub fn join_run(rows: &Table, catalog: &Catalog) -> Table {
    let runs = catalog
        .runs
        .select(&["RunId", "Label", "Name", "Motivation", "Status"])
        .rename(&[("Name", "RunName")]);
    let joined = left_join(rows, &runs, "RunId", "RunId", "_run");
    let text: Vec<Cell> = (0..joined.len())
        .map(|r| match joined.value(r, "Motivation") {
            Cell::Null => Cell::Null,
            raw => Cell::Text(crate::text::strip_html(&raw.to_string())),
        })
        .collect();
    joined.with_column("MotivationText", text)
}

/// Hops 1–5: attach process, category and type names to step rows.
pub fn resolve_names(steps: &Table, catalog: &Catalog) -> Table {
    let j1 = join_process_module(steps, catalog);
    let j2 = join_process(&j1, catalog);
    let j3 = join_category(&j2, catalog);
    let j4 = join_type_category(&j3, catalog);
    join_type(&j4, catalog)
}

/// The full chain over every distinct `(RunId, ProcessModuleId)` pairing.
///
/// Repeated pairings collapse to one row; no distinct pairing is ever lost.
pub fn join_all_steps(run_steps: &Table, catalog: &Catalog) -> Table {
    let pairs = run_steps
        .select(&["RunId", "ProcessModuleId"])
        .coerce_numeric(&["RunId", "ProcessModuleId"])
        .dedup_rows();
    let named = resolve_names(&pairs, catalog);
    join_run(&named, catalog)
}
