//! Step status and current-step selection.
//!
//! Each run step is classified once from its start/finish instants. Then,
//! per run, one step is chosen as current by the first rule that applies:
//!
//! 1. latest `updated_at`
//! 2. highest ingestion ordinal (`__batch_index`, then `__fragment_index`),
//!    whenever either column is present; a null ordinal ranks highest
//! 3. highest `Sequence`
//! 4. last row in file order

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use time::PrimitiveDateTime;
use tracing::debug;

use crate::schema::{BATCH_INDEX, FRAGMENT_INDEX};
use crate::table::{Cell, KeyPart, Table};
use crate::timestamp;

pub const STARTED_AT: &str = "started_at";
pub const FINISHED_AT: &str = "finished_at";
pub const STATUS: &str = "status";
pub const UPDATED_AT: &str = "updated_at";

/// Progress of a single run step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl StepStatus {
    /// A finish makes a step completed whether or not it has a start.
    pub fn classify(started: Option<PrimitiveDateTime>, finished: Option<PrimitiveDateTime>) -> Self {
        match (started, finished) {
            (_, Some(_)) => StepStatus::Completed,
            (Some(_), None) => StepStatus::InProgress,
            (None, None) => StepStatus::NotStarted,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "Not Started",
            StepStatus::InProgress => "In Progress",
            StepStatus::Completed => "Completed",
        }
    }
}

/// Which rule picked a run's current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionRule {
    LatestUpdate,
    IngestionOrdinal,
    Sequence,
    NaturalOrder,
}

impl SelectionRule {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionRule::LatestUpdate => "latest_update",
            SelectionRule::IngestionOrdinal => "ingestion_ordinal",
            SelectionRule::Sequence => "sequence",
            SelectionRule::NaturalOrder => "natural_order",
        }
    }
}

fn instant(cell: &Cell) -> Option<PrimitiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        _ => None,
    }
}

fn instant_cell(value: Option<PrimitiveDateTime>) -> Cell {
    value.map(Cell::DateTime).unwrap_or(Cell::Null)
}

/// Add `started_at`, `finished_at`, `status` and `updated_at` to raw run steps.
///
/// Id, sequence and ordinal columns are coerced to numbers. Instants are
/// only built when both `StartDate` and `FinishDate` columns exist; without
/// them every step is Not Started.
pub fn annotate_steps(run_steps: &Table) -> Table {
    let steps = run_steps.coerce_numeric(&[
        "RunId",
        "ProcessModuleId",
        "Sequence",
        BATCH_INDEX,
        FRAGMENT_INDEX,
    ]);
    let has_dates = steps.has_column("StartDate") && steps.has_column("FinishDate");
    if !has_dates {
        debug!(columns = ?steps.columns(), "run_step has no start/finish dates");
    }

    let mut started = Vec::with_capacity(steps.len());
    let mut finished = Vec::with_capacity(steps.len());
    let mut status = Vec::with_capacity(steps.len());
    let mut updated = Vec::with_capacity(steps.len());
    for row in 0..steps.len() {
        let (s, f) = if has_dates {
            (
                timestamp::combine(steps.value(row, "StartDate"), steps.value(row, "StartTime")),
                timestamp::combine(steps.value(row, "FinishDate"), steps.value(row, "FinishTime")),
            )
        } else {
            (None, None)
        };
        started.push(instant_cell(s));
        finished.push(instant_cell(f));
        status.push(Cell::text(StepStatus::classify(s, f).as_str()));
        updated.push(instant_cell(s.max(f)));
    }

    steps
        .with_column(STARTED_AT, started)
        .with_column(FINISHED_AT, finished)
        .with_column(STATUS, status)
        .with_column(UPDATED_AT, updated)
}

/// Null sorts above every number.
fn cmp_ordinal(a: &[Option<f64>], b: &[Option<f64>]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.total_cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Choose the current step among `rows` (indices into `steps`, in file order).
///
/// `rows` must not be empty.
pub fn pick_current(steps: &Table, rows: &[usize]) -> (usize, SelectionRule) {
    // Rule 1: max updated_at, first row on ties.
    let mut latest: Option<(usize, PrimitiveDateTime)> = None;
    for &r in rows {
        if let Some(at) = instant(steps.value(r, UPDATED_AT)) {
            if latest.map_or(true, |(_, best)| at > best) {
                latest = Some((r, at));
            }
        }
    }
    if let Some((r, _)) = latest {
        return (r, SelectionRule::LatestUpdate);
    }

    // Rule 2: highest (batch, fragment) ordinal, nulls highest, last row on ties.
    let ordinal_cols: Vec<&str> = [BATCH_INDEX, FRAGMENT_INDEX]
        .into_iter()
        .filter(|c| steps.has_column(c))
        .collect();
    let ordinal = |r: usize| -> Vec<Option<f64>> {
        ordinal_cols.iter().map(|c| steps.value(r, c).as_f64()).collect()
    };
    if !ordinal_cols.is_empty() {
        let mut best = rows[0];
        for &r in &rows[1..] {
            if cmp_ordinal(&ordinal(r), &ordinal(best)) != Ordering::Less {
                best = r;
            }
        }
        return (best, SelectionRule::IngestionOrdinal);
    }

    // Rule 3: max Sequence, first row on ties.
    let mut top: Option<(usize, f64)> = None;
    for &r in rows {
        if let Some(seq) = steps.value(r, "Sequence").as_f64() {
            if top.map_or(true, |(_, best)| seq > best) {
                top = Some((r, seq));
            }
        }
    }
    if let Some((r, _)) = top {
        return (r, SelectionRule::Sequence);
    }

    // Rule 4: last row.
    (rows[rows.len() - 1], SelectionRule::NaturalOrder)
}

/// One current step per run.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSteps {
    /// The chosen rows, one per `RunId`, in order of each run's first step.
    pub table: Table,
    /// The rule that chose each row of `table`.
    pub rules: Vec<SelectionRule>,
}

/// Pick the current step of every run in annotated steps.
///
/// Steps without a `RunId` belong to no run and are ignored.
pub fn select_current(steps: &Table) -> CurrentSteps {
    let Some(run_col) = steps.column_index("RunId") else {
        return CurrentSteps {
            table: Table::empty(steps.columns()),
            rules: Vec::new(),
        };
    };

    let mut groups: HashMap<KeyPart, Vec<usize>> = HashMap::new();
    let mut order: Vec<KeyPart> = Vec::new();
    for (idx, row) in steps.rows().iter().enumerate() {
        let key = row[run_col].key();
        if key == KeyPart::Null {
            continue;
        }
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(idx);
    }

    let mut chosen = Vec::with_capacity(order.len());
    let mut rules = Vec::with_capacity(order.len());
    let mut tally: HashMap<SelectionRule, usize> = HashMap::new();
    for key in &order {
        let (row, rule) = pick_current(steps, &groups[key]);
        chosen.push(row);
        rules.push(rule);
        *tally.entry(rule).or_default() += 1;
    }
    for (rule, runs) in &tally {
        debug!(rule = rule.as_str(), runs, "current step selection");
    }

    CurrentSteps {
        table: steps.take_rows(&chosen),
        rules,
    }
}
