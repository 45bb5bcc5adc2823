//! Flattening joined rows into output records.

use serde::Serialize;

use crate::resolve::{FINISHED_AT, STARTED_AT, STATUS};
use crate::table::{Cell, Table};

/// Where one batch currently is.
///
/// Missing values are empty strings; a missing id is 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchLocation {
    pub batch_id: i64,
    pub batch_number: String,
    pub batch_name: String,
    pub batch_status: String,
    pub motivation: String,
    pub process_name: String,
    pub category_name: String,
    pub process_type_name: String,
    pub process_status: String,
    pub started_at: String,
    pub finished_at: String,
}

/// One `(run, process module)` pairing with every name the join resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepLocation {
    pub run_id: Option<i64>,
    pub batch_number: String,
    pub batch_name: String,
    pub batch_status: String,
    pub motivation: String,
    pub process_module_id: Option<i64>,
    pub module_id: Option<i64>,
    pub process_id: Option<i64>,
    pub process_name: String,
    pub category_id: Option<i64>,
    pub category_name: String,
    pub type_id: Option<i64>,
    pub process_type_name: String,
}

fn text(rows: &Table, row: usize, column: &str) -> String {
    rows.value(row, column).to_string()
}

fn id(rows: &Table, row: usize, column: &str) -> Option<i64> {
    match rows.value(row, column) {
        Cell::Null => None,
        cell => cell.as_i64(),
    }
}

/// One record per row of the current-step join, sorted by batch id, highest first.
pub fn project_batches(rows: &Table) -> Vec<BatchLocation> {
    let mut batches: Vec<BatchLocation> = (0..rows.len())
        .map(|r| BatchLocation {
            batch_id: id(rows, r, "RunId").unwrap_or(0),
            batch_number: text(rows, r, "Label"),
            batch_name: text(rows, r, "RunName"),
            batch_status: text(rows, r, "Status"),
            motivation: text(rows, r, "MotivationText"),
            process_name: text(rows, r, "ProcessName"),
            category_name: text(rows, r, "CategoryName"),
            process_type_name: text(rows, r, "ProcessTypeName"),
            process_status: text(rows, r, STATUS),
            started_at: text(rows, r, STARTED_AT),
            finished_at: text(rows, r, FINISHED_AT),
        })
        .collect();
    batches.sort_by(|a, b| b.batch_id.cmp(&a.batch_id));
    batches
}

/// One record per row of the all-steps join, in join order.
pub fn project_steps(rows: &Table) -> Vec<StepLocation> {
    (0..rows.len())
        .map(|r| StepLocation {
            run_id: id(rows, r, "RunId"),
            batch_number: text(rows, r, "Label"),
            batch_name: text(rows, r, "RunName"),
            batch_status: text(rows, r, "Status"),
            motivation: text(rows, r, "MotivationText"),
            process_module_id: id(rows, r, "ProcessModuleId"),
            module_id: id(rows, r, "ModuleId"),
            process_id: id(rows, r, "ProcessId"),
            process_name: text(rows, r, "ProcessName"),
            category_id: id(rows, r, "CategoryId"),
            category_name: text(rows, r, "CategoryName"),
            type_id: id(rows, r, "TypeId"),
            process_type_name: text(rows, r, "ProcessTypeName"),
        })
        .collect()
}

/// `{"success": true, "data": [...], "count": N}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataEnvelope<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> DataEnvelope<T> {
    pub fn ok(data: Vec<T>) -> Self {
        DataEnvelope {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// `{"success": false, "error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorEnvelope {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::table::tests::table;

    #[test]
    fn missing_values_become_empty_strings() {
        let rows = table(
            &["RunId", "Label", "status", "finished_at"],
            vec![vec![
                Cell::Int(7),
                Cell::Null,
                Cell::text("Completed"),
                Cell::DateTime(datetime!(2024-01-05 10:00:00)),
            ]],
        );
        let out = project_batches(&rows);
        assert_eq!(
            out[0],
            BatchLocation {
                batch_id: 7,
                batch_number: String::new(),
                batch_name: String::new(),
                batch_status: String::new(),
                motivation: String::new(),
                process_name: String::new(),
                category_name: String::new(),
                process_type_name: String::new(),
                process_status: "Completed".to_string(),
                started_at: String::new(),
                finished_at: "2024-01-05 10:00:00".to_string(),
            }
        );
    }

    #[test]
    fn sorted_by_batch_id_descending_with_missing_id_as_zero() {
        let rows = table(
            &["RunId"],
            vec![vec![Cell::Int(3)], vec![Cell::Null], vec![Cell::Int(12)]],
        );
        let ids: Vec<i64> = project_batches(&rows).iter().map(|b| b.batch_id).collect();
        assert_eq!(ids, vec![12, 3, 0]);
    }

    #[test]
    fn envelopes_serialize() {
        let ok = DataEnvelope::ok(vec![1, 2]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"success": true, "data": [1, 2], "count": 2})
        );
        let err = ErrorEnvelope::new("boom");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"success": false, "error": "boom"})
        );
    }

    #[test]
    fn step_ids_are_optional() {
        let rows = table(
            &["RunId", "ProcessModuleId", "ProcessName"],
            vec![vec![Cell::Int(1), Cell::Null, Cell::text("Etch")]],
        );
        let steps = project_steps(&rows);
        assert_eq!(steps[0].run_id, Some(1));
        assert_eq!(steps[0].process_module_id, None);
        assert_eq!(steps[0].process_name, "Etch");
    }
}
