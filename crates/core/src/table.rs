//! Immutable tabular values.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Cell`]s.
//! Every operation borrows its input and returns a new table, so each stage
//! of the join chain can be tested on its own.

use std::collections::{HashMap, HashSet};
use std::fmt;

use time::{Date, PrimitiveDateTime, Time};

static NULL: Cell = Cell::Null;

/// A single value read from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(Date),
    DateTime(PrimitiveDateTime),
    Time(Time),
}

impl Cell {
    pub fn text(s: &str) -> Self {
        Cell::Text(s.to_string())
    }

    /// True for `Null` and for float NaN, which snapshots use as a missing marker.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Integer view: integers, integral floats, and integer-looking text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric coercion: numbers pass through, numeric text is parsed,
    /// anything else becomes `Null`.
    pub fn to_numeric(&self) -> Cell {
        match self {
            Cell::Int(_) => self.clone(),
            Cell::Float(f) if f.is_nan() => Cell::Null,
            Cell::Float(_) => self.clone(),
            Cell::Bool(b) => Cell::Int(i64::from(*b)),
            Cell::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Cell::Int(i)
                } else {
                    match s.parse::<f64>() {
                        Ok(f) if f.is_finite() => Cell::Float(f),
                        _ => Cell::Null,
                    }
                }
            }
            _ => Cell::Null,
        }
    }

    /// Normalized key used for deduplication and join matching.
    pub fn key(&self) -> KeyPart {
        match self {
            Cell::Null => KeyPart::Null,
            Cell::Bool(b) => KeyPart::Bool(*b),
            Cell::Int(i) => KeyPart::Int(*i),
            Cell::Float(f) if f.is_nan() => KeyPart::Null,
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => KeyPart::Int(*f as i64),
            Cell::Float(f) => KeyPart::Float(f.to_bits()),
            Cell::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => KeyPart::Int(i),
                Err(_) => KeyPart::Text(s.clone()),
            },
            Cell::Date(d) => KeyPart::Date(*d),
            Cell::DateTime(dt) => KeyPart::DateTime(*dt),
            Cell::Time(t) => KeyPart::Time(*t),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) if v.is_nan() => Ok(()),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d),
            Cell::DateTime(dt) => f.write_str(&crate::timestamp::format_instant(*dt)),
            Cell::Time(t) => write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
        }
    }
}

/// Hashable, normalized form of a [`Cell`].
///
/// `Int(7)`, `Float(7.0)` and `Text("7")` share the key `Int(7)` so that ids
/// stored with different physical types across snapshots still match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Date(Date),
    DateTime(PrimitiveDateTime),
    Time(Time),
}

/// Which row survives when a key repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    First,
    Last,
}

/// Column names plus rows, all rows as wide as the header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table; short rows are padded with `Null`, long rows truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Table { columns, rows }
    }

    /// A table with headers and no rows.
    pub fn empty<S: AsRef<str>>(columns: &[S]) -> Self {
        Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Value at (`row`, `column`); `Null` when the column does not exist.
    pub fn value(&self, row: usize, column: &str) -> &Cell {
        match self.column_index(column) {
            Some(idx) => &self.rows[row][idx],
            None => &NULL,
        }
    }

    /// All values of a column, or `None` if it does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rename columns; pairs naming absent columns are ignored.
    pub fn rename(&self, pairs: &[(&str, &str)]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                pairs
                    .iter()
                    .find(|(from, _)| from == c)
                    .map(|(_, to)| to.to_string())
                    .unwrap_or_else(|| c.clone())
            })
            .collect();
        Table {
            columns,
            rows: self.rows.clone(),
        }
    }

    /// Keep the named columns that exist, in the order given.
    pub fn select(&self, names: &[&str]) -> Table {
        let picks: Vec<(usize, &str)> = names
            .iter()
            .filter_map(|n| self.column_index(n).map(|i| (i, *n)))
            .collect();
        Table {
            columns: picks.iter().map(|(_, n)| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picks.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }

    /// Replace the named column, or append it if absent.
    ///
    /// `values` must hold one cell per row; missing cells become `Null`.
    pub fn with_column(&self, name: &str, values: Vec<Cell>) -> Table {
        let mut values = values;
        values.resize(self.rows.len(), Cell::Null);
        let mut out = self.clone();
        match out.column_index(name) {
            Some(idx) => {
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                out.columns.push(name.to_string());
                for (row, v) in out.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        out
    }

    /// Rows at the given indices, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Apply [`Cell::to_numeric`] to the named columns that exist.
    pub fn coerce_numeric(&self, names: &[&str]) -> Table {
        let targets: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        let mut out = self.clone();
        for row in &mut out.rows {
            for &idx in &targets {
                row[idx] = row[idx].to_numeric();
            }
        }
        out
    }

    /// Composite key of a row over the given column indices.
    pub(crate) fn row_key(&self, row: usize, indices: &[usize]) -> Vec<KeyPart> {
        indices.iter().map(|&i| self.rows[row][i].key()).collect()
    }

    /// Drop rows whose key over `keys` repeats, keeping the first or last
    /// occurrence. Surviving rows keep their original relative order.
    ///
    /// Missing key columns are ignored; with no usable key columns the table
    /// is returned unchanged. Nulls compare equal to each other here.
    pub fn dedup_on(&self, keys: &[&str], keep: Keep) -> Table {
        let indices: Vec<usize> = keys.iter().filter_map(|k| self.column_index(k)).collect();
        if indices.is_empty() {
            return self.clone();
        }
        let mut chosen: HashMap<Vec<KeyPart>, usize> = HashMap::new();
        for row in 0..self.rows.len() {
            let key = self.row_key(row, &indices);
            match keep {
                Keep::First => {
                    chosen.entry(key).or_insert(row);
                }
                Keep::Last => {
                    chosen.insert(key, row);
                }
            }
        }
        let survivors: HashSet<usize> = chosen.into_values().collect();
        let kept: Vec<usize> = (0..self.rows.len())
            .filter(|r| survivors.contains(r))
            .collect();
        self.take_rows(&kept)
    }

    /// Drop fully identical rows, keeping the first occurrence.
    pub fn dedup_rows(&self) -> Table {
        let all: Vec<&str> = self.columns.iter().map(|c| c.as_str()).collect();
        self.dedup_on(&all, Keep::First)
    }

    /// Keep rows whose `column` key is in `allowed`.
    pub fn filter_keys(&self, column: &str, allowed: &HashSet<KeyPart>) -> Table {
        let Some(idx) = self.column_index(column) else {
            return Table::empty(self.columns.as_slice());
        };
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| allowed.contains(&r[idx].key()))
                .cloned()
                .collect(),
        }
    }

    /// Distinct non-null keys of a column.
    pub fn key_set(&self, column: &str) -> HashSet<KeyPart> {
        match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .map(|r| r[idx].key())
                .filter(|k| *k != KeyPart::Null)
                .collect(),
            None => HashSet::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a table from string column names and rows.
    pub(crate) fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn keys_normalize_numeric_representations() {
        assert_eq!(Cell::Int(7).key(), Cell::Float(7.0).key());
        assert_eq!(Cell::Int(7).key(), Cell::text(" 7 ").key());
        assert_ne!(Cell::Float(7.5).key(), Cell::Int(7).key());
        assert_eq!(Cell::Float(f64::NAN).key(), KeyPart::Null);
    }

    #[test]
    fn to_numeric_coerces_garbage_to_null() {
        assert_eq!(Cell::text("42").to_numeric(), Cell::Int(42));
        assert_eq!(Cell::text("4.5").to_numeric(), Cell::Float(4.5));
        assert_eq!(Cell::text("n/a").to_numeric(), Cell::Null);
        assert_eq!(Cell::Float(f64::NAN).to_numeric(), Cell::Null);
    }

    #[test]
    fn new_pads_short_rows() {
        let t = table(&["a", "b"], vec![vec![Cell::Int(1)]]);
        assert_eq!(t.value(0, "b"), &Cell::Null);
    }

    #[test]
    fn value_of_missing_column_is_null() {
        let t = table(&["a"], vec![vec![Cell::Int(1)]]);
        assert!(t.value(0, "zzz").is_null());
    }

    #[test]
    fn rename_and_select() {
        let t = table(
            &["Id", "Name", "Extra"],
            vec![vec![Cell::Int(1), Cell::text("x"), Cell::Null]],
        );
        let r = t
            .rename(&[("Id", "ProcessId"), ("Name", "ProcessName")])
            .select(&["ProcessName", "Missing", "ProcessId"]);
        assert_eq!(r.columns(), &["ProcessName", "ProcessId"]);
        assert_eq!(r.rows()[0], vec![Cell::text("x"), Cell::Int(1)]);
    }

    #[test]
    fn with_column_replaces_or_appends() {
        let t = table(&["a"], vec![vec![Cell::Int(1)], vec![Cell::Int(2)]]);
        let appended = t.with_column("b", vec![Cell::text("x")]);
        assert_eq!(appended.columns(), &["a", "b"]);
        assert_eq!(appended.value(1, "b"), &Cell::Null);
        let replaced = appended.with_column("a", vec![Cell::Int(9), Cell::Int(8)]);
        assert_eq!(replaced.value(0, "a"), &Cell::Int(9));
        assert_eq!(t.value(0, "a"), &Cell::Int(1), "input is untouched");
    }

    #[test]
    fn dedup_keeps_first_in_original_order() {
        let t = table(
            &["k", "v"],
            vec![
                vec![Cell::Int(2), Cell::text("a")],
                vec![Cell::Int(1), Cell::text("b")],
                vec![Cell::Int(2), Cell::text("c")],
            ],
        );
        let d = t.dedup_on(&["k"], Keep::First);
        assert_eq!(d.column("v").unwrap(), vec![&Cell::text("a"), &Cell::text("b")]);
    }

    #[test]
    fn dedup_keep_last() {
        let t = table(
            &["k", "v"],
            vec![
                vec![Cell::Int(2), Cell::text("a")],
                vec![Cell::Int(1), Cell::text("b")],
                vec![Cell::Int(2), Cell::text("c")],
            ],
        );
        let d = t.dedup_on(&["k"], Keep::Last);
        assert_eq!(d.column("v").unwrap(), vec![&Cell::text("b"), &Cell::text("c")]);
    }

    #[test]
    fn dedup_treats_nulls_as_equal() {
        let t = table(&["k"], vec![vec![Cell::Null], vec![Cell::Null]]);
        assert_eq!(t.dedup_on(&["k"], Keep::First).len(), 1);
    }

    #[test]
    fn dedup_is_idempotent() {
        let t = table(
            &["a", "b"],
            vec![
                vec![Cell::Int(1), Cell::text("x")],
                vec![Cell::Float(1.0), Cell::text("x")],
                vec![Cell::Int(1), Cell::text("y")],
                vec![Cell::Null, Cell::Null],
                vec![Cell::Null, Cell::Null],
            ],
        );
        for keys in [vec!["a"], vec!["a", "b"], vec!["b"]] {
            for keep in [Keep::First, Keep::Last] {
                let once = t.dedup_on(&keys, keep);
                assert_eq!(once.dedup_on(&keys, keep), once, "keys {:?}", keys);
            }
        }
        let once = t.dedup_rows();
        assert_eq!(once.dedup_rows(), once);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn dedup_without_key_columns_is_identity() {
        let t = table(&["a"], vec![vec![Cell::Int(1)], vec![Cell::Int(1)]]);
        assert_eq!(t.dedup_on(&["missing"], Keep::First), t);
    }

    #[test]
    fn filter_keys_and_key_set() {
        let t = table(
            &["RunId"],
            vec![vec![Cell::Int(1)], vec![Cell::Null], vec![Cell::Int(3)]],
        );
        let keys = t.key_set("RunId");
        assert_eq!(keys.len(), 2);
        let only_three: HashSet<KeyPart> = [KeyPart::Int(3)].into_iter().collect();
        assert_eq!(t.filter_keys("RunId", &only_three).len(), 1);
    }
}
