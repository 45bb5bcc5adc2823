//! Schema-defensive Parquet reader.
//!
//! Only the wanted columns are decoded, located by position in the file
//! schema so files with repeated column names still read cleanly. Any
//! failure (download, footer, decode) turns into [`TableRead::Unavailable`]
//! carrying an empty table with the requested headers.

use std::collections::BTreeMap;

use arrow::array::temporal_conversions::as_datetime_with_timezone;
use arrow::array::timezone::Tz;
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, Decimal128Type, Float32Type,
    Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType,
    Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use batchloc_storage::{BlobStore, StorageError};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use thiserror::Error;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::{debug, info, warn};

use crate::schema::Column;
use crate::table::{Cell, Table};

/// Julian day number of 1970-01-01.
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
const NANOS_PER_DAY: i64 = 86_400_000_000_000;

/// Why a located snapshot could not be turned into a table.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("download failed: {0}")]
    Download(#[from] StorageError),

    #[error("invalid parquet: {0}")]
    Parquet(#[from] ParquetError),

    #[error("decode failed: {0}")]
    Arrow(#[from] ArrowError),
}

/// Outcome of reading one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRead {
    Loaded(Table),
    /// The snapshot could not be read. `table` is empty and carries the
    /// requested column names so joins downstream simply see no matches.
    Unavailable { table: Table, reason: String },
}

impl TableRead {
    pub fn is_loaded(&self) -> bool {
        matches!(self, TableRead::Loaded(_))
    }

    pub fn table(&self) -> &Table {
        match self {
            TableRead::Loaded(table) | TableRead::Unavailable { table, .. } => table,
        }
    }

    pub fn into_table(self) -> Table {
        match self {
            TableRead::Loaded(table) | TableRead::Unavailable { table, .. } => table,
        }
    }
}

/// Which physical columns to decode for a wanted column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// `(logical name, schema position)` in wanted order, resolved columns only.
    pub picks: Vec<(&'static str, usize)>,
    /// Column names that occur more than once in the file schema.
    pub duplicates: Vec<String>,
}

impl Projection {
    /// Resolve each wanted column against the file's top-level column names.
    ///
    /// Candidates resolve to the first position a name occurs at, so later
    /// duplicates of a name are never read.
    pub fn plan(present: &[String], wanted: &[Column]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for name in present {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        let duplicates = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let picks = wanted
            .iter()
            .filter_map(|col| col.resolve(present).map(|idx| (col.name, idx)))
            .collect();

        Projection { picks, duplicates }
    }

    /// Distinct schema positions, ascending (the order decoded columns come back in).
    pub fn roots(&self) -> Vec<usize> {
        let mut roots: Vec<usize> = self.picks.iter().map(|(_, idx)| *idx).collect();
        roots.sort_unstable();
        roots.dedup();
        roots
    }
}

/// Download `path` and decode the wanted columns, never failing.
pub fn read_columns(store: &dyn BlobStore, path: &str, wanted: &[Column]) -> TableRead {
    let result = store
        .get(path)
        .map_err(ReadError::from)
        .and_then(|bytes| decode(bytes, wanted));

    match result {
        Ok(table) => {
            info!(
                path,
                rows = table.len(),
                columns = ?table.columns(),
                "loaded snapshot"
            );
            TableRead::Loaded(table)
        }
        Err(e) => {
            warn!(path, error = %e, "snapshot unreadable; continuing with an empty table");
            let headers: Vec<&str> = wanted.iter().map(|c| c.name).collect();
            TableRead::Unavailable {
                table: Table::empty(&headers),
                reason: e.to_string(),
            }
        }
    }
}

/// Decode the wanted columns of an in-memory Parquet file.
///
/// The result holds the resolved columns only, under their logical names and
/// in wanted order. When none of the wanted columns are present, no data is
/// decoded and the result is an empty table with the wanted names as headers.
pub fn decode(bytes: Bytes, wanted: &[Column]) -> Result<Table, ReadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let present: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();

    let projection = Projection::plan(&present, wanted);
    if !projection.duplicates.is_empty() {
        warn!(
            duplicates = ?projection.duplicates,
            "schema repeats column names; reading first occurrences only"
        );
    }
    if projection.picks.is_empty() {
        debug!(present = ?present, "no wanted column present");
        let headers: Vec<&str> = wanted.iter().map(|c| c.name).collect();
        return Ok(Table::empty(&headers));
    }

    let roots = projection.roots();
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots.iter().copied());
    let reader = builder.with_projection(mask).build()?;

    // schema position -> position within each decoded batch
    let batch_pos: BTreeMap<usize, usize> =
        roots.iter().enumerate().map(|(i, r)| (*r, i)).collect();

    let columns: Vec<String> = projection.picks.iter().map(|(n, _)| n.to_string()).collect();
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for batch in reader {
        let batch = batch?;
        append_rows(&batch, &projection, &batch_pos, &mut rows);
    }
    Ok(Table::new(columns, rows))
}

fn append_rows(
    batch: &RecordBatch,
    projection: &Projection,
    batch_pos: &BTreeMap<usize, usize>,
    rows: &mut Vec<Vec<Cell>>,
) {
    let decoded: Vec<Vec<Cell>> = projection
        .picks
        .iter()
        .map(|(_, root)| match batch_pos.get(root) {
            Some(&pos) if pos < batch.num_columns() => cells(batch.column(pos).as_ref()),
            _ => vec![Cell::Null; batch.num_rows()],
        })
        .collect();

    let mut columns: Vec<_> = decoded.into_iter().map(|c| c.into_iter()).collect();
    for _ in 0..batch.num_rows() {
        rows.push(
            columns
                .iter_mut()
                .map(|c| c.next().unwrap_or(Cell::Null))
                .collect(),
        );
    }
}

// ──────────────────────────────────────────────
// Arrow → Cell
// ──────────────────────────────────────────────

fn each<F>(array: &dyn Array, f: F) -> Vec<Cell>
where
    F: Fn(usize) -> Cell,
{
    (0..array.len())
        .map(|i| if array.is_null(i) { Cell::Null } else { f(i) })
        .collect()
}

fn ints<T>(array: &dyn Array) -> Vec<Cell>
where
    T: ArrowPrimitiveType,
    T::Native: Into<i64>,
{
    let typed = array.as_primitive::<T>();
    each(array, |i| Cell::Int(typed.value(i).into()))
}

/// Zoned timestamps become wall-clock time in their own zone; naive ones
/// are read as UTC.
fn timestamps<T>(array: &dyn Array, nanos_per_unit: i128, zone: Option<&str>) -> Vec<Cell>
where
    T: ArrowPrimitiveType<Native = i64>,
{
    let typed = array.as_primitive::<T>();
    let tz = zone.and_then(|name| match name.parse::<Tz>() {
        Ok(tz) => Some(tz),
        Err(e) => {
            warn!(zone = name, error = %e, "unrecognized time zone; using UTC wall time");
            None
        }
    });
    each(array, |i| {
        let raw = typed.value(i);
        let nanos = match tz {
            Some(tz) => as_datetime_with_timezone::<T>(raw, tz)
                .and_then(|local| local.naive_local().and_utc().timestamp_nanos_opt())
                .map(i128::from),
            None => Some(i128::from(raw) * nanos_per_unit),
        };
        nanos
            .and_then(instant_from_nanos)
            .map(Cell::DateTime)
            .unwrap_or(Cell::Null)
    })
}

fn times(array: &dyn Array, nanos: impl Fn(usize) -> i64) -> Vec<Cell> {
    each(array, |i| {
        time_from_nanos(nanos(i)).map(Cell::Time).unwrap_or(Cell::Null)
    })
}

/// Convert one Arrow array into cells.
///
/// Integers, floats, strings, booleans, dates, times and timestamps map to
/// their natural [`Cell`] variant; timestamps become wall-clock instants in
/// the column's time zone (UTC when it has none).
/// Anything else is rendered as text.
pub fn cells(array: &dyn Array) -> Vec<Cell> {
    match array.data_type() {
        DataType::Null => vec![Cell::Null; array.len()],
        DataType::Boolean => {
            let typed = array.as_boolean();
            each(array, |i| Cell::Bool(typed.value(i)))
        }
        DataType::Int8 => ints::<Int8Type>(array),
        DataType::Int16 => ints::<Int16Type>(array),
        DataType::Int32 => ints::<Int32Type>(array),
        DataType::Int64 => ints::<Int64Type>(array),
        DataType::UInt8 => ints::<UInt8Type>(array),
        DataType::UInt16 => ints::<UInt16Type>(array),
        DataType::UInt32 => ints::<UInt32Type>(array),
        DataType::UInt64 => {
            let typed = array.as_primitive::<UInt64Type>();
            each(array, |i| {
                let v = typed.value(i);
                i64::try_from(v).map(Cell::Int).unwrap_or(Cell::Float(v as f64))
            })
        }
        DataType::Float32 => {
            let typed = array.as_primitive::<Float32Type>();
            each(array, |i| Cell::Float(f64::from(typed.value(i))))
        }
        DataType::Float64 => {
            let typed = array.as_primitive::<Float64Type>();
            each(array, |i| Cell::Float(typed.value(i)))
        }
        DataType::Decimal128(_, scale) => {
            let typed = array.as_primitive::<Decimal128Type>();
            let scale = i32::from(*scale);
            each(array, |i| {
                let raw = typed.value(i);
                match (scale, i64::try_from(raw)) {
                    (0, Ok(v)) => Cell::Int(v),
                    _ => Cell::Float(raw as f64 / 10f64.powi(scale)),
                }
            })
        }
        DataType::Utf8 => {
            let typed = array.as_string::<i32>();
            each(array, |i| Cell::text(typed.value(i)))
        }
        DataType::LargeUtf8 => {
            let typed = array.as_string::<i64>();
            each(array, |i| Cell::text(typed.value(i)))
        }
        DataType::Utf8View => {
            let typed = array.as_string_view();
            each(array, |i| Cell::text(typed.value(i)))
        }
        DataType::Date32 => {
            let typed = array.as_primitive::<Date32Type>();
            each(array, |i| {
                UNIX_EPOCH_JULIAN_DAY
                    .checked_add(typed.value(i))
                    .and_then(|jd| Date::from_julian_day(jd).ok())
                    .map(Cell::Date)
                    .unwrap_or(Cell::Null)
            })
        }
        DataType::Date64 => {
            let typed = array.as_primitive::<Date64Type>();
            each(array, |i| {
                instant_from_nanos(i128::from(typed.value(i)) * 1_000_000)
                    .map(|dt| Cell::Date(dt.date()))
                    .unwrap_or(Cell::Null)
            })
        }
        DataType::Timestamp(TimeUnit::Second, zone) => {
            timestamps::<TimestampSecondType>(array, 1_000_000_000, zone.as_deref())
        }
        DataType::Timestamp(TimeUnit::Millisecond, zone) => {
            timestamps::<TimestampMillisecondType>(array, 1_000_000, zone.as_deref())
        }
        DataType::Timestamp(TimeUnit::Microsecond, zone) => {
            timestamps::<TimestampMicrosecondType>(array, 1_000, zone.as_deref())
        }
        DataType::Timestamp(TimeUnit::Nanosecond, zone) => {
            timestamps::<TimestampNanosecondType>(array, 1, zone.as_deref())
        }
        DataType::Time32(TimeUnit::Second) => {
            let typed = array.as_primitive::<Time32SecondType>();
            times(array, |i| i64::from(typed.value(i)) * 1_000_000_000)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            let typed = array.as_primitive::<Time32MillisecondType>();
            times(array, |i| i64::from(typed.value(i)) * 1_000_000)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let typed = array.as_primitive::<Time64MicrosecondType>();
            times(array, |i| typed.value(i).saturating_mul(1_000))
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            let typed = array.as_primitive::<Time64NanosecondType>();
            times(array, |i| typed.value(i))
        }
        _ => each(array, |i| {
            array_value_to_string(array, i)
                .map(Cell::Text)
                .unwrap_or(Cell::Null)
        }),
    }
}

fn instant_from_nanos(nanos: i128) -> Option<PrimitiveDateTime> {
    let utc = OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?;
    Some(PrimitiveDateTime::new(utc.date(), utc.time()))
}

fn time_from_nanos(nanos: i64) -> Option<Time> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return None;
    }
    let secs = nanos / 1_000_000_000;
    let sub = (nanos % 1_000_000_000) as u32;
    Time::from_hms_nano((secs / 3600) as u8, ((secs / 60) % 60) as u8, (secs % 60) as u8, sub).ok()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{
        ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, StringArray,
        Time64MicrosecondArray, TimestampMillisecondArray,
    };
    use arrow::datatypes::{Field, Schema};
    use batchloc_storage::MemoryBlobStore;
    use parquet::arrow::ArrowWriter;
    use time::macros::{date, datetime, time};

    use super::*;
    use crate::schema::SnapshotTable;

    fn parquet(columns: Vec<(&str, ArrayRef)>) -> Bytes {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, a)| a).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        Bytes::from(buf)
    }

    fn strings(values: &[Option<&str>]) -> ArrayRef {
        Arc::new(StringArray::from(values.to_vec()))
    }

    fn ints64(values: &[Option<i64>]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    #[test]
    fn reads_only_wanted_columns_under_logical_names() {
        let bytes = parquet(vec![
            ("Id", ints64(&[Some(1), Some(2)])),
            ("Noise", strings(&[Some("x"), Some("y")])),
            ("Name", strings(&[Some("Etch"), None])),
            ("CategoryId", Arc::new(Int32Array::from(vec![Some(3), Some(4)]))),
        ]);
        let t = decode(bytes, SnapshotTable::Process.columns()).unwrap();
        assert_eq!(t.columns(), &["ProcessId", "ProcessName", "CategoryId"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(0, "ProcessName"), &Cell::text("Etch"));
        assert_eq!(t.value(1, "ProcessName"), &Cell::Null);
        assert_eq!(t.value(1, "CategoryId"), &Cell::Int(4));
    }

    #[test]
    fn duplicate_columns_read_first_occurrence() {
        let bytes = parquet(vec![
            ("Id", ints64(&[Some(50), Some(60)])),
            ("ProcessId", ints64(&[Some(9), Some(10)])),
            ("Id", ints64(&[Some(-1), Some(-2)])),
            ("ModuleId", ints64(&[Some(5), Some(6)])),
        ]);
        let t = decode(bytes, SnapshotTable::ProcessModule.columns()).unwrap();
        assert_eq!(t.columns(), &["Id", "ProcessId", "ModuleId"]);
        assert_eq!(t.column("Id").unwrap(), vec![&Cell::Int(50), &Cell::Int(60)]);
        assert_eq!(t.value(1, "ModuleId"), &Cell::Int(6));
    }

    #[test]
    fn projection_plan_flags_duplicates() {
        let present: Vec<String> = ["Name", "Id", "Name"].iter().map(|s| s.to_string()).collect();
        let plan = Projection::plan(&present, SnapshotTable::ProcessCategory.columns());
        assert_eq!(plan.duplicates, vec!["Name".to_string()]);
        assert_eq!(plan.picks, vec![("CategoryId", 1), ("CategoryName", 0)]);
        assert_eq!(plan.roots(), vec![0, 1]);
    }

    #[test]
    fn no_overlap_gives_empty_table_with_headers() {
        let bytes = parquet(vec![("Other", ints64(&[Some(1)]))]);
        let t = decode(bytes, SnapshotTable::ProcessType.columns()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.columns(), &["ProcessTypeId", "ProcessTypeName"]);
    }

    #[test]
    fn typed_columns_convert() {
        let bytes = parquet(vec![
            ("RunId", ints64(&[Some(101)])),
            ("Sequence", Arc::new(Float64Array::from(vec![Some(2.0)]))),
            ("StartDate", Arc::new(Date32Array::from(vec![Some(19_727)]))),
            (
                "StartTime",
                Arc::new(Time64MicrosecondArray::from(vec![Some(36_000_000_000)])),
            ),
            (
                "FinishDate",
                Arc::new(TimestampMillisecondArray::from(vec![Some(1_704_448_800_000)])),
            ),
        ]);
        let t = decode(bytes, SnapshotTable::RunStep.columns()).unwrap();
        assert_eq!(t.value(0, "Sequence"), &Cell::Float(2.0));
        assert_eq!(t.value(0, "StartDate"), &Cell::Date(date!(2024 - 01 - 05)));
        assert_eq!(t.value(0, "StartTime"), &Cell::Time(time!(10:00)));
        assert_eq!(
            t.value(0, "FinishDate"),
            &Cell::DateTime(datetime!(2024-01-05 10:00:00))
        );
    }

    #[test]
    fn zoned_timestamps_keep_local_wall_time() {
        // 2024-01-05 10:00:00 UTC
        let utc_millis = 1_704_448_800_000;
        let fixed = TimestampMillisecondArray::from(vec![Some(utc_millis), None])
            .with_timezone("+02:00");
        assert_eq!(
            cells(&fixed),
            vec![Cell::DateTime(datetime!(2024-01-05 12:00:00)), Cell::Null]
        );

        let named = TimestampMillisecondArray::from(vec![Some(utc_millis)])
            .with_timezone("America/New_York");
        assert_eq!(cells(&named), vec![Cell::DateTime(datetime!(2024-01-05 05:00:00))]);

        let naive = TimestampMillisecondArray::from(vec![Some(utc_millis)]);
        assert_eq!(cells(&naive), vec![Cell::DateTime(datetime!(2024-01-05 10:00:00))]);
    }

    #[test]
    fn zoned_timestamps_survive_a_parquet_round() {
        let zoned = TimestampMillisecondArray::from(vec![Some(1_704_448_800_000)])
            .with_timezone("-05:00");
        let bytes = parquet(vec![("RunId", ints64(&[Some(1)])), ("FinishDate", Arc::new(zoned))]);
        let t = decode(bytes, SnapshotTable::RunStep.columns()).unwrap();
        assert_eq!(
            t.value(0, "FinishDate"),
            &Cell::DateTime(datetime!(2024-01-05 05:00:00))
        );
    }

    #[test]
    fn garbage_bytes_are_unavailable_with_headers() {
        let store = MemoryBlobStore::new().with_blob("run.parquet", &b"not parquet"[..]);
        let read = read_columns(&store, "run.parquet", SnapshotTable::Run.columns());
        assert!(!read.is_loaded());
        match &read {
            TableRead::Unavailable { table, reason } => {
                assert!(table.is_empty());
                assert_eq!(table.columns()[0], "RunId");
                assert!(reason.contains("invalid parquet"), "{}", reason);
            }
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn missing_blob_is_unavailable() {
        let store = MemoryBlobStore::new();
        let read = read_columns(&store, "run.parquet", SnapshotTable::Run.columns());
        match read {
            TableRead::Unavailable { reason, .. } => assert!(reason.contains("download failed")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn loaded_through_store() {
        let bytes = parquet(vec![
            ("TypeId", ints64(&[Some(7)])),
            ("CategoryId", ints64(&[Some(3)])),
        ]);
        let store = MemoryBlobStore::new().with_blob("tables/process_type_category.parquet", bytes);
        let read = read_columns(
            &store,
            "tables/process_type_category.parquet",
            SnapshotTable::ProcessTypeCategory.columns(),
        );
        assert!(read.is_loaded());
        assert_eq!(read.into_table().value(0, "TypeId"), &Cell::Int(7));
    }

    #[test]
    fn time_bounds() {
        assert_eq!(time_from_nanos(-1), None);
        assert_eq!(time_from_nanos(NANOS_PER_DAY), None);
        assert_eq!(time_from_nanos(3_661_000_000_000), Some(time!(01:01:01)));
    }
}
