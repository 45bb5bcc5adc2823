use super::{Seed, TestResult, SNAPSHOT_LAYOUT};
use crate::{BlobStore, StorageError};

pub(super) fn run_download_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    vec![
        TestResult::from_result(
            "download",
            "get_returns_seeded_bytes",
            get_returns_seeded_bytes(factory),
        ),
        TestResult::from_result(
            "download",
            "get_empty_object",
            get_empty_object(factory),
        ),
        TestResult::from_result(
            "download",
            "get_absent_is_not_found",
            get_absent_is_not_found(factory),
        ),
        TestResult::from_result(
            "download",
            "not_found_carries_path",
            not_found_carries_path(factory),
        ),
    ]
}

// ── 1. Downloads return exactly the stored bytes ─────────────────────────────

fn get_returns_seeded_bytes<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    for (path, data) in SNAPSHOT_LAYOUT {
        let got = s.get(path).map_err(|e| format!("get({:?}): {}", path, e))?;
        if &got[..] != *data {
            return Err(format!(
                "get({:?}) returned {} bytes, expected {}",
                path,
                got.len(),
                data.len()
            ));
        }
    }
    Ok(())
}

// ── 2. A zero-length object downloads as empty, not as missing ───────────────

fn get_empty_object<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(&[("empty.parquet", b"")]);
    let got = s.get("empty.parquet").map_err(|e| e.to_string())?;
    if !got.is_empty() {
        return Err(format!("expected 0 bytes, got {}", got.len()));
    }
    Ok(())
}

// ── 3. Absent objects are NotFound ───────────────────────────────────────────

fn get_absent_is_not_found<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    match s.get("process_type.parquet") {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other.map(|b| b.len()))),
    }
}

// ── 4. NotFound names the requested path ─────────────────────────────────────

fn not_found_carries_path<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(&[]);
    match s.get("tables/process_type.parquet") {
        Err(StorageError::NotFound { path }) => {
            if path != "tables/process_type.parquet" {
                return Err(format!(
                    "expected path \"tables/process_type.parquet\", got \"{}\"",
                    path
                ));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other.map(|b| b.len()))),
    }
}
