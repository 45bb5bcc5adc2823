use super::{Seed, TestResult, SNAPSHOT_LAYOUT};
use crate::BlobStore;

pub(super) fn run_probe_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    vec![
        TestResult::from_result(
            "probe",
            "exists_true_for_seeded_paths",
            exists_true_for_seeded_paths(factory),
        ),
        TestResult::from_result(
            "probe",
            "exists_false_for_absent_path",
            exists_false_for_absent_path(factory),
        ),
        TestResult::from_result(
            "probe",
            "exists_false_for_directory_prefix",
            exists_false_for_directory_prefix(factory),
        ),
        TestResult::from_result(
            "probe",
            "exists_mixed_case_path",
            exists_mixed_case_path(factory),
        ),
    ]
}

// ── 1. Every seeded path probes as present ───────────────────────────────────

fn exists_true_for_seeded_paths<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    for (path, _) in SNAPSHOT_LAYOUT {
        match s.exists(path) {
            Ok(true) => {}
            other => return Err(format!("exists({:?}) returned {:?}", path, other)),
        }
    }
    Ok(())
}

// ── 2. An absent path probes as missing without erroring ─────────────────────

fn exists_false_for_absent_path<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    match s.exists("parquet/run.parquet") {
        Ok(false) => Ok(()),
        other => Err(format!("expected Ok(false), got {:?}", other)),
    }
}

// ── 3. A directory-like prefix is not an object ──────────────────────────────

fn exists_false_for_directory_prefix<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    match s.exists("tables") {
        Ok(false) => Ok(()),
        other => Err(format!("expected Ok(false) for 'tables', got {:?}", other)),
    }
}

// ── 4. Mixed-case paths probe as stored ──────────────────────────────────────

fn exists_mixed_case_path<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(&[("Tables/Run.parquet", b"run")]);
    match s.exists("Tables/Run.parquet") {
        Ok(true) => {}
        other => return Err(format!("exact path: expected Ok(true), got {:?}", other)),
    }
    Ok(())
}
