use super::{sorted, Seed, TestResult, SNAPSHOT_LAYOUT};
use crate::BlobStore;

pub(super) fn run_list_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    vec![
        TestResult::from_result(
            "list",
            "list_empty_store",
            list_empty_store(factory),
        ),
        TestResult::from_result(
            "list",
            "list_returns_every_object",
            list_returns_every_object(factory),
        ),
        TestResult::from_result(
            "list",
            "list_has_no_duplicates",
            list_has_no_duplicates(factory),
        ),
        TestResult::from_result(
            "list",
            "list_prefix_filters",
            list_prefix_filters(factory),
        ),
        TestResult::from_result(
            "list",
            "list_unmatched_prefix_is_empty",
            list_unmatched_prefix_is_empty(factory),
        ),
    ]
}

// ── 1. An empty store lists nothing ──────────────────────────────────────────

fn list_empty_store<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(&[]);
    let listed = s.list(None).map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected empty listing, got {:?}", listed));
    }
    Ok(())
}

// ── 2. Every seeded object is listed with its full path ──────────────────────

fn list_returns_every_object<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    let listed = sorted(s.list(None).map_err(|e| e.to_string())?);
    let expected = sorted(SNAPSHOT_LAYOUT.iter().map(|(p, _)| p.to_string()).collect());
    if listed != expected {
        return Err(format!("expected {:?}, got {:?}", expected, listed));
    }
    Ok(())
}

// ── 3. No path appears twice ─────────────────────────────────────────────────

fn list_has_no_duplicates<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    let listed = s.list(None).map_err(|e| e.to_string())?;
    let mut deduped = sorted(listed.clone());
    deduped.dedup();
    if deduped.len() != listed.len() {
        return Err(format!("listing contains duplicates: {:?}", listed));
    }
    Ok(())
}

// ── 4. A prefix keeps only objects under it ──────────────────────────────────

fn list_prefix_filters<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    let listed = sorted(s.list(Some("tables/")).map_err(|e| e.to_string())?);
    let expected = vec![
        "tables/process_module.parquet".to_string(),
        "tables/run_step.parquet".to_string(),
    ];
    if listed != expected {
        return Err(format!("expected {:?}, got {:?}", expected, listed));
    }
    Ok(())
}

// ── 5. A prefix nothing lives under yields an empty listing, not an error ────

fn list_unmatched_prefix_is_empty<S, F>(factory: &F) -> Result<(), String>
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let s = factory(SNAPSHOT_LAYOUT);
    let listed = s.list(Some("archive/")).map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err(format!("expected empty listing, got {:?}", listed));
    }
    Ok(())
}
