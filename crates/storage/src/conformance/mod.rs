//! Conformance test suite for `BlobStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `BlobStore`
//! implementation can run to verify the behavior the batch locator relies on.
//! The suite covers:
//!
//! - **Listing**: every seeded object listed once, prefix filtering, nested paths
//! - **Probing**: present and absent paths, no false positives on prefixes
//! - **Download**: bytes returned unchanged, `NotFound` for absent paths
//!
//! # Usage
//!
//! Store tests call [`run_conformance_suite`] with a factory that builds a
//! fresh store holding exactly the given objects:
//!
//! ```ignore
//! use batchloc_storage::conformance::run_conformance_suite;
//!
//! #[test]
//! fn memory_conformance() {
//!     let report = run_conformance_suite(|blobs| {
//!         let mut store = MemoryBlobStore::new();
//!         for (path, data) in blobs {
//!             store.insert(path, data.to_vec());
//!         }
//!         store
//!     });
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod download;
mod list;
mod probe;

use std::fmt;

use crate::BlobStore;

/// Objects a factory must seed: `(path, bytes)` pairs.
pub type Seed<'a> = &'a [(&'a str, &'a [u8])];

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "list", "probe", "download").
    pub category: String,
    /// Test name (e.g. "list_returns_every_object").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a blob store.
///
/// The `factory` is called once per test with the objects that test needs,
/// and must return a fresh store containing exactly those objects.
pub fn run_conformance_suite<S, F>(factory: F) -> ConformanceReport
where
    S: BlobStore,
    F: Fn(Seed<'_>) -> S,
{
    let mut results = Vec::new();

    results.extend(list::run_list_tests(&factory));
    results.extend(probe::run_probe_tests(&factory));
    results.extend(download::run_download_tests(&factory));

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A container shaped like the production snapshot layout.
const SNAPSHOT_LAYOUT: &[(&str, &[u8])] = &[
    ("run.parquet", b"run"),
    ("tables/run_step.parquet", b"run_step"),
    ("tables/process_module.parquet", b"process_module"),
    ("delta/process/process.parquet", b"process"),
    ("readme.txt", b"not a table"),
];

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}
