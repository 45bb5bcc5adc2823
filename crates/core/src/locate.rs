//! Finding each snapshot table in the store.
//!
//! The store is listed once; each table is then matched against the listing
//! by file name. Tables the listing does not resolve (or every table, when
//! listing is off or fails) are probed at their candidate paths in order.

use std::collections::BTreeMap;

use batchloc_storage::BlobStore;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::schema::SnapshotTable;

/// How discovery is allowed to search.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Restricts the listing to paths under this prefix. Candidate probes are not prefixed.
    pub prefix: Option<String>,
    /// When false, the store is never listed and every table is probed.
    pub allow_listing: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            prefix: None,
            allow_listing: true,
        }
    }
}

/// How a table's path was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    Listing,
    Probe,
}

impl Discovery {
    pub fn as_str(self) -> &'static str {
        match self {
            Discovery::Listing => "listing",
            Discovery::Probe => "probe",
        }
    }
}

/// Resolved path of every snapshot table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLocations {
    found: BTreeMap<SnapshotTable, (String, Discovery)>,
}

impl TableLocations {
    pub fn path(&self, table: SnapshotTable) -> Option<&str> {
        self.found.get(&table).map(|(p, _)| p.as_str())
    }

    pub fn discovery(&self, table: SnapshotTable) -> Option<Discovery> {
        self.found.get(&table).map(|(_, d)| *d)
    }

    /// `(table, path)` in table-name order.
    pub fn iter(&self) -> impl Iterator<Item = (SnapshotTable, &str)> {
        self.found.iter().map(|(t, (p, _))| (*t, p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

enum Listing {
    Disabled,
    Listed(Vec<String>),
    Failed(String),
}

impl Listing {
    fn summary(&self) -> String {
        match self {
            Listing::Disabled => "listing disabled".to_string(),
            Listing::Listed(names) => format!("listing had {} blobs, none matched", names.len()),
            Listing::Failed(e) => format!("listing failed: {}", e),
        }
    }
}

/// Pick a table's snapshot out of a container listing.
///
/// A path whose last segment equals `<table>.parquet` (ignoring case) wins;
/// failing that, any path ending in `<table>.parquet`. Ties go to the first
/// path in listing order.
pub fn pick_from_listing(listing: &[String], table: SnapshotTable) -> Option<&str> {
    let leaf = table.file_name().to_lowercase();
    let nested = format!("/{}", leaf);
    let lowered: Vec<String> = listing.iter().map(|p| p.to_lowercase()).collect();

    lowered
        .iter()
        .position(|p| *p == leaf || p.ends_with(&nested))
        .or_else(|| lowered.iter().position(|p| p.ends_with(&leaf)))
        .map(|idx| listing[idx].as_str())
}

/// Probe candidate paths in order; returns the first present one.
///
/// Every probe outcome is appended to `trail` for error reporting.
fn probe(store: &dyn BlobStore, table: SnapshotTable, trail: &mut Vec<String>) -> Option<String> {
    for candidate in table.candidate_paths() {
        match store.exists(&candidate) {
            Ok(true) => {
                debug!(table = %table, path = %candidate, "probe hit");
                return Some(candidate);
            }
            Ok(false) => {
                debug!(table = %table, path = %candidate, "probe miss");
                trail.push(format!("{}: absent", candidate));
            }
            Err(e) => {
                debug!(table = %table, path = %candidate, error = %e, "probe failed");
                trail.push(format!("{}: {}", candidate, e));
            }
        }
    }
    None
}

/// Resolve the path of every snapshot table, in table-name order.
///
/// Fails on the first table that neither the listing nor any probe finds.
pub fn locate_all(store: &dyn BlobStore, config: &LocatorConfig) -> Result<TableLocations, PipelineError> {
    let listing = if config.allow_listing {
        match store.list(config.prefix.as_deref()) {
            Ok(names) => {
                info!(store = %store.describe(), blobs = names.len(), "listed snapshot container");
                Listing::Listed(names)
            }
            Err(e) => {
                warn!(store = %store.describe(), error = %e, "listing failed; probing candidate paths");
                Listing::Failed(e.to_string())
            }
        }
    } else {
        Listing::Disabled
    };

    let mut locations = TableLocations::default();
    for table in SnapshotTable::ALL {
        if let Listing::Listed(names) = &listing {
            if let Some(path) = pick_from_listing(names, table) {
                debug!(table = %table, path, "matched in listing");
                locations
                    .found
                    .insert(table, (path.to_string(), Discovery::Listing));
                continue;
            }
        }

        let mut trail = Vec::new();
        match probe(store, table, &mut trail) {
            Some(path) => {
                locations.found.insert(table, (path, Discovery::Probe));
            }
            None => {
                let detail = format!("{}; probed {}", listing.summary(), trail.join(", "));
                warn!(table = %table, detail = %detail, "snapshot not found");
                return Err(PipelineError::MissingTable { table, detail });
            }
        }
    }

    info!(tables = locations.len(), "located all snapshot tables");
    Ok(locations)
}
