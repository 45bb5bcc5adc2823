use std::process;

use batchloc_core::{locate_all, DataEnvelope};
use serde::Serialize;

use crate::config::SourceArgs;
use crate::{print_json, report_error, OutputFormat};

#[derive(Debug, Serialize)]
struct TableSource {
    table: String,
    path: String,
    discovery: &'static str,
}

pub(crate) fn cmd_tables(source: &SourceArgs, output: OutputFormat, quiet: bool) {
    let store = match source.open_store() {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("cannot open snapshot store: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let locations = match locate_all(store.as_ref(), &source.locator_config()) {
        Ok(l) => l,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let rows: Vec<TableSource> = locations
        .iter()
        .map(|(table, path)| TableSource {
            table: table.name().to_string(),
            path: path.to_string(),
            discovery: locations.discovery(table).map_or("", |d| d.as_str()),
        })
        .collect();

    match output {
        OutputFormat::Json => print_json(&DataEnvelope::ok(rows)),
        OutputFormat::Text => {
            if quiet {
                return;
            }
            println!("Snapshot tables in {}", store.describe());
            for row in &rows {
                println!("  {:<24} {}  ({})", row.table, row.path, row.discovery);
            }
        }
    }
}
