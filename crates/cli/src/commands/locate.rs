use std::process;

use batchloc_core::{locate_batches, DataEnvelope, LocationReport};

use crate::config::SourceArgs;
use crate::{print_json, report_error, OutputFormat};

/// Open the store and run the whole pipeline, exiting on failure.
fn run_pipeline(source: &SourceArgs, output: OutputFormat, quiet: bool) -> LocationReport {
    let store = match source.open_store() {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("cannot open snapshot store: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match locate_batches(store.as_ref(), &source.locator_config()) {
        Ok(report) => report,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn warn_unavailable(report: &LocationReport, quiet: bool) {
    if quiet {
        return;
    }
    for (table, reason) in &report.unavailable {
        eprintln!("warning: {} could not be read ({}); its names are left empty", table, reason);
    }
}

pub(crate) fn cmd_locate(source: &SourceArgs, output: OutputFormat, quiet: bool) {
    let report = run_pipeline(source, output, quiet);

    match output {
        OutputFormat::Json => print_json(&DataEnvelope::ok(report.batches)),
        OutputFormat::Text => {
            warn_unavailable(&report, quiet);
            if quiet {
                return;
            }
            println!("Batch locations ({})", report.batches.len());
            for b in &report.batches {
                let started = if b.started_at.is_empty() { "-" } else { b.started_at.as_str() };
                let finished = if b.finished_at.is_empty() { "-" } else { b.finished_at.as_str() };
                println!(
                    "  {:>6}  {:<12} {:<24} {:<12} {} / {} / {}  [{}]  {} → {}",
                    b.batch_id,
                    b.batch_number,
                    b.batch_name,
                    b.batch_status,
                    b.process_name,
                    b.category_name,
                    b.process_type_name,
                    b.process_status,
                    started,
                    finished,
                );
            }
        }
    }
}

pub(crate) fn cmd_steps(source: &SourceArgs, output: OutputFormat, quiet: bool) {
    let report = run_pipeline(source, output, quiet);

    match output {
        OutputFormat::Json => print_json(&DataEnvelope::ok(report.steps)),
        OutputFormat::Text => {
            warn_unavailable(&report, quiet);
            if quiet {
                return;
            }
            println!("Run steps ({})", report.steps.len());
            for s in &report.steps {
                let id = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
                println!(
                    "  run {:>6}  module {:>6}  {} / {} / {}",
                    id(s.run_id),
                    id(s.process_module_id),
                    s.process_name,
                    s.category_name,
                    s.process_type_name,
                );
            }
        }
    }
}
