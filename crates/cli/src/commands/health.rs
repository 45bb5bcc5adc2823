use serde::Serialize;

use crate::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct Health {
    success: bool,
    service: &'static str,
    status: &'static str,
}

pub(crate) fn cmd_health(output: OutputFormat, quiet: bool) {
    let health = Health {
        success: true,
        service: "Batch Location",
        status: "operational",
    };
    match output {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Text => {
            if !quiet {
                println!("{}: {}", health.service, health.status);
            }
        }
    }
}
