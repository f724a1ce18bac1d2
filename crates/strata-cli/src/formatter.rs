//! Output formatting: a human-readable table (the default) or JSON, per
//! §6's "machine-readable on success, human-readable table otherwise".

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use strata_core::Version;
use strata_engine::ScrubReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn print_versions(versions: &[Version], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(versions).expect("versions serialize"));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["uid", "volume", "snapshot", "status", "size", "date", "protected"]);
            for v in versions {
                table.add_row(vec![
                    Cell::new(v.uid_string()),
                    Cell::new(&v.volume),
                    Cell::new(&v.snapshot),
                    Cell::new(v.status.as_str()),
                    Cell::new(v.size),
                    Cell::new(v.date),
                    Cell::new(v.protected),
                ]);
            }
            println!("{table}");
        }
    }
}

pub fn print_scrub_report(report: &ScrubReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({"checked": report.checked, "invalid": report.invalid})
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec!["checked", "invalid"]);
            table.add_row(vec![Cell::new(report.checked), Cell::new(report.invalid)]);
            println!("{table}");
        }
    }
}

pub fn print_ids(label: &str, ids: &[u64], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ label: ids }));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_header(vec![label]);
            for id in ids {
                table.add_row(vec![Cell::new(id)]);
            }
            println!("{table}");
        }
    }
}
