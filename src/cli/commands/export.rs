//! Export command implementation
//!
//! This module implements the `export` command, which runs one export job
//! against the local record source configured in `[source]`.

use crate::config::load_config;
use crate::core::export::{ExportCoordinator, ExportServices};
use crate::domain::{ExportError, ExportRequest, JobStatus, MappingProfile, RecordType};
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Record type to export (instance, holdings, authority)
    #[arg(short = 't', long, default_value = "instance", value_parser = parse_record_type)]
    pub record_type: RecordType,

    /// File with one identifier per line
    #[arg(long, value_name = "FILE", conflicts_with = "all", required_unless_present = "all")]
    pub ids: Option<PathBuf>,

    /// Export every record of the record type
    #[arg(long)]
    pub all: bool,

    /// Mapping profile JSON file (defaults to the reserved profile of the record type)
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Base name of the produced file
    #[arg(long)]
    pub file_name: Option<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_record_type(value: &str) -> Result<RecordType, String> {
    value.parse()
}

/// Read identifiers, one per line
///
/// Blank lines and `#` comments are skipped, surrounding quotes are removed.
pub fn read_ids(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read identifier file {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_matches('"').to_string())
        .collect())
}

/// Read a mapping profile from a JSON file
pub fn read_profile(path: &Path) -> anyhow::Result<MappingProfile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping profile {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid mapping profile {}", path.display()))
}

impl ExportArgs {
    fn request(&self) -> anyhow::Result<ExportRequest> {
        let mut request = match &self.ids {
            Some(path) if !self.all => ExportRequest::by_ids(self.record_type, read_ids(path)?),
            _ => ExportRequest::entire_collection(self.record_type),
        };
        request.file_name = self.file_name.clone();
        request.created_by = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
        Ok(request)
    }

    /// Execute the export command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Configuration could not be loaded");
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        let request = self.request()?;
        let profile = self.profile.as_deref().map(read_profile).transpose()?;

        if !self.yes {
            println!("Export Configuration:");
            println!("  Record type: {}", request.record_type);
            if request.all {
                println!("  Scope: entire collection");
            } else {
                println!("  Identifiers: {}", request.ids.len());
            }
            println!(
                "  Mapping profile: {}",
                profile.as_ref().map_or("default", |p| p.name.as_str())
            );
            println!("  Source: {}", config.source.data_dir.display());
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let services = ExportServices::from_config(&config)
            .context("Failed to initialize the local record source")?;
        let coordinator = ExportCoordinator::new(&config, services);

        println!("Starting export...");
        println!();

        let summary = match coordinator.execute(request, profile).await {
            Ok(summary) => summary,
            Err(e @ ExportError::Validation(_)) => {
                eprintln!("Invalid export request: {e}");
                return Ok(2);
            }
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        println!("Export Summary:");
        println!("  Job: {} (#{})", summary.job_id, summary.job_hrid);
        println!("  Status: {}", summary.status);
        println!("  Partitions: {}", summary.partitions.len());
        println!("  Exported: {}", summary.exported);
        println!("  Failed: {}", summary.failed);
        println!("  Not found: {}", summary.not_found.len());
        println!("  Duplicate MARC records: {}", summary.duplicated_srs);
        println!("  Error log entries: {}", summary.error_count);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Success Rate: {:.2}%", summary.success_rate());
        if let Some(file_name) = &summary.file_name {
            println!("  File: {file_name}");
        }
        if let Some(url) = &summary.download_url {
            println!("  Download: {url}");
        }
        println!();

        let exit_code = match summary.status {
            JobStatus::Completed => 0,
            JobStatus::CompletedWithErrors => 1,
            _ => 5,
        };
        Ok(exit_code)
    }
}
