//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "marcport.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing marcport configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set MARCPORT_SIGNING_KEY in the environment or a .env file");
                println!("  3. Put instances.jsonl (and friends) under the source data_dir");
                println!("  4. Validate configuration: marcport validate-config");
                println!("  5. Run export: marcport export --all");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# marcport configuration

[application]
log_level = "info"

[export]
tmp_root = "/tmp/marcport"
batch_size = 50
max_parallel_partitions = 4

[source]
data_dir = "./data"
reference_data_dir = "./data/reference"

[storage]
root = "./objects"
scope = "default"
base_url = "http://localhost:8080/files"
signing_key = "${MARCPORT_SIGNING_KEY}"

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# marcport configuration
#
# Every section except [storage] may be omitted.
# Values of the form ${VAR} are read from the environment, and any key can
# be overridden with MARCPORT_<SECTION>_<KEY>.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
log_level = "info"

# ============================================================================
# Export Pipeline
# ============================================================================
[export]
# Root of the per-job staging directories ({tmp_root}/{job_id}/)
tmp_root = "/tmp/marcport"

# Identifiers per record source call (1-500)
batch_size = 50

# Buffer size of each partition file writer in bytes
write_buffer_size = 65536

# Partitions of one job processed at the same time
max_parallel_partitions = 4

# Identifier ranges an entire-collection export is split into
partitions_per_job = 4

# Identifiers per partition file for id-list exports
records_per_file = 1000

# Artifact base name when the request does not name one
default_file_base_name = "quick-export"

# In-progress jobs without an update for this long are failed
job_expiry_minutes = 60

# ============================================================================
# Record Source
# ============================================================================
[source]
# JSON-lines files: instances.jsonl, holdings.jsonl, items.jsonl,
# authorities.jsonl, marc_bib.jsonl, marc_holdings.jsonl, marc_authority.jsonl
data_dir = "./data"

# Reference tables as {table}.json arrays (locations.json, materialTypes.json, ...)
reference_data_dir = "./data/reference"

# ============================================================================
# Object Storage
# ============================================================================
[storage]
# Directory uploaded artifacts are stored under
root = "./objects"

# First object path segment, usually the tenant
scope = "default"

# Base URL download links are built on
base_url = "http://localhost:8080/files"

# Key download links are signed with (use an environment variable)
signing_key = "${MARCPORT_SIGNING_KEY}"

# Lifetime of download links in seconds
download_url_ttl_seconds = 3600

# ============================================================================
# Logging
# ============================================================================
[logging]
# Write JSON logs to local files
local_enabled = true

# Directory of local log files
local_path = "./logs"

# Log rotation (daily, hourly, never)
local_rotation = "daily"

# ============================================================================
# Links
# ============================================================================
[links]
# Base of the inventory links attached to error log entries
inventory_base_url = "http://localhost:3000"

# Base of linked-data resource identifiers
linked_data_base_url = "http://localhost:8081"
"#
        .to_string()
    }
}
