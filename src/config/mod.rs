//! Configuration management for marcport.
//!
//! marcport uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MARCPORT_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use marcport::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("marcport.toml")?;
//! println!("Staging under {}", config.export.tmp_root.display());
//! println!("Batch size: {}", config.export.batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [export]
//! tmp_root = "/tmp/marcport"
//! batch_size = 50
//! max_parallel_partitions = 4
//!
//! [source]
//! data_dir = "./data"
//! reference_data_dir = "./data/reference"
//!
//! [storage]
//! root = "/var/lib/marcport/objects"
//! scope = "diku"
//! base_url = "http://localhost:8080/files"
//! signing_key = "${MARCPORT_SIGNING_KEY}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, ExportConfig, LinksConfig, LoggingConfig, MarcportConfig, SourceConfig,
    StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
