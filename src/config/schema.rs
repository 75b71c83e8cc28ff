//! Configuration schema types
//!
//! This module defines the configuration structure for marcport. Every section
//! except `[storage]` can be omitted and falls back to its defaults.

use crate::config::SecretString;
use crate::domain::validate_file_base_name;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main marcport configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarcportConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Export pipeline settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Local record source
    #[serde(default)]
    pub source: SourceConfig,

    /// Object storage for uploaded artifacts
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Links embedded in error logs and linked-data output
    #[serde(default)]
    pub links: LinksConfig,
}

impl MarcportConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.export.validate()?;
        self.source.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.links.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root of per-job temporary directories
    #[serde(default = "default_tmp_root")]
    pub tmp_root: PathBuf,

    /// Identifiers per record provider call (default: 50)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Buffer size of each local staging writer in bytes
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Partitions processed at once within a job
    #[serde(default = "default_max_parallel_partitions")]
    pub max_parallel_partitions: usize,

    /// Number of identifier ranges for entire-collection exports
    #[serde(default = "default_partitions_per_job")]
    pub partitions_per_job: usize,

    /// Identifiers per partition file for id-list exports
    #[serde(default = "default_records_per_file")]
    pub records_per_file: usize,

    /// Artifact base name when the request does not name one
    #[serde(default = "default_file_base_name")]
    pub default_file_base_name: String,

    /// Minutes without progress after which an in-progress job is failed
    #[serde(default = "default_job_expiry_minutes")]
    pub job_expiry_minutes: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tmp_root: default_tmp_root(),
            batch_size: default_batch_size(),
            write_buffer_size: default_write_buffer_size(),
            max_parallel_partitions: default_max_parallel_partitions(),
            partitions_per_job: default_partitions_per_job(),
            records_per_file: default_records_per_file(),
            default_file_base_name: default_file_base_name(),
            job_expiry_minutes: default_job_expiry_minutes(),
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > 500 {
            return Err(format!(
                "export.batch_size must be between 1 and 500, got {}",
                self.batch_size
            ));
        }

        if self.write_buffer_size == 0 {
            return Err("export.write_buffer_size must be > 0".to_string());
        }

        if self.max_parallel_partitions == 0 {
            return Err("export.max_parallel_partitions must be > 0".to_string());
        }

        if self.partitions_per_job == 0 {
            return Err("export.partitions_per_job must be > 0".to_string());
        }

        if self.records_per_file == 0 {
            return Err("export.records_per_file must be > 0".to_string());
        }

        validate_file_base_name(&self.default_file_base_name)
            .map_err(|e| format!("export.default_file_base_name: {e}"))?;

        if self.job_expiry_minutes == 0 {
            return Err("export.job_expiry_minutes must be > 0".to_string());
        }

        Ok(())
    }
}

/// Local record source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory of JSON-lines record files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory of reference tables (`{table}.json`)
    #[serde(default = "default_reference_data_dir")]
    pub reference_data_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reference_data_dir: default_reference_data_dir(),
        }
    }
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("source.data_dir cannot be empty".to_string());
        }
        if self.reference_data_dir.as_os_str().is_empty() {
            return Err("source.reference_data_dir cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of stored objects
    pub root: PathBuf,

    /// First object path segment, usually the tenant
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Public base URL of stored objects
    pub base_url: String,

    /// Key used to sign download links
    /// Stored securely in memory and automatically zeroized on drop
    pub signing_key: SecretString,

    /// Lifetime of download links in seconds
    #[serde(default = "default_download_url_ttl_seconds")]
    pub download_url_ttl_seconds: u64,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.root.as_os_str().is_empty() {
            return Err("storage.root cannot be empty".to_string());
        }

        if self.scope.is_empty() || self.scope.contains(['/', '\\']) || self.scope == ".." {
            return Err(format!(
                "storage.scope '{}' must be a single path segment",
                self.scope
            ));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid storage.base_url '{}': {e}", self.base_url))?;

        if self.signing_key.expose_secret().is_empty() {
            return Err("storage.signing_key cannot be empty".to_string());
        }

        if self.download_url_ttl_seconds == 0 {
            return Err("storage.download_url_ttl_seconds must be > 0".to_string());
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to local files
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Directory of local log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log file rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }

    /// Console-only logging
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// Links to external catalog views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Base URL of the catalog UI, used in error log record links
    #[serde(default = "default_inventory_base_url")]
    pub inventory_base_url: String,

    /// Base URL of linked-data resource identifiers
    #[serde(default = "default_linked_data_base_url")]
    pub linked_data_base_url: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            inventory_base_url: default_inventory_base_url(),
            linked_data_base_url: default_linked_data_base_url(),
        }
    }
}

impl LinksConfig {
    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("links.inventory_base_url", &self.inventory_base_url),
            ("links.linked_data_base_url", &self.linked_data_base_url),
        ] {
            url::Url::parse(value).map_err(|e| format!("Invalid {name} '{value}': {e}"))?;
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tmp_root() -> PathBuf {
    std::env::temp_dir().join("marcport")
}

fn default_batch_size() -> usize {
    50
}

fn default_write_buffer_size() -> usize {
    64 * 1024
}

fn default_max_parallel_partitions() -> usize {
    4
}

fn default_partitions_per_job() -> usize {
    4
}

fn default_records_per_file() -> usize {
    1_000
}

fn default_file_base_name() -> String {
    "quick-export".to_string()
}

fn default_job_expiry_minutes() -> u64 {
    60
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_reference_data_dir() -> PathBuf {
    PathBuf::from("./data/reference")
}

fn default_scope() -> String {
    "default".to_string()
}

fn default_download_url_ttl_seconds() -> u64 {
    3_600
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_inventory_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_linked_data_base_url() -> String {
    "http://localhost:8081".to_string()
}
