//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::MarcportConfig;
use super::secret::secret_string;
use crate::domain::errors::ExportError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MarcportConfig
/// 4. Applies environment variable overrides (MARCPORT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, a referenced environment
/// variable is missing, the TOML is malformed or validation fails.
///
/// # Examples
///
/// ```no_run
/// use marcport::config::loader::load_config;
///
/// let config = load_config("marcport.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MarcportConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ExportError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ExportError::Configuration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
///
/// # Errors
///
/// Same as [`load_config`], minus file access.
pub fn parse_config(contents: &str) -> Result<MarcportConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MarcportConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        ExportError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ExportError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |cap: &regex::Captures<'_>| {
                let var_name = &cap[1];
                std::env::var(var_name).unwrap_or_else(|_| {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                })
            })
            .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(ExportError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Applies environment variable overrides using MARCPORT_* prefix
///
/// Environment variables follow the pattern: MARCPORT_<SECTION>_<KEY>
/// For example: MARCPORT_EXPORT_BATCH_SIZE, MARCPORT_STORAGE_SIGNING_KEY
fn apply_env_overrides(config: &mut MarcportConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("MARCPORT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Export overrides
    if let Ok(val) = std::env::var("MARCPORT_EXPORT_TMP_ROOT") {
        config.export.tmp_root = PathBuf::from(val);
    }
    if let Some(size) = env_parse("MARCPORT_EXPORT_BATCH_SIZE") {
        config.export.batch_size = size;
    }
    if let Some(size) = env_parse("MARCPORT_EXPORT_WRITE_BUFFER_SIZE") {
        config.export.write_buffer_size = size;
    }
    if let Some(parallel) = env_parse("MARCPORT_EXPORT_MAX_PARALLEL_PARTITIONS") {
        config.export.max_parallel_partitions = parallel;
    }
    if let Some(partitions) = env_parse("MARCPORT_EXPORT_PARTITIONS_PER_JOB") {
        config.export.partitions_per_job = partitions;
    }
    if let Some(records) = env_parse("MARCPORT_EXPORT_RECORDS_PER_FILE") {
        config.export.records_per_file = records;
    }
    if let Ok(val) = std::env::var("MARCPORT_EXPORT_DEFAULT_FILE_BASE_NAME") {
        config.export.default_file_base_name = val;
    }
    if let Some(minutes) = env_parse("MARCPORT_EXPORT_JOB_EXPIRY_MINUTES") {
        config.export.job_expiry_minutes = minutes;
    }

    // Source overrides
    if let Ok(val) = std::env::var("MARCPORT_SOURCE_DATA_DIR") {
        config.source.data_dir = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("MARCPORT_SOURCE_REFERENCE_DATA_DIR") {
        config.source.reference_data_dir = PathBuf::from(val);
    }

    // Storage overrides
    if let Ok(val) = std::env::var("MARCPORT_STORAGE_ROOT") {
        config.storage.root = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("MARCPORT_STORAGE_SCOPE") {
        config.storage.scope = val;
    }
    if let Ok(val) = std::env::var("MARCPORT_STORAGE_BASE_URL") {
        config.storage.base_url = val;
    }
    if let Ok(val) = std::env::var("MARCPORT_STORAGE_SIGNING_KEY") {
        config.storage.signing_key = secret_string(val);
    }
    if let Some(ttl) = env_parse("MARCPORT_STORAGE_DOWNLOAD_URL_TTL_SECONDS") {
        config.storage.download_url_ttl_seconds = ttl;
    }

    // Logging overrides
    if let Some(enabled) = env_parse("MARCPORT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("MARCPORT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("MARCPORT_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    // Link overrides
    if let Ok(val) = std::env::var("MARCPORT_LINKS_INVENTORY_BASE_URL") {
        config.links.inventory_base_url = val;
    }
    if let Ok(val) = std::env::var("MARCPORT_LINKS_LINKED_DATA_BASE_URL") {
        config.links.linked_data_base_url = val;
    }
}
