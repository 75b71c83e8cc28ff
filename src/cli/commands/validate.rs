//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the marcport configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        // load_config validates every section
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Staging Directory: {}", config.export.tmp_root.display());
        println!("  Batch Size: {}", config.export.batch_size);
        println!(
            "  Parallel Partitions: {}",
            config.export.max_parallel_partitions
        );
        println!("  Partitions per Job: {}", config.export.partitions_per_job);
        println!("  Records per File: {}", config.export.records_per_file);
        println!("  Record Source: {}", config.source.data_dir.display());
        println!(
            "  Reference Data: {}",
            config.source.reference_data_dir.display()
        );
        println!("  Storage Root: {}", config.storage.root.display());
        println!("  Storage Scope: {}", config.storage.scope);
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let code = ValidateArgs {}
            .execute(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("marcport.toml");
        std::fs::write(
            &path,
            r#"
[storage]
root = "/tmp/marcport-objects"
base_url = "http://localhost:8080/files"
signing_key = "secret"
"#,
        )
        .unwrap();
        let code = ValidateArgs {}
            .execute(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
