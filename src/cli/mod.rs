//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for marcport using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// marcport - MARC and linked-data export pipeline
#[derive(Parser, Debug)]
#[command(name = "marcport")]
#[command(version, about, long_about = None)]
#[command(author = "Marcport Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "marcport.toml", env = "MARCPORT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MARCPORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export catalog records to MARC or linked-data files
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
