// marcport - MARC export pipeline
// Copyright (c) 2025 Marcport Contributors
// Licensed under the MIT License

//! # marcport - MARC and linked-data export pipeline
//!
//! marcport exports catalog records (instances, holdings, authorities) as
//! binary MARC 21 or linked-data JSON. A mapping profile selects which
//! record fields land in which MARC tags, and each export job is split into
//! partitions that are transformed in parallel and bundled into one artifact.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Partitioning, transformation, status tracking, upload
//! - [`adapters`] - Record source, reference data, repositories, object storage
//! - [`marc`] - MARC 21 record model, binary encoder and MARC-in-JSON
//! - [`domain`] - Jobs, files, profiles, error log entries and errors
//! - [`config`] - TOML configuration with environment overrides
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marcport::config::load_config;
//! use marcport::core::export::{ExportCoordinator, ExportServices};
//! use marcport::domain::{ExportRequest, RecordType};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("marcport.toml")?;
//!     let coordinator = ExportCoordinator::new(&config, ExportServices::from_config(&config)?);
//!
//!     let request = ExportRequest::by_ids(
//!         RecordType::Instance,
//!         vec!["7d44b88c-4199-4bad-97dc-d78268e01398".to_string()],
//!     );
//!     let summary = coordinator.execute(request, None).await?;
//!
//!     println!("{}: {} exported", summary.status, summary.exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Job Status
//!
//! Every partition file ends `COMPLETED`, `COMPLETED_WITH_ERRORS` or
//! `FAILED`. Once the last partition of a job finishes, the job status is
//! reduced from all of them:
//!
//! ```rust
//! use marcport::core::state::aggregate_status;
//! use marcport::domain::{FileStatus, JobStatus};
//!
//! let status = aggregate_status(&[FileStatus::Completed, FileStatus::Failed]);
//! assert_eq!(status, Some(JobStatus::CompletedWithErrors));
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`], whose error type is
//! [`domain::ExportError`]. Record-level problems never fail a job; they are
//! written to the error log and surface as `COMPLETED_WITH_ERRORS`.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
pub mod marc;
