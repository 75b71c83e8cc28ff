//! Core business logic for marcport.
//!
//! This module contains the export pipeline and its orchestration.
//!
//! # Modules
//!
//! - [`export`] - Partitioning, strategies, execution, upload and reporting
//! - [`reference_data`] - Per-job cache of controlled-vocabulary tables
//! - [`state`] - Partition and job status tracking
//! - [`transform`] - Mapping profile compilation and record transformation
//!
//! # Export Workflow
//!
//! 1. **Create job**: reserve a sequence number, mark the job in progress
//! 2. **Compile**: parse the mapping profile into typed rules once
//! 3. **Partition**: split the id space or the id list into partition files
//! 4. **Execute**: run one strategy per partition, bounded in parallel
//! 5. **Reduce**: derive the job status from every partition status
//! 6. **Upload**: ship one file directly or several as a zip archive
//! 7. **Report**: finalize the error log and return a summary
//!
//! # Example
//!
//! ```rust,no_run
//! use marcport::config::load_config;
//! use marcport::core::export::{ExportCoordinator, ExportServices};
//! use marcport::domain::{ExportRequest, RecordType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("marcport.toml")?;
//! let services = ExportServices::from_config(&config)?;
//! let coordinator = ExportCoordinator::new(&config, services);
//!
//! let request = ExportRequest::entire_collection(RecordType::Instance);
//! let summary = coordinator.execute(request, None).await?;
//!
//! println!("Exported: {}", summary.exported);
//! println!("Failed: {}", summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod reference_data;
pub mod state;
pub mod transform;
