//! Export orchestration and partition processing
//!
//! This module provides the core export logic for marcport, including:
//! - Partition planning over id ranges and id lists
//! - Export strategies per record type
//! - The buffered local staging writer
//! - Partition execution and the job status reduction
//! - Upload, failure aggregation and reporting

pub mod coordinator;
pub mod executor;
pub mod failures;
pub mod partition;
pub mod strategy;
pub mod summary;
pub mod uploader;
pub mod writer;

pub use coordinator::{ExportCoordinator, ExportServices};
pub use executor::{ExportExecutor, PartitionOutcome};
pub use failures::FailureAggregator;
pub use strategy::{ExportContext, ExportScope, ExportStrategy, StrategyKind};
pub use summary::{ExportStatistics, ExportSummary, RecordFailure};
pub use uploader::{StorageUploader, UploadOutcome};
pub use writer::LocalStorageWriter;
