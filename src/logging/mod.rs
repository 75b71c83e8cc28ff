//! Logging and observability
//!
//! Structured logging with:
//! - Human-readable console output
//! - JSON-formatted local files with rotation
//! - Level configuration, overridable through `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use marcport::logging::init_logging;
//! use marcport::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of work on one partition file
///
/// # Example
///
/// ```no_run
/// use marcport::log_partition_start;
/// use marcport::domain::{FileId, JobId};
///
/// log_partition_start!(JobId::random(), FileId::random());
/// ```
#[macro_export]
macro_rules! log_partition_start {
    ($job_id:expr, $file_id:expr) => {
        tracing::info!(
            job_id = %$job_id,
            file_id = %$file_id,
            "Starting export partition"
        );
    };
}

/// Log the terminal status of one partition file
///
/// # Example
///
/// ```no_run
/// use marcport::log_partition_complete;
/// use marcport::domain::{FileId, FileStatus, JobId};
///
/// log_partition_complete!(JobId::random(), FileId::random(), FileStatus::Completed, 42, 1);
/// ```
#[macro_export]
macro_rules! log_partition_complete {
    ($job_id:expr, $file_id:expr, $status:expr, $exported:expr, $failed:expr) => {
        tracing::info!(
            job_id = %$job_id,
            file_id = %$file_id,
            status = %$status,
            exported = $exported,
            failed = $failed,
            "Export partition finished"
        );
    };
}

/// Log a per-record failure
///
/// # Example
///
/// ```no_run
/// use marcport::log_record_failure;
/// use marcport::domain::ErrorCode;
///
/// log_record_failure!("7d44b88c-4199-4bad-97dc-d78268e01398", ErrorCode::RecordTooLong, "too long");
/// ```
#[macro_export]
macro_rules! log_record_failure {
    ($record_id:expr, $code:expr, $reason:expr) => {
        tracing::warn!(
            record_id = %$record_id,
            code = %$code,
            reason = %$reason,
            "Record skipped"
        );
    };
}
