//! Job and partition status tracking

pub mod manager;

pub use manager::{aggregate_status, JobStatusManager, PartitionProgress};
