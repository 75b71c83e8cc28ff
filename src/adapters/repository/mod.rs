//! Persistence of jobs, partition files and error logs

pub mod memory;
pub mod traits;

pub use memory::InMemoryRepository;
pub use traits::{ErrorLogRepository, ExportFileRepository, JobRepository};
