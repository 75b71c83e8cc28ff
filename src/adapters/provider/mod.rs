//! Source catalog access

pub mod memory;
pub mod traits;

pub use memory::InMemoryRecordProvider;
pub use traits::{RecordProvider, SourceKind};
