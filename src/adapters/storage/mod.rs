//! Object storage for uploaded artifacts

pub mod local;
pub mod memory;
pub mod traits;

pub use local::LocalObjectStorage;
pub use memory::InMemoryObjectStorage;
pub use traits::{object_path, ObjectStorage};
