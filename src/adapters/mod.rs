//! External collaborators of the export pipeline.
//!
//! - [`provider`] - source catalog records and stored MARC
//! - [`reference`] - controlled-vocabulary tables
//! - [`storage`] - object storage for uploaded artifacts
//! - [`repository`] - job, partition file and error log persistence
//!
//! # Design Pattern
//!
//! Every collaborator is an async trait so the pipeline can be driven by the
//! in-memory implementations in tests and by local directory-backed ones from
//! the CLI:
//!
//! ```rust
//! use marcport::adapters::provider::{InMemoryRecordProvider, RecordProvider};
//! use marcport::adapters::repository::InMemoryRepository;
//! use std::sync::Arc;
//!
//! let provider: Arc<dyn RecordProvider> = Arc::new(InMemoryRecordProvider::new());
//! let repository = Arc::new(InMemoryRepository::new());
//! ```

pub mod provider;
pub mod reference;
pub mod repository;
pub mod storage;
