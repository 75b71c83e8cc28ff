//! Record transformation
//!
//! Mapping profiles are compiled once per job into typed rules
//! ([`rules::compile_profile`]) and evaluated by the [`TransformationEngine`]
//! against each source record.
//!
//! - [`path`] - JSON path parsing and evaluation
//! - [`rules`] - MARC destinations, value formats and profile compilation
//! - [`defaults`] - built-in field set
//! - [`engine`] - rule evaluation into MARC records
//! - [`linked_data`] - fixed linked-data JSON shape
//!
//! # Example
//!
//! ```
//! use marcport::core::reference_data::ReferenceDataCache;
//! use marcport::core::transform::{compile_profile, TransformationEngine};
//! use marcport::domain::MappingProfile;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = compile_profile(&MappingProfile::default_instance())?;
//! let engine = TransformationEngine::new(Arc::new(profile), Arc::new(ReferenceDataCache::default()));
//!
//! let outcome = engine.transform(&json!({
//!     "instance": {"id": "0b4d0fa2-6d4e-4a5e-a0d2-2d43f4b7d0a1", "hrid": "in1", "title": "Moby Dick"}
//! }))?;
//! assert_eq!(outcome.record.control_field("001"), Some("in1"));
//! # Ok(())
//! # }
//! ```

pub mod defaults;
pub mod engine;
pub mod linked_data;
pub mod path;
pub mod rules;

pub use engine::{composite_key, FieldError, TransformOutcome, TransformationEngine};
pub use linked_data::to_linked_data;
pub use rules::{compile_profile, CompiledProfile, CompiledRule, MarcDestination, ValueFormat};
