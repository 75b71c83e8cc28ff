//! MARC 21 record model and ISO 2709 codec
//!
//! - [`leader`] - the 24-byte leader
//! - [`record`] - fields, subfields and the record itself
//! - [`writer`] - ISO 2709 encoding with length limits
//! - [`json`] - MARC-in-JSON parsing for stored source records

pub mod json;
pub mod leader;
pub mod record;
pub mod writer;

pub use json::{parse_marc_json, to_marc_json};
pub use leader::Leader;
pub use record::{ControlField, DataField, MarcRecord, Subfield};
pub use writer::{encode, MAX_RECORD_LENGTH};
