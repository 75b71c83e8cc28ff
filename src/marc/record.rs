//! In-memory MARC record

use crate::domain::errors::MarcError;
use crate::marc::leader::Leader;
use serde::{Deserialize, Serialize};

/// One subfield: code plus value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

/// A variable data field (tag 010 and above)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    pub subfields: Vec<Subfield>,
}

impl DataField {
    pub fn new(tag: impl Into<String>, ind1: char, ind2: char) -> Self {
        Self {
            tag: tag.into(),
            ind1,
            ind2,
            subfields: Vec::new(),
        }
    }

    pub fn add_subfield(&mut self, code: char, value: impl Into<String>) {
        self.subfields.push(Subfield {
            code,
            value: value.into(),
        });
    }

    /// Builder-style variant of [`add_subfield`](Self::add_subfield)
    pub fn with_subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.add_subfield(code, value);
        self
    }

    /// First value of subfield `code`
    pub fn subfield(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }
}

/// A variable control field (tags 001-009)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlField {
    pub tag: String,
    pub value: String,
}

/// A MARC record with fields kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarcRecord {
    pub leader: Leader,
    pub control_fields: Vec<ControlField>,
    pub data_fields: Vec<DataField>,
}

/// Whether `tag` addresses a control field
pub fn is_control_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with("00")
}

/// Validate a three-character alphanumeric tag
pub fn validate_tag(tag: &str) -> Result<(), MarcError> {
    if tag.len() == 3 && tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(MarcError::InvalidTag(tag.to_string()))
    }
}

impl MarcRecord {
    pub fn new(leader: Leader) -> Self {
        Self {
            leader,
            control_fields: Vec::new(),
            data_fields: Vec::new(),
        }
    }

    pub fn add_control_field(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.control_fields.push(ControlField {
            tag: tag.into(),
            value: value.into(),
        });
    }

    pub fn add_data_field(&mut self, field: DataField) {
        self.data_fields.push(field);
    }

    /// First control field value for `tag`
    pub fn control_field(&self, tag: &str) -> Option<&str> {
        self.control_fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// All data fields with `tag`
    pub fn fields<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DataField> + 'a {
        self.data_fields.iter().filter(move |f| f.tag == tag)
    }

    /// Drop every field with one of `tags`
    pub fn remove_tags(&mut self, tags: &[&str]) {
        self.control_fields.retain(|f| !tags.contains(&f.tag.as_str()));
        self.data_fields.retain(|f| !tags.contains(&f.tag.as_str()));
    }

    /// Order fields by tag, keeping insertion order within a tag
    pub fn sort_fields(&mut self) {
        self.control_fields.sort_by(|a, b| a.tag.cmp(&b.tag));
        self.data_fields.sort_by(|a, b| a.tag.cmp(&b.tag));
    }

    pub fn field_count(&self) -> usize {
        self.control_fields.len() + self.data_fields.len()
    }
}
