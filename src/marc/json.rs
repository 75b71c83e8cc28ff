//! MARC-in-JSON parsing for stored source records
//!
//! Format:
//!
//! - `leader`: the 24-character leader string
//! - `fields`: array of single-key objects; control fields map the tag to a
//!   string, data fields map it to `{ind1, ind2, subfields: [{code: value}]}`

use crate::domain::errors::MarcError;
use crate::marc::leader::Leader;
use crate::marc::record::{validate_tag, DataField, MarcRecord};
use serde_json::{json, Map, Value};

/// Parse a MARC-in-JSON document into a record
///
/// # Errors
///
/// Returns [`MarcError::InvalidRecord`] if the document does not follow the
/// layout above.
pub fn parse_marc_json(value: &Value) -> Result<MarcRecord, MarcError> {
    let object = value
        .as_object()
        .ok_or_else(|| MarcError::InvalidRecord("Expected JSON object".to_string()))?;

    let leader = match object.get("leader").and_then(Value::as_str) {
        Some(leader) => Leader::parse(leader)?,
        None => return Err(MarcError::InvalidRecord("Missing leader".to_string())),
    };
    let mut record = MarcRecord::new(leader);

    let fields = object
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| MarcError::InvalidRecord("Missing fields array".to_string()))?;

    for item in fields {
        let (tag, body) = single_entry(item)?;
        validate_tag(tag)?;
        match body {
            Value::String(text) => record.add_control_field(tag, text.clone()),
            Value::Object(data) => record.add_data_field(parse_data_field(tag, data)?),
            other => {
                return Err(MarcError::InvalidRecord(format!(
                    "Field {tag} has unsupported content: {other}"
                )))
            }
        }
    }

    Ok(record)
}

/// Render a record as MARC-in-JSON
pub fn to_marc_json(record: &MarcRecord) -> Value {
    let mut fields = Vec::with_capacity(record.field_count());
    for field in &record.control_fields {
        fields.push(json!({ field.tag.clone(): field.value }));
    }
    for field in &record.data_fields {
        let subfields: Vec<Value> = field
            .subfields
            .iter()
            .map(|s| json!({ s.code.to_string(): s.value }))
            .collect();
        fields.push(json!({
            field.tag.clone(): {
                "ind1": field.ind1.to_string(),
                "ind2": field.ind2.to_string(),
                "subfields": subfields,
            }
        }));
    }
    let leader = String::from_utf8_lossy(&record.leader.to_bytes(0, 0)).to_string();
    json!({ "leader": leader, "fields": fields })
}

fn single_entry(item: &Value) -> Result<(&str, &Value), MarcError> {
    let object = item
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| MarcError::InvalidRecord(format!("Field must be a single-key object: {item}")))?;
    object
        .iter()
        .next()
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| MarcError::InvalidRecord("Empty field object".to_string()))
}

fn parse_data_field(tag: &str, data: &Map<String, Value>) -> Result<DataField, MarcError> {
    let indicator = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .and_then(|s| s.chars().next())
            .unwrap_or(' ')
    };
    let mut field = DataField::new(tag, indicator("ind1"), indicator("ind2"));

    let subfields = data
        .get("subfields")
        .and_then(Value::as_array)
        .ok_or_else(|| MarcError::InvalidRecord(format!("Field {tag} has no subfields array")))?;

    for subfield in subfields {
        let (code, value) = single_entry(subfield)?;
        let code = code
            .chars()
            .next()
            .ok_or_else(|| MarcError::InvalidRecord(format!("Empty subfield code in {tag}")))?;
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        field.add_subfield(code, value);
    }
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "leader": "00000cam a2200000 i 4500",
            "fields": [
                {"001": "in001"},
                {"245": {"ind1": "1", "ind2": "0", "subfields": [{"a": "Title"}, {"c": "Author"}]}},
                {"650": {"ind1": " ", "ind2": "0", "subfields": [{"a": "Subject"}]}}
            ]
        })
    }

    #[test]
    fn test_parse_marc_json() {
        let record = parse_marc_json(&sample()).unwrap();
        assert_eq!(record.leader.record_status, 'c');
        assert_eq!(record.control_field("001"), Some("in001"));
        let title = record.fields("245").next().unwrap();
        assert_eq!(title.ind1, '1');
        assert_eq!(title.subfield('c'), Some("Author"));
    }

    #[test]
    fn test_parse_then_render_preserves_fields() {
        let record = parse_marc_json(&sample()).unwrap();
        let reparsed = parse_marc_json(&to_marc_json(&record)).unwrap();
        assert_eq!(record, reparsed);
    }

    #[test]
    fn test_missing_leader() {
        let err = parse_marc_json(&json!({"fields": []})).unwrap_err();
        assert!(matches!(err, MarcError::InvalidRecord(_)));
    }

    #[test]
    fn test_multi_key_field_rejected() {
        let value = json!({
            "leader": "00000cam a2200000 i 4500",
            "fields": [{"001": "a", "003": "b"}]
        });
        assert!(parse_marc_json(&value).is_err());
    }
}
