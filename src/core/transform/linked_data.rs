//! Linked-data rendering of instance records
//!
//! One JSON object per instance, written as a single line:
//!
//! ```json
//! {"@id": "{base}/resources/{id}", "@type": "Instance", "hrid": "...",
//!  "title": "...", "identifiers": [{"type": "ISBN", "value": "..."}],
//!  "contributors": ["..."], "publication": [{"publisher": "...", "date": "..."}]}
//! ```

use crate::core::reference_data::ReferenceDataCache;
use crate::domain::TransformError;
use serde_json::{json, Map, Value};

/// Reference table naming identifier types
pub const IDENTIFIER_TYPES_TABLE: &str = "identifierTypes";

/// Render one instance as a linked-data resource
///
/// Identifier types that are not in the reference cache are emitted with
/// their raw type id.
///
/// # Errors
///
/// Returns [`TransformError::InvalidRecord`] when the instance has no string id.
pub fn to_linked_data(
    instance: &Value,
    reference_data: &ReferenceDataCache,
    base_url: &str,
) -> Result<Value, TransformError> {
    let id = instance
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| TransformError::InvalidRecord {
            record_id: "unknown".to_string(),
            reason: "instance has no string id".to_string(),
        })?;

    let text = |key: &str| instance.get(key).and_then(Value::as_str);
    let objects = |key: &str| {
        instance
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter(|v| v.is_object()).collect::<Vec<_>>())
            .unwrap_or_default()
    };

    let identifiers: Vec<Value> = objects("identifiers")
        .into_iter()
        .filter_map(|identifier| {
            let value = identifier.get("value")?.as_str()?;
            let type_id = identifier
                .get("identifierTypeId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let type_name = reference_data
                .lookup(IDENTIFIER_TYPES_TABLE, type_id, "name")
                .unwrap_or(type_id);
            Some(json!({ "type": type_name, "value": value }))
        })
        .collect();

    let contributors: Vec<Value> = objects("contributors")
        .into_iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str))
        .map(|name| Value::String(name.to_string()))
        .collect();

    let publication: Vec<Value> = objects("publication")
        .into_iter()
        .map(|p| {
            let mut entry = Map::new();
            for (from, to) in [("publisher", "publisher"), ("place", "place"), ("dateOfPublication", "date")] {
                if let Some(value) = p.get(from).filter(|v| !v.is_null()) {
                    entry.insert(to.to_string(), value.clone());
                }
            }
            Value::Object(entry)
        })
        .collect();

    Ok(json!({
        "@id": format!("{}/resources/{id}", base_url.trim_end_matches('/')),
        "@type": "Instance",
        "hrid": text("hrid"),
        "title": text("title"),
        "identifiers": identifiers,
        "contributors": contributors,
        "publication": publication,
    }))
}
