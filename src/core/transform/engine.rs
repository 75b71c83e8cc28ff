//! Transformation engine
//!
//! Evaluates a [`CompiledProfile`] against one composite source record and
//! builds a [`MarcRecord`].
//!
//! The composite wraps the primary record under its type key, with related
//! records alongside it:
//!
//! ```json
//! {"instance": {...}, "holdings": [{...}], "items": [{...}]}
//! ```
//!
//! Holdings rules run once per holdings record and item rules once per item.
//! Within one scope, rules that share a tag and indicators build a repeatable
//! field: the n-th value of every rule goes into the n-th occurrence.

use super::rules::{CompiledProfile, CompiledRule, MarcDestination};
use crate::core::reference_data::ReferenceDataCache;
use crate::domain::{RecordType, TransformError};
use crate::marc::{DataField, Leader, MarcRecord};
use serde_json::{json, Value};
use std::sync::Arc;

/// A value that could not be written to its field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field_id: String,
    pub value: String,
    pub reason: String,
}

/// Output of one transformation
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub record: MarcRecord,
    /// Field-level failures; the rest of the record is still usable
    pub field_errors: Vec<FieldError>,
}

/// Key of the primary record inside a composite
pub fn composite_key(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::Holdings => "holdings",
        RecordType::Item => "item",
        RecordType::Authority => "authority",
        RecordType::Instance | RecordType::Srs | RecordType::LinkedData => "instance",
    }
}

fn leader_for(record_type: RecordType) -> Leader {
    match record_type {
        RecordType::Holdings | RecordType::Item => Leader::holdings(),
        RecordType::Authority => Leader::authority(),
        RecordType::Instance | RecordType::Srs | RecordType::LinkedData => Leader::bibliographic(),
    }
}

/// Shared, read-only engine for one job
#[derive(Debug, Clone)]
pub struct TransformationEngine {
    profile: Arc<CompiledProfile>,
    reference_data: Arc<ReferenceDataCache>,
}

impl TransformationEngine {
    pub fn new(profile: Arc<CompiledProfile>, reference_data: Arc<ReferenceDataCache>) -> Self {
        Self {
            profile,
            reference_data,
        }
    }

    pub fn profile(&self) -> &CompiledProfile {
        &self.profile
    }

    pub fn reference_data(&self) -> &ReferenceDataCache {
        &self.reference_data
    }

    /// Build a MARC record from a composite source record
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidRecord`] when the composite does not
    /// hold a primary record object with an `id`.
    pub fn transform(&self, composite: &Value) -> Result<TransformOutcome, TransformError> {
        self.transform_as(composite, self.profile.primary)
    }

    /// Like [`transform`](Self::transform), with the primary record type
    /// chosen by the caller
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidRecord`] when the composite does not
    /// hold a `primary` record object with an `id`.
    pub fn transform_as(
        &self,
        composite: &Value,
        primary: RecordType,
    ) -> Result<TransformOutcome, TransformError> {
        let key = composite_key(primary);
        let record_id = composite
            .get(key)
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| TransformError::InvalidRecord {
                record_id: composite
                    .get(key)
                    .and_then(|r| r.get("id"))
                    .map(Value::to_string)
                    .unwrap_or_else(|| "unknown".to_string()),
                reason: format!("expected a '{key}' object with a string id"),
            })?;

        let mut record = MarcRecord::new(leader_for(primary));
        let mut field_errors = Vec::new();

        let types: Vec<RecordType> = self
            .profile
            .record_types
            .iter()
            .copied()
            .chain(std::iter::once(primary))
            .collect();
        self.apply_scopes(&mut record, composite, primary, &types, &mut field_errors);

        record.sort_fields();
        tracing::trace!(
            record_id,
            fields = record.field_count(),
            field_errors = field_errors.len(),
            "Record transformed"
        );
        Ok(TransformOutcome {
            record,
            field_errors,
        })
    }

    /// Append fields produced by the rules of `types` onto an existing record
    ///
    /// Used to merge holdings and item data onto a stored MARC record.
    pub fn append_fields(
        &self,
        record: &mut MarcRecord,
        composite: &Value,
        types: &[RecordType],
    ) -> Vec<FieldError> {
        let mut field_errors = Vec::new();
        self.apply_scopes(record, composite, self.profile.primary, types, &mut field_errors);
        record.sort_fields();
        field_errors
    }

    fn apply_scopes(
        &self,
        record: &mut MarcRecord,
        composite: &Value,
        primary: RecordType,
        types: &[RecordType],
        errors: &mut Vec<FieldError>,
    ) {
        let root_types: Vec<RecordType> = types
            .iter()
            .copied()
            .filter(|t| !matches!(t, RecordType::Holdings | RecordType::Item))
            .collect();
        let root_rules: Vec<&CompiledRule> = self.profile.rules_for(&root_types).collect();
        self.apply_rules(record, composite, &root_rules, errors);

        if types.contains(&RecordType::Holdings) {
            let rules: Vec<&CompiledRule> =
                self.profile.rules_for(&[RecordType::Holdings]).collect();
            if primary == RecordType::Holdings {
                self.apply_rules(record, composite, &rules, errors);
            } else {
                for holdings in elements(composite.get("holdings")) {
                    self.apply_rules(record, &json!({ "holdings": holdings }), &rules, errors);
                }
            }
        }

        if types.contains(&RecordType::Item) {
            let rules: Vec<&CompiledRule> = self.profile.rules_for(&[RecordType::Item]).collect();
            for item in elements(composite.get("items")) {
                self.apply_rules(record, &json!({ "item": item }), &rules, errors);
            }
        }
    }

    fn apply_rules(
        &self,
        record: &mut MarcRecord,
        scope: &Value,
        rules: &[&CompiledRule],
        errors: &mut Vec<FieldError>,
    ) {
        let mut groups: Vec<(&MarcDestination, Vec<(&CompiledRule, Vec<String>)>)> = Vec::new();

        for &rule in rules {
            let values = self.evaluate(rule, scope, errors);
            let dest = &rule.destination;
            match groups.iter_mut().find(|(d, _)| same_field(d, dest)) {
                Some((_, members)) => members.push((rule, values)),
                None => groups.push((dest, vec![(rule, values)])),
            }
        }

        for (dest, members) in groups {
            if dest.is_control() {
                if let Some(value) = members.iter().find_map(|(_, v)| v.first()) {
                    record.add_control_field(dest.tag.clone(), value.clone());
                }
                continue;
            }

            let occurrences = members.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
            for i in 0..occurrences {
                let mut field = DataField::new(dest.tag.clone(), dest.ind1, dest.ind2);
                for (rule, values) in &members {
                    if let (Some(code), Some(value)) = (rule.destination.subfield, values.get(i)) {
                        field.add_subfield(code, value.clone());
                    }
                }
                record.add_data_field(field);
            }
        }
    }

    fn evaluate(
        &self,
        rule: &CompiledRule,
        scope: &Value,
        errors: &mut Vec<FieldError>,
    ) -> Vec<String> {
        let mut values = rule.path.values(scope);

        if let Some(lookup) = &rule.reference {
            values = values
                .into_iter()
                .filter_map(|id| {
                    let resolved = self.reference_data.lookup(&lookup.table, &id, &lookup.field);
                    if resolved.is_none() {
                        tracing::debug!(
                            field_id = %rule.field_id,
                            table = %lookup.table,
                            id = %id,
                            "Unresolved reference value skipped"
                        );
                    }
                    resolved.map(str::to_string)
                })
                .collect();
        }

        if let Some(format) = rule.format {
            values = values
                .into_iter()
                .filter_map(|value| match format.apply(&value) {
                    Ok(formatted) => Some(formatted),
                    Err(reason) => {
                        errors.push(FieldError {
                            field_id: rule.field_id.clone(),
                            value,
                            reason,
                        });
                        None
                    }
                })
                .collect();
        }

        values
    }
}

fn same_field(a: &MarcDestination, b: &MarcDestination) -> bool {
    a.tag == b.tag && a.ind1 == b.ind1 && a.ind2 == b.ind2
}

fn elements(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(object @ Value::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::rules::compile_profile;
    use crate::domain::{MappingProfile, TransformationRule};
    use crate::marc::encode;

    fn instance() -> Value {
        json!({
            "instance": {
                "id": "0b4d0fa2-6d4e-4a5e-a0d2-2d43f4b7d0a1",
                "hrid": "in00000001",
                "title": "Moby Dick",
                "editions": ["First edition"],
                "metadata": {"updatedDate": "2021-03-04T05:06:07.000Z"},
                "identifiers": [
                    {"identifierTypeId": "8261054f-be78-422d-bd51-4ed9f33c3422", "value": "9780142437247"},
                    {"identifierTypeId": "8261054f-be78-422d-bd51-4ed9f33c3422", "value": "0142437247"}
                ],
                "publication": [{"publisher": "Harper", "dateOfPublication": "1851"}]
            },
            "holdings": [
                {"id": "h1", "permanentLocationId": "loc-1", "callNumber": "PS2384 .M6"},
                {"id": "h2", "permanentLocationId": "loc-unknown", "callNumber": "PS2384 .M6 b"}
            ],
            "items": [
                {"id": "it1", "barcode": "3900001", "materialTypeId": "mt-1"}
            ]
        })
    }

    fn reference() -> Arc<ReferenceDataCache> {
        let mut cache = ReferenceDataCache::default();
        cache.insert_table("locations", vec![json!({"id": "loc-1", "name": "Main Library"})]);
        cache.insert_table("materialTypes", vec![json!({"id": "mt-1", "name": "book"})]);
        Arc::new(cache)
    }

    fn engine(profile: &MappingProfile) -> TransformationEngine {
        TransformationEngine::new(Arc::new(compile_profile(profile).unwrap()), reference())
    }

    fn rule(field_id: &str, path: &str, dest: &str, record_type: RecordType) -> TransformationRule {
        TransformationRule {
            field_id: field_id.to_string(),
            path: path.to_string(),
            transformation: dest.to_string(),
            record_type,
            enabled: true,
            on_the_fly: false,
            format: None,
        }
    }

    #[test]
    fn test_default_instance_fields() {
        let outcome = engine(&MappingProfile::default_instance())
            .transform(&instance())
            .unwrap();
        let record = outcome.record;

        assert!(outcome.field_errors.is_empty());
        assert_eq!(record.control_field("001"), Some("in00000001"));
        assert_eq!(record.control_field("005"), Some("20210304050607.0"));
        assert_eq!(record.fields("020").count(), 2);
        let title = record.fields("245").next().unwrap();
        assert_eq!((title.ind1, title.ind2), ('1', '0'));
        assert_eq!(title.subfield('a'), Some("Moby Dick"));
        let publication = record.fields("264").next().unwrap();
        assert_eq!(publication.subfield('b'), Some("Harper"));
        assert_eq!(publication.subfield('c'), Some("1851"));
        assert_eq!(record.fields("852").count(), 0);
        assert_eq!(
            record.fields("999").next().unwrap().subfield('i'),
            Some("0b4d0fa2-6d4e-4a5e-a0d2-2d43f4b7d0a1")
        );
    }

    #[test]
    fn test_empty_profile_matches_default_field_set() {
        let mut custom = MappingProfile::default_instance();
        custom.id = uuid::Uuid::new_v4();
        custom.is_default = false;
        let mut disabled = rule("instance.title", "$.instance.title", "500  $a", RecordType::Instance);
        disabled.enabled = false;
        custom.transformations = vec![disabled];

        let a = engine(&MappingProfile::default_instance()).transform(&instance()).unwrap();
        let b = engine(&custom).transform(&instance()).unwrap();
        assert_eq!(a.record, b.record);
    }

    #[test]
    fn test_transformation_is_deterministic() {
        let engine = engine(&MappingProfile::default_instance());
        let first = encode(&engine.transform(&instance()).unwrap().record).unwrap();
        let second = encode(&engine.transform(&instance()).unwrap().record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_holdings_and_items_per_scope() {
        let mut profile = MappingProfile::default_instance();
        profile.record_types = vec![RecordType::Instance, RecordType::Holdings, RecordType::Item];
        let record = engine(&profile).transform(&instance()).unwrap().record;

        let holdings: Vec<&DataField> = record.fields("852").collect();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].subfield('b'), Some("Main Library"));
        assert_eq!(holdings[0].subfield('h'), Some("PS2384 .M6"));
        // unresolved location is skipped, call number kept
        assert_eq!(holdings[1].subfield('b'), None);
        assert_eq!(holdings[1].subfield('h'), Some("PS2384 .M6 b"));

        let item = record.fields("876").next().unwrap();
        assert_eq!(item.subfield('p'), Some("3900001"));
        assert_eq!(item.subfield('3'), Some("book"));
    }

    #[test]
    fn test_bad_date_is_field_error() {
        let mut profile = MappingProfile::default_instance();
        let mut updated = rule(
            "instance.metadata.updateddate",
            "$.instance.metadata.updatedDate",
            "005",
            RecordType::Instance,
        );
        updated.format = Some("marc-timestamp".to_string());
        profile.transformations = vec![
            rule("instance.title", "$.instance.title", "245 10$a", RecordType::Instance),
            updated,
        ];

        let mut source = instance();
        source["instance"]["metadata"]["updatedDate"] = json!("last tuesday");
        let outcome = engine(&profile).transform(&source).unwrap();

        assert_eq!(outcome.field_errors.len(), 1);
        assert_eq!(outcome.field_errors[0].field_id, "instance.metadata.updateddate");
        assert_eq!(outcome.field_errors[0].value, "last tuesday");
        assert!(outcome.record.control_field("005").is_none());
        assert_eq!(outcome.record.fields("245").count(), 1);
    }

    #[test]
    fn test_rules_sharing_a_tag_build_repeatable_fields() {
        let mut profile = MappingProfile::default_instance();
        profile.transformations = vec![
            rule("a", "$.instance.contributors[*].name", "700 1_$a", RecordType::Instance),
            rule("b", "$.instance.contributors[*].role", "700 1_$e", RecordType::Instance),
        ];
        let source = json!({
            "instance": {
                "id": "0b4d0fa2-6d4e-4a5e-a0d2-2d43f4b7d0a1",
                "contributors": [
                    {"name": "Melville, Herman", "role": "author"},
                    {"name": "Kent, Rockwell", "role": "illustrator"}
                ]
            }
        });
        let record = engine(&profile).transform(&source).unwrap().record;
        let fields: Vec<&DataField> = record.fields("700").collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].subfield('a'), Some("Kent, Rockwell"));
        assert_eq!(fields[1].subfield('e'), Some("illustrator"));
    }

    #[test]
    fn test_invalid_record() {
        let engine = engine(&MappingProfile::default_instance());
        assert!(matches!(
            engine.transform(&json!({"instance": "oops"})),
            Err(TransformError::InvalidRecord { .. })
        ));
        assert!(matches!(
            engine.transform(&json!([])),
            Err(TransformError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_append_fields_onto_existing_record() {
        let mut profile = MappingProfile::default_instance();
        profile.record_types = vec![RecordType::Srs, RecordType::Holdings];
        let engine = engine(&profile);

        let mut record = MarcRecord::new(Leader::bibliographic());
        record.add_control_field("001", "in00000001");
        let errors = engine.append_fields(&mut record, &instance(), &[RecordType::Holdings]);

        assert!(errors.is_empty());
        assert_eq!(record.fields("852").count(), 2);
        assert_eq!(record.control_field("001"), Some("in00000001"));
    }
}
