//! Built-in field set
//!
//! Used when a profile carries no enabled rules, and as the destination
//! source for on-the-fly rules.

use crate::domain::{RecordType, TransformationRule};

const ISBN_TYPE_ID: &str = "8261054f-be78-422d-bd51-4ed9f33c3422";
const ISSN_TYPE_ID: &str = "913300b2-03ed-469a-8179-c1092c991227";

struct DefaultRule {
    field_id: &'static str,
    path: String,
    destination: &'static str,
    record_type: RecordType,
    format: Option<&'static str>,
}

fn rule(
    field_id: &'static str,
    path: impl Into<String>,
    destination: &'static str,
    record_type: RecordType,
) -> DefaultRule {
    DefaultRule {
        field_id,
        path: path.into(),
        destination,
        record_type,
        format: None,
    }
}

fn table() -> Vec<DefaultRule> {
    use RecordType::{Authority, Holdings, Instance, Item};

    let isbn = format!("$.instance.identifiers[?(@.identifierTypeId=='{ISBN_TYPE_ID}')].value");
    let issn = format!("$.instance.identifiers[?(@.identifierTypeId=='{ISSN_TYPE_ID}')].value");

    vec![
        rule("instance.hrid", "$.instance.hrid", "001", Instance),
        DefaultRule {
            format: Some("marc-timestamp"),
            ..rule(
                "instance.metadata.updateddate",
                "$.instance.metadata.updatedDate",
                "005",
                Instance,
            )
        },
        rule("instance.identifiers.isbn", isbn, "020  $a", Instance),
        rule("instance.identifiers.issn", issn, "022  $a", Instance),
        rule("instance.title", "$.instance.title", "245 10$a", Instance),
        rule("instance.editions", "$.instance.editions[*]", "250  $a", Instance),
        rule(
            "instance.publication.publisher",
            "$.instance.publication[*].publisher",
            "264 _1$b",
            Instance,
        ),
        rule(
            "instance.publication.dateofpublication",
            "$.instance.publication[*].dateOfPublication",
            "264 _1$c",
            Instance,
        ),
        rule("instance.id", "$.instance.id", "999 ff$i", Instance),
        rule(
            "holdings.permanentlocation",
            "$.holdings.permanentLocationId | ref:locations.name",
            "852  $b",
            Holdings,
        ),
        rule("holdings.callnumber", "$.holdings.callNumber", "852  $h", Holdings),
        rule("item.barcode", "$.item.barcode", "876  $p", Item),
        rule(
            "item.materialtype",
            "$.item.materialTypeId | ref:materialTypes.name",
            "876  $3",
            Item,
        ),
        rule("authority.hrid", "$.authority.hrid", "001", Authority),
        rule(
            "authority.personalname",
            "$.authority.personalName",
            "100  $a",
            Authority,
        ),
        rule(
            "authority.topicalterm",
            "$.authority.topicalTerm",
            "150  $a",
            Authority,
        ),
        rule("authority.id", "$.authority.id", "999 ff$i", Authority),
    ]
}

fn to_rule(default: DefaultRule) -> TransformationRule {
    TransformationRule {
        field_id: default.field_id.to_string(),
        path: default.path,
        transformation: default.destination.to_string(),
        record_type: default.record_type,
        enabled: true,
        on_the_fly: false,
        format: default.format.map(str::to_string),
    }
}

/// Built-in rules for one record type
pub fn default_rules(record_type: RecordType) -> Vec<TransformationRule> {
    table()
        .into_iter()
        .filter(|r| r.record_type == record_type)
        .map(to_rule)
        .collect()
}

/// Built-in rule for a field id
pub fn default_rule(field_id: &str) -> Option<TransformationRule> {
    table()
        .into_iter()
        .find(|r| r.field_id.eq_ignore_ascii_case(field_id))
        .map(to_rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transform::rules::compile_rule;

    #[test]
    fn test_every_default_rule_compiles() {
        for record_type in [
            RecordType::Instance,
            RecordType::Holdings,
            RecordType::Item,
            RecordType::Authority,
        ] {
            let rules = default_rules(record_type);
            assert!(!rules.is_empty(), "{record_type} has no defaults");
            for rule in rules {
                compile_rule(&rule).unwrap();
            }
        }
    }

    #[test]
    fn test_default_rule_lookup() {
        let rule = default_rule("Instance.Title").unwrap();
        assert_eq!(rule.transformation, "245 10$a");
        assert!(default_rule("instance.unknown").is_none());
        assert!(default_rules(RecordType::LinkedData).is_empty());
    }

    #[test]
    fn test_isbn_path_filters_on_type() {
        let rule = default_rule("instance.identifiers.isbn").unwrap();
        assert!(rule.path.contains(ISBN_TYPE_ID));
    }
}
