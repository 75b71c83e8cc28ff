//! Rule compilation
//!
//! Raw [`TransformationRule`]s are compiled once per job into [`CompiledRule`]s.
//! Every malformed rule is rejected here, so the engine never parses a string
//! while transforming records.

use super::defaults;
use super::path::{parse_source, JsonPath, ReferenceLookup};
use crate::domain::{MappingProfile, RecordType, TransformError, TransformationRule};
use crate::marc::record::{is_control_tag, validate_tag};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Where a rule writes its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarcDestination {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    /// `None` for control fields
    pub subfield: Option<char>,
}

impl MarcDestination {
    /// Parse `TAG[ I1I2][$c]`; `_` stands for a blank indicator
    ///
    /// Control tags (`00x`) take neither indicators nor a subfield; data tags
    /// require a subfield.
    pub fn parse(value: &str) -> Option<Self> {
        let tag: String = value.chars().take(3).collect();
        validate_tag(&tag).ok()?;
        let rest = &value[tag.len()..];

        let (indicators, subfield) = match rest.split_once('$') {
            Some((before, code)) => {
                let mut chars = code.chars();
                let c = chars.next()?;
                if chars.next().is_some() || !c.is_ascii_alphanumeric() {
                    return None;
                }
                (before, Some(c))
            }
            None => (rest, None),
        };

        let indicators = indicators.strip_prefix(' ').unwrap_or(indicators);
        let (ind1, ind2) = if indicators.trim().is_empty() {
            (' ', ' ')
        } else {
            let chars: Vec<char> = indicators.chars().map(blank_indicator).collect();
            match chars.as_slice() {
                [a, b] if is_indicator(*a) && is_indicator(*b) => (*a, *b),
                _ => return None,
            }
        };

        if is_control_tag(&tag) {
            if subfield.is_some() || ind1 != ' ' || ind2 != ' ' {
                return None;
            }
        } else if subfield.is_none() {
            return None;
        }

        Some(Self {
            tag,
            ind1,
            ind2,
            subfield,
        })
    }

    pub fn is_control(&self) -> bool {
        self.subfield.is_none()
    }
}

fn blank_indicator(c: char) -> char {
    if c == '_' {
        ' '
    } else {
        c
    }
}

fn is_indicator(c: char) -> bool {
    c == ' ' || c.is_ascii_digit() || c.is_ascii_lowercase()
}

impl fmt::Display for MarcDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subfield {
            None => f.write_str(&self.tag),
            Some(code) => write!(
                f,
                "{} {}{}${}",
                self.tag,
                self.ind1.to_string().replace(' ', "_"),
                self.ind2.to_string().replace(' ', "_"),
                code
            ),
        }
    }
}

/// Value formats applied after extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// RFC 3339 timestamp to `yyyyMMddHHmmss.0` in UTC
    MarcTimestamp,
    /// Date or timestamp to `yyyyMMdd`
    MarcDate,
}

impl FromStr for ValueFormat {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "marc-timestamp" => Ok(ValueFormat::MarcTimestamp),
            "marc-date" => Ok(ValueFormat::MarcDate),
            other => Err(TransformError::UnknownFormat(other.to_string())),
        }
    }
}

impl ValueFormat {
    /// Format one extracted value
    ///
    /// # Errors
    ///
    /// Returns the reason when the value is not a parseable date.
    pub fn apply(&self, value: &str) -> Result<String, String> {
        match self {
            ValueFormat::MarcTimestamp => parse_timestamp(value)
                .map(|ts| ts.format("%Y%m%d%H%M%S.0").to_string()),
            ValueFormat::MarcDate => parse_timestamp(value)
                .map(|ts| ts.date_naive())
                .or_else(|_| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d"))
                .map(|date| date.format("%Y%m%d").to_string())
                .map_err(|_| format!("'{value}' is not a date")),
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("'{value}' is not a timestamp: {e}"))
}

/// A rule ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub field_id: String,
    pub record_type: RecordType,
    pub path: JsonPath,
    pub reference: Option<ReferenceLookup>,
    pub destination: MarcDestination,
    pub format: Option<ValueFormat>,
}

/// A mapping profile with every rule compiled
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub profile_id: Uuid,
    pub is_default: bool,
    pub record_types: Vec<RecordType>,
    pub deleted_records: bool,
    /// Record type the profile produces records for
    pub primary: RecordType,
    pub rules: Vec<CompiledRule>,
    /// No enabled custom rule existed; the built-in field set is in use
    pub uses_defaults: bool,
}

impl CompiledProfile {
    pub fn declares(&self, record_type: RecordType) -> bool {
        self.record_types.contains(&record_type)
    }

    /// Reference tables any rule looks values up in
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter_map(|r| r.reference.as_ref().map(|l| l.table.clone()))
            .collect()
    }

    pub fn needs_holdings(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r.record_type, RecordType::Holdings | RecordType::Item))
    }

    pub fn needs_items(&self) -> bool {
        self.rules.iter().any(|r| r.record_type == RecordType::Item)
    }

    /// Rules reading from one of `types`
    pub fn rules_for<'a>(
        &'a self,
        types: &'a [RecordType],
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules.iter().filter(move |r| types.contains(&r.record_type))
    }
}

/// Record type a profile primarily exports
pub fn primary_record_type(profile: &MappingProfile) -> RecordType {
    if profile.declares(RecordType::Authority) {
        RecordType::Authority
    } else if profile.declares(RecordType::Instance)
        || profile.declares(RecordType::Srs)
        || profile.declares(RecordType::LinkedData)
    {
        RecordType::Instance
    } else if profile.declares(RecordType::Holdings) {
        RecordType::Holdings
    } else {
        RecordType::Instance
    }
}

/// Compile every enabled rule of `profile`
///
/// A profile without enabled rules compiles to the built-in field set of its
/// primary record type, plus the holdings and item sets it declares.
///
/// # Errors
///
/// Returns the first rule that cannot be compiled.
pub fn compile_profile(profile: &MappingProfile) -> Result<CompiledProfile, TransformError> {
    let primary = primary_record_type(profile);
    let enabled: Vec<&TransformationRule> = profile.enabled_rules().collect();
    let uses_defaults = enabled.is_empty();

    let rules = if uses_defaults {
        let mut types = vec![primary];
        if primary == RecordType::Instance {
            if profile.declares(RecordType::Holdings) {
                types.push(RecordType::Holdings);
            }
            if profile.declares(RecordType::Item) {
                types.push(RecordType::Item);
            }
        }
        types
            .into_iter()
            .flat_map(defaults::default_rules)
            .map(|rule| compile_rule(&rule))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        enabled
            .into_iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?
    };

    tracing::debug!(
        profile_id = %profile.id,
        primary = %primary,
        rules = rules.len(),
        uses_defaults,
        "Mapping profile compiled"
    );

    Ok(CompiledProfile {
        profile_id: profile.id,
        is_default: profile.is_default,
        record_types: profile.record_types.clone(),
        deleted_records: profile.deleted_records,
        primary,
        rules,
        uses_defaults,
    })
}

/// Compile a single rule
///
/// # Errors
///
/// Returns a [`TransformError`] naming the rule's field id.
pub fn compile_rule(rule: &TransformationRule) -> Result<CompiledRule, TransformError> {
    let (path_expr, destination_expr, format_name) = if rule.on_the_fly {
        let default = defaults::default_rule(&rule.field_id)
            .ok_or_else(|| TransformError::MissingDefaultRule(rule.field_id.clone()))?;
        let path = if rule.path.trim().is_empty() {
            default.path
        } else {
            rule.path.clone()
        };
        (path, default.transformation, rule.format.clone().or(default.format))
    } else {
        (
            rule.path.clone(),
            rule.transformation.clone(),
            rule.format.clone(),
        )
    };

    let (path, reference) =
        parse_source(&path_expr).map_err(|reason| TransformError::InvalidPath {
            field_id: rule.field_id.clone(),
            path: path_expr.clone(),
            reason,
        })?;

    let destination = MarcDestination::parse(&destination_expr).ok_or_else(|| {
        TransformError::InvalidDestination {
            field_id: rule.field_id.clone(),
            destination: destination_expr.clone(),
        }
    })?;

    let format = format_name.as_deref().map(str::parse).transpose()?;

    Ok(CompiledRule {
        field_id: rule.field_id.clone(),
        record_type: rule.record_type,
        path,
        reference,
        destination,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn rule(field_id: &str, path: &str, transformation: &str) -> TransformationRule {
        TransformationRule {
            field_id: field_id.to_string(),
            path: path.to_string(),
            transformation: transformation.to_string(),
            record_type: RecordType::Instance,
            enabled: true,
            on_the_fly: false,
            format: None,
        }
    }

    #[test_case("245 10$a", "245", '1', '0', Some('a'); "data field")]
    #[test_case("020  $a", "020", ' ', ' ', Some('a'); "blank indicators")]
    #[test_case("264 _1$b", "264", ' ', '1', Some('b'); "underscore indicator")]
    #[test_case("876$3", "876", ' ', ' ', Some('3'); "no indicators")]
    #[test_case("001", "001", ' ', ' ', None; "control field")]
    fn test_destination_parse(
        value: &str,
        tag: &str,
        ind1: char,
        ind2: char,
        subfield: Option<char>,
    ) {
        let dest = MarcDestination::parse(value).unwrap();
        assert_eq!(dest.tag, tag);
        assert_eq!((dest.ind1, dest.ind2), (ind1, ind2));
        assert_eq!(dest.subfield, subfield);
    }

    #[test_case("245"; "data field without subfield")]
    #[test_case("001 10"; "control field with indicators")]
    #[test_case("005$a"; "control field with subfield")]
    #[test_case("24$a"; "short tag")]
    #[test_case("245 1$a"; "one indicator")]
    #[test_case("245 10$ab"; "long subfield code")]
    #[test_case(""; "empty")]
    fn test_destination_rejects(value: &str) {
        assert!(MarcDestination::parse(value).is_none());
    }

    #[test]
    fn test_destination_display() {
        let dest = MarcDestination::parse("264 _1$b").unwrap();
        assert_eq!(dest.to_string(), "264 _1$b");
    }

    #[test_case(ValueFormat::MarcTimestamp, "2021-03-04T05:06:07.000Z", "20210304050607.0")]
    #[test_case(ValueFormat::MarcTimestamp, "2021-03-04T05:06:07.000+0100", "20210304040607.0")]
    #[test_case(ValueFormat::MarcDate, "2021-03-04", "20210304")]
    #[test_case(ValueFormat::MarcDate, "2021-03-04T23:00:00Z", "20210304")]
    fn test_value_format(format: ValueFormat, input: &str, expected: &str) {
        assert_eq!(format.apply(input).unwrap(), expected);
    }

    #[test]
    fn test_value_format_rejects_garbage() {
        assert!(ValueFormat::MarcTimestamp.apply("yesterday").is_err());
        assert!(ValueFormat::MarcDate.apply("04/03/2021").is_err());
    }

    #[test]
    fn test_compile_custom_rule_with_reference() {
        let mut r = rule(
            "holdings.permanentlocation",
            "$.holdings.permanentLocationId | ref:locations.name",
            "852  $b",
        );
        r.record_type = RecordType::Holdings;
        let compiled = compile_rule(&r).unwrap();
        assert_eq!(compiled.destination.tag, "852");
        assert_eq!(compiled.reference.unwrap().table, "locations");
    }

    #[test]
    fn test_compile_rejects_bad_path() {
        let err = compile_rule(&rule("instance.title", "title", "245 10$a")).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPath { .. }));
    }

    #[test]
    fn test_compile_rejects_bad_destination() {
        let err = compile_rule(&rule("instance.title", "$.instance.title", "24X")).unwrap_err();
        assert!(matches!(err, TransformError::InvalidDestination { .. }));
    }

    #[test]
    fn test_compile_rejects_unknown_format() {
        let mut r = rule("instance.title", "$.instance.title", "245 10$a");
        r.format = Some("roman-numerals".to_string());
        assert!(matches!(
            compile_rule(&r),
            Err(TransformError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_on_the_fly_takes_default_destination() {
        let mut r = rule("instance.title", "", "");
        r.on_the_fly = true;
        let compiled = compile_rule(&r).unwrap();
        assert_eq!(compiled.destination.to_string(), "245 10$a");
        assert_eq!(compiled.path.to_string(), "$.instance.title");
    }

    #[test]
    fn test_on_the_fly_without_default_fails() {
        let mut r = rule("instance.custom", "$.instance.custom", "");
        r.on_the_fly = true;
        assert!(matches!(
            compile_rule(&r),
            Err(TransformError::MissingDefaultRule(id)) if id == "instance.custom"
        ));
    }

    #[test]
    fn test_empty_profile_uses_defaults() {
        let compiled = compile_profile(&MappingProfile::default_instance()).unwrap();
        assert!(compiled.uses_defaults);
        assert_eq!(compiled.primary, RecordType::Instance);
        assert_eq!(
            compiled.rules.len(),
            defaults::default_rules(RecordType::Instance).len()
        );
        assert!(!compiled.needs_holdings());
    }

    #[test]
    fn test_empty_profile_with_holdings_and_items() {
        let mut profile = MappingProfile::default_instance();
        profile.is_default = false;
        profile.record_types = vec![RecordType::Instance, RecordType::Holdings, RecordType::Item];
        let compiled = compile_profile(&profile).unwrap();
        assert!(compiled.needs_holdings());
        assert!(compiled.needs_items());
        assert!(compiled.referenced_tables().contains("locations"));
        assert!(compiled.referenced_tables().contains("materialTypes"));
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let mut profile = MappingProfile::default_instance();
        let mut disabled = rule("instance.title", "not a path", "???");
        disabled.enabled = false;
        profile.transformations = vec![
            disabled,
            rule("instance.hrid", "$.instance.hrid", "001"),
        ];
        let compiled = compile_profile(&profile).unwrap();
        assert!(!compiled.uses_defaults);
        assert_eq!(compiled.rules.len(), 1);
    }

    #[test]
    fn test_authority_profile_primary() {
        let compiled = compile_profile(&MappingProfile::default_authority()).unwrap();
        assert_eq!(compiled.primary, RecordType::Authority);
        assert!(compiled
            .rules
            .iter()
            .all(|r| r.record_type == RecordType::Authority));
    }
}
