//! Source path expressions
//!
//! A small JSON-path dialect parsed once at profile load:
//!
//! - `$` - the source record
//! - `.name` or `['name']` - object field; applied to every element of an array
//! - `[3]` - array index
//! - `[*]` - every array element or object value
//! - `[?(@.a.b=='v')]` - array elements whose nested field equals a literal
//!
//! An optional reference-data lookup is written after a pipe:
//! `$.holdings.permanentLocationId | ref:locations.name`.

use serde_json::Value;
use std::fmt;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
    Filter { field: Vec<String>, equals: String },
}

/// Parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
    source: String,
}

/// Reference-data substitution applied to extracted values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLookup {
    pub table: String,
    pub field: String,
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Split `path | ref:table.field` into its parts
///
/// # Errors
///
/// Returns a reason string if either part is malformed.
pub fn parse_source(expr: &str) -> Result<(JsonPath, Option<ReferenceLookup>), String> {
    match expr.split_once('|') {
        None => Ok((JsonPath::parse(expr)?, None)),
        Some((path, reference)) => {
            let reference = reference.trim();
            let target = reference
                .strip_prefix("ref:")
                .ok_or_else(|| format!("expected 'ref:table.field' after '|', got '{reference}'"))?;
            let (table, field) = target
                .split_once('.')
                .filter(|(t, f)| is_identifier(t) && is_identifier(f))
                .ok_or_else(|| format!("invalid reference '{target}'"))?;
            Ok((
                JsonPath::parse(path)?,
                Some(ReferenceLookup {
                    table: table.to_string(),
                    field: field.to_string(),
                }),
            ))
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl JsonPath {
    /// Parse a path expression
    ///
    /// # Errors
    ///
    /// Returns a reason string describing the first malformed segment.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let source = expr.trim();
        let rest = source
            .strip_prefix('$')
            .ok_or_else(|| "path must start with '$'".to_string())?;
        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    if !is_identifier(&name) {
                        return Err(format!("invalid field name '{name}' at offset {start}"));
                    }
                    segments.push(Segment::Field(name));
                    i = end;
                }
                '[' => {
                    let close = find_bracket_end(&chars, i)
                        .ok_or_else(|| format!("unclosed '[' at offset {i}"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim())?);
                    i = close + 1;
                }
                c => return Err(format!("unexpected '{c}' at offset {i}")),
            }
        }

        Ok(Self {
            segments,
            source: source.to_string(),
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Every node the path selects, in document order
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                apply_segment(segment, node, &mut next);
            }
            current = next;
        }
        current
    }

    /// Scalar values the path selects, rendered as strings
    ///
    /// Selected arrays contribute their scalar elements; nulls and objects
    /// contribute nothing.
    pub fn values(&self, root: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.select(root) {
            match node {
                Value::Array(items) => out.extend(items.iter().filter_map(scalar_text)),
                other => out.extend(scalar_text(other)),
            }
        }
        out
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn apply_segment<'a>(segment: &Segment, node: &'a Value, out: &mut Vec<&'a Value>) {
    match (segment, node) {
        (Segment::Field(name), Value::Object(map)) => out.extend(map.get(name)),
        (Segment::Field(_), Value::Array(items)) => {
            for item in items {
                apply_segment(segment, item, out);
            }
        }
        (Segment::Index(index), Value::Array(items)) => out.extend(items.get(*index)),
        (Segment::Wildcard, Value::Array(items)) => out.extend(items.iter()),
        (Segment::Wildcard, Value::Object(map)) => out.extend(map.values()),
        (Segment::Filter { field, equals }, Value::Array(items)) => {
            out.extend(items.iter().filter(|item| matches_filter(item, field, equals)));
        }
        (Segment::Filter { field, equals }, Value::Object(_)) => {
            if matches_filter(node, field, equals) {
                out.push(node);
            }
        }
        _ => {}
    }
}

fn matches_filter(item: &Value, field: &[String], equals: &str) -> bool {
    let mut node = item;
    for name in field {
        match node.get(name) {
            Some(next) => node = next,
            None => return false,
        }
    }
    scalar_text(node).is_some_and(|text| text == equals)
}

fn find_bracket_end(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, &c) in chars[open + 1..].iter().enumerate() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(open + 1 + offset),
            (None, _) => {}
        }
    }
    None
}

fn parse_bracket(inner: &str) -> Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Ok(index) = inner.parse::<usize>() {
        return Ok(Segment::Index(index));
    }
    if let Some(name) = unquote(inner) {
        if is_identifier(name) {
            return Ok(Segment::Field(name.to_string()));
        }
        return Err(format!("invalid field name '{name}'"));
    }
    if let Some(expr) = inner
        .strip_prefix("?(")
        .and_then(|s| s.strip_suffix(')'))
    {
        return parse_filter(expr.trim());
    }
    Err(format!("unsupported bracket expression '[{inner}]'"))
}

fn parse_filter(expr: &str) -> Result<Segment, String> {
    let (lhs, rhs) = expr
        .split_once("==")
        .ok_or_else(|| format!("filter '{expr}' must compare with '=='"))?;
    let field_path = lhs
        .trim()
        .strip_prefix("@.")
        .ok_or_else(|| format!("filter '{expr}' must start with '@.'"))?;
    let field: Vec<String> = field_path.split('.').map(str::to_string).collect();
    if field.iter().any(|name| !is_identifier(name)) {
        return Err(format!("invalid filter field '{field_path}'"));
    }
    let equals = unquote(rhs.trim())
        .ok_or_else(|| format!("filter value in '{expr}' must be quoted"))?
        .to_string();
    Ok(Segment::Filter { field, equals })
}

fn unquote(s: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
            .filter(|inner| !inner.contains(q))
    })
}
