//! Schema validator — checks a raw JSON document against the template schema.
//!
//! Checks are lexical and structural only. Date ordering and required fields depend on
//! what `common` supplies, so they are deferred to the merger.
//!
//! Every violation is collected with its path. Traversal stops early only when the
//! document shape itself is wrong (root not an object, `templates` not an array,
//! `common` not an object).

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::SchemaViolation;
use crate::resolution::Resolution;
use crate::template::{Orientation, RawConfig, Template};

/// Keys a template object may carry.
pub const TEMPLATE_KEYS: [&str; 8] = [
    "vendor",
    "endpoint",
    "start",
    "end",
    "resolution",
    "orientation",
    "symbol",
    "field",
];

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"))
}

/// Borrowed view of a document whose top-level shape is sound.
#[derive(Debug, Clone, Copy)]
pub struct DocumentParts<'a> {
    pub common: Option<&'a Value>,
    pub templates: &'a [Value],
}

/// Structural validator for template documents.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    deny_unknown_fields: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            deny_unknown_fields: true,
        }
    }
}

impl Validator {
    pub fn new(deny_unknown_fields: bool) -> Self {
        Self {
            deny_unknown_fields,
        }
    }

    /// Validate a whole document. All-or-nothing: any violation rejects the document.
    pub fn validate(&self, doc: &Value) -> Result<RawConfig, Vec<SchemaViolation>> {
        let parts = self.split(doc).map_err(|v| vec![v])?;
        let mut violations = Vec::new();

        let common = match parts.common {
            Some(value) => match self.template(value, "common") {
                Ok(t) => Some(t),
                Err(mut vs) => {
                    violations.append(&mut vs);
                    None
                }
            },
            None => None,
        };

        let mut templates = Vec::with_capacity(parts.templates.len());
        for (i, value) in parts.templates.iter().enumerate() {
            match self.template(value, &template_path(i)) {
                Ok(t) => templates.push(t),
                Err(mut vs) => violations.append(&mut vs),
            }
        }

        if violations.is_empty() {
            Ok(RawConfig { common, templates })
        } else {
            Err(violations)
        }
    }

    /// Check the top-level shape and hand back the pieces.
    ///
    /// Keys other than `common` and `templates` at the root are ignored.
    pub fn split<'a>(&self, doc: &'a Value) -> Result<DocumentParts<'a>, SchemaViolation> {
        let root = doc.as_object().ok_or_else(|| {
            SchemaViolation::new("$", format!("expected an object, got {}", kind(doc)))
        })?;

        let common = match root.get("common") {
            Some(value) if value.is_object() => Some(value),
            Some(value) => {
                return Err(SchemaViolation::new(
                    "common",
                    format!("expected an object, got {}", kind(value)),
                ))
            }
            None => None,
        };

        let templates: &[Value] = match root.get("templates") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(value) => {
                return Err(SchemaViolation::new(
                    "templates",
                    format!("expected an array, got {}", kind(value)),
                ))
            }
            None => &[],
        };

        Ok(DocumentParts { common, templates })
    }

    /// Validate one template object found at `path`.
    pub fn template(&self, value: &Value, path: &str) -> Result<Template, Vec<SchemaViolation>> {
        let Some(obj) = value.as_object() else {
            return Err(vec![SchemaViolation::new(
                path,
                format!("expected an object, got {}", kind(value)),
            )]);
        };

        let mut violations = Vec::new();
        let mut template = Template {
            vendor: string_field(obj, path, "vendor", &mut violations),
            endpoint: string_field(obj, path, "endpoint", &mut violations),
            start: date_field(obj, path, "start", &mut violations),
            end: date_field(obj, path, "end", &mut violations),
            ..Template::default()
        };

        if let Some(raw) = string_field(obj, path, "resolution", &mut violations) {
            match Resolution::parse(&raw) {
                Ok(r) => template.resolution = Some(r),
                Err(e) => violations.push(SchemaViolation::new(
                    field_path(path, "resolution"),
                    e.to_string(),
                )),
            }
        }

        if let Some(raw) = string_field(obj, path, "orientation", &mut violations) {
            match raw.parse::<Orientation>() {
                Ok(o) => template.orientation = Some(o),
                Err(reason) => {
                    violations.push(SchemaViolation::new(field_path(path, "orientation"), reason))
                }
            }
        }

        template.symbol = string_list_field(obj, path, "symbol", &mut violations);
        template.field = string_list_field(obj, path, "field", &mut violations);

        if self.deny_unknown_fields {
            for key in obj.keys() {
                if !TEMPLATE_KEYS.contains(&key.as_str()) {
                    violations.push(SchemaViolation::new(
                        field_path(path, key),
                        format!("unknown field (expected one of {})", TEMPLATE_KEYS.join(", ")),
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(template)
        } else {
            Err(violations)
        }
    }
}

/// Validate with the default (strict) validator.
pub fn validate(doc: &Value) -> Result<RawConfig, Vec<SchemaViolation>> {
    Validator::default().validate(doc)
}

pub fn template_path(index: usize) -> String {
    format!("templates[{index}]")
}

fn field_path(base: &str, key: &str) -> String {
    format!("{base}.{key}")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_field(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    violations: &mut Vec<SchemaViolation>,
) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => {
            violations.push(SchemaViolation::new(
                field_path(path, key),
                format!("expected a string, got {}", kind(other)),
            ));
            None
        }
    }
}

fn date_field(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    violations: &mut Vec<SchemaViolation>,
) -> Option<NaiveDate> {
    let raw = string_field(obj, path, key, violations)?;
    let parsed = date_re()
        .is_match(&raw)
        .then(|| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok())
        .flatten();
    if parsed.is_none() {
        violations.push(SchemaViolation::new(
            field_path(path, key),
            format!("'{raw}' is not a calendar date (expected YYYY-MM-DD)"),
        ));
    }
    parsed
}

fn string_list_field(
    obj: &Map<String, Value>,
    path: &str,
    key: &str,
    violations: &mut Vec<SchemaViolation>,
) -> Option<Vec<String>> {
    let items = match obj.get(key)? {
        Value::Array(items) => items,
        other => {
            violations.push(SchemaViolation::new(
                field_path(path, key),
                format!("expected an array of strings, got {}", kind(other)),
            ));
            return None;
        }
    };

    let before = violations.len();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) => out.push(s.clone()),
            other => violations.push(SchemaViolation::new(
                format!("{}[{i}]", field_path(path, key)),
                format!("expected a string, got {}", kind(other)),
            )),
        }
    }
    (violations.len() == before).then_some(out)
}
