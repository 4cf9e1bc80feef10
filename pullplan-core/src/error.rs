//! Error taxonomy.
//!
//! - `SchemaViolation`: one offending path in the raw document.
//! - `TemplateError`: anything that fails a single template (schema, merge, or expansion).
//! - `DocumentError`: corruption that stops the whole run.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structural rule broken at `path` (e.g. `templates[2].resolution`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Fields a template must carry after merging before it can be expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredField {
    Vendor,
    Endpoint,
    Symbol,
    Field,
}

impl RequiredField {
    pub const ALL: [RequiredField; 4] = [
        RequiredField::Vendor,
        RequiredField::Endpoint,
        RequiredField::Symbol,
        RequiredField::Field,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequiredField::Vendor => "vendor",
            RequiredField::Endpoint => "endpoint",
            RequiredField::Symbol => "symbol",
            RequiredField::Field => "field",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure scoped to one template. Siblings are never affected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemplateError {
    #[error("schema violation at {}", .0)]
    Schema(SchemaViolation),

    #[error("missing required field '{field}' after merging with common")]
    MissingRequiredField { field: RequiredField },

    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no start or end date, but the fetch needs a date anchor")]
    UnscopedRange,
}

/// Corruption that prevents resolving any template in the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Root, `common`, or `templates` has the wrong JSON type.
    #[error("malformed document: {0}")]
    Structure(SchemaViolation),

    /// The shared template is invalid, so no entry can be merged. Carries every
    /// violation found in the document, not only those under `common`.
    #[error("common template is invalid ({} violation(s) in document)", violations.len())]
    InvalidCommon { violations: Vec<SchemaViolation> },
}

impl DocumentError {
    /// Every violation behind this error.
    pub fn violations(&self) -> Vec<SchemaViolation> {
        match self {
            DocumentError::Structure(v) => vec![v.clone()],
            DocumentError::InvalidCommon { violations } => violations.clone(),
        }
    }
}
