//! Range & grid expander — turns a resolved template into its request grid.
//!
//! The grid is never materialized: [`ExpandedTemplate::units`] walks the symbol × field
//! product on demand, symbol outer and field inner. Calling it again restarts the walk
//! from the first unit, and the order is always the same.

use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::merge::{check_resolved, ResolvedTemplate};
use crate::resolution::Resolution;
use crate::template::Orientation;

/// When a template with neither `start` nor `end` is acceptable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// Every template needs at least one date bound.
    Require,
    /// Only templates with a resolution need a date bound.
    WhenResolved,
    /// Unscoped templates are accepted as snapshots; the fetch side decides.
    #[default]
    Allow,
}

impl ScopePolicy {
    pub fn requires_anchor(self, has_resolution: bool) -> bool {
        match self {
            ScopePolicy::Require => true,
            ScopePolicy::WhenResolved => has_resolution,
            ScopePolicy::Allow => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopePolicy::Require => "require",
            ScopePolicy::WhenResolved => "when_resolved",
            ScopePolicy::Allow => "allow",
        }
    }
}

impl FromStr for ScopePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require" => Ok(ScopePolicy::Require),
            "when_resolved" | "when-resolved" => Ok(ScopePolicy::WhenResolved),
            "allow" => Ok(ScopePolicy::Allow),
            other => Err(format!(
                "unknown scope policy '{other}' (expected require, when_resolved or allow)"
            )),
        }
    }
}

impl fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temporal scope of a template. Open bounds are passed through as-is; filling them
/// in (e.g. with "today") is the fetcher's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateSpan {
    /// Inclusive `[start, end]`.
    Bounded { start: NaiveDate, end: NaiveDate },
    /// From `start` onwards.
    From { start: NaiveDate },
    /// Up to and including `end`.
    Until { end: NaiveDate },
    Unscoped,
}

impl DateSpan {
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => DateSpan::Bounded { start, end },
            (Some(start), None) => DateSpan::From { start },
            (None, Some(end)) => DateSpan::Until { end },
            (None, None) => DateSpan::Unscoped,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match *self {
            DateSpan::Bounded { start, .. } | DateSpan::From { start } => Some(start),
            _ => None,
        }
    }

    pub fn end(&self) -> Option<NaiveDate> {
        match *self {
            DateSpan::Bounded { end, .. } | DateSpan::Until { end } => Some(end),
            _ => None,
        }
    }

    pub fn is_unscoped(&self) -> bool {
        matches!(self, DateSpan::Unscoped)
    }
}

/// One concrete fetch instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestUnit {
    pub vendor: String,
    pub endpoint: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub resolution: Option<Resolution>,
    pub symbol: String,
    pub field: String,
}

/// A resolved template with every required field present, ready to be walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedTemplate {
    pub vendor: String,
    pub endpoint: String,
    pub span: DateSpan,
    pub resolution: Option<Resolution>,
    pub orientation: Orientation,
    pub symbols: Vec<String>,
    pub fields: Vec<String>,
}

impl ExpandedTemplate {
    /// Number of units in the grid.
    pub fn len(&self) -> usize {
        self.symbols.len().saturating_mul(self.fields.len())
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() || self.fields.is_empty()
    }

    /// Lazy walk over the grid.
    pub fn units(&self) -> RequestUnits<'_> {
        RequestUnits {
            template: self,
            next: 0,
            end: self.len(),
        }
    }

    /// The unit at grid position `index`, or `None` past the end.
    pub fn unit(&self, index: usize) -> Option<RequestUnit> {
        if index >= self.len() {
            return None;
        }
        let width = self.fields.len();
        Some(self.build_unit(&self.symbols[index / width], &self.fields[index % width]))
    }

    fn build_unit(&self, symbol: &str, field: &str) -> RequestUnit {
        RequestUnit {
            vendor: self.vendor.clone(),
            endpoint: self.endpoint.clone(),
            start: self.span.start(),
            end: self.span.end(),
            resolution: self.resolution.clone(),
            symbol: symbol.to_string(),
            field: field.to_string(),
        }
    }
}

/// Iterator over an [`ExpandedTemplate`]'s grid.
#[derive(Debug, Clone)]
pub struct RequestUnits<'a> {
    template: &'a ExpandedTemplate,
    next: usize,
    end: usize,
}

impl Iterator for RequestUnits<'_> {
    type Item = RequestUnit;

    fn next(&mut self) -> Option<RequestUnit> {
        if self.next >= self.end {
            return None;
        }
        let unit = self.template.unit(self.next);
        self.next += 1;
        unit
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<RequestUnit> {
        self.next = self.next.saturating_add(n).min(self.end);
        self.next()
    }
}

impl ExactSizeIterator for RequestUnits<'_> {}

impl FusedIterator for RequestUnits<'_> {}

/// Expand a resolved template.
///
/// Re-runs the post-merge checks, then applies the scope policy. All failures are
/// returned together.
pub fn expand(
    resolved: &ResolvedTemplate,
    policy: ScopePolicy,
) -> Result<ExpandedTemplate, Vec<TemplateError>> {
    let mut errors = check_resolved(resolved).err().unwrap_or_default();

    let span = DateSpan::from_bounds(resolved.start, resolved.end);
    if span.is_unscoped() && policy.requires_anchor(resolved.resolution.is_some()) {
        errors.push(TemplateError::UnscopedRange);
    }

    match (
        &resolved.vendor,
        &resolved.endpoint,
        &resolved.symbol,
        &resolved.field,
    ) {
        (Some(vendor), Some(endpoint), Some(symbols), Some(fields)) if errors.is_empty() => {
            Ok(ExpandedTemplate {
                vendor: vendor.clone(),
                endpoint: endpoint.clone(),
                span,
                resolution: resolved.resolution.clone(),
                orientation: resolved.orientation,
                symbols: symbols.clone(),
                fields: fields.clone(),
            })
        }
        _ => Err(errors),
    }
}
