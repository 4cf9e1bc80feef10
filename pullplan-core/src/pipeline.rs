//! Resolution pipeline — validate, merge, expand, shape.
//!
//! Errors stay with the template that caused them. Only a malformed document
//! (wrong root/`common`/`templates` type, or an invalid `common`) stops the run.
//!
//! Resolution is split into [`Resolver::prepare`] (document-level checks) and
//! [`Resolver::outcome`] (one template), so callers can fan templates out across
//! threads. [`Resolver::resolve`] runs both sequentially.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{DocumentError, SchemaViolation, TemplateError};
use crate::expand::{expand, ExpandedTemplate, RequestUnit, RequestUnits, ScopePolicy};
use crate::merge::{merge, ResolvedTemplate};
use crate::shape::{shape, Cell, OutputShape, Placement};
use crate::template::{RawConfig, Template};
use crate::validate::{template_path, Validator};

/// Knobs for a resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    pub scope: ScopePolicy,
    pub deny_unknown_fields: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            scope: ScopePolicy::default(),
            deny_unknown_fields: true,
        }
    }
}

/// A template that made it through every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePlan {
    pub template_index: usize,
    pub resolved: ResolvedTemplate,
    pub expanded: ExpandedTemplate,
    pub shape: OutputShape,
}

impl TemplatePlan {
    pub fn units(&self) -> RequestUnits<'_> {
        self.expanded.units()
    }

    /// Units paired with the cell their value lands in.
    pub fn placed_units(&self) -> impl Iterator<Item = (RequestUnit, Option<Cell>)> + '_ {
        let placement = Placement::new(&self.expanded);
        self.units().enumerate().map(move |(i, unit)| (unit, placement.cell(i)))
    }
}

/// A template that failed, with everything wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFailure {
    pub template_index: usize,
    pub errors: Vec<TemplateError>,
}

/// Result for one template, keyed by its position in `templates`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TemplateOutcome {
    Planned(TemplatePlan),
    Failed(TemplateFailure),
}

impl TemplateOutcome {
    pub fn template_index(&self) -> usize {
        match self {
            TemplateOutcome::Planned(p) => p.template_index,
            TemplateOutcome::Failed(f) => f.template_index,
        }
    }

    pub fn plan(&self) -> Option<&TemplatePlan> {
        match self {
            TemplateOutcome::Planned(p) => Some(p),
            TemplateOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&TemplateFailure> {
        match self {
            TemplateOutcome::Planned(_) => None,
            TemplateOutcome::Failed(f) => Some(f),
        }
    }
}

/// Everything one run produced, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<TemplateOutcome>,
}

impl RunReport {
    pub fn plans(&self) -> impl Iterator<Item = &TemplatePlan> {
        self.outcomes.iter().filter_map(TemplateOutcome::plan)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TemplateFailure> {
        self.outcomes.iter().filter_map(TemplateOutcome::failure)
    }

    /// True when no template failed.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Total units across all plans.
    pub fn unit_count(&self) -> usize {
        self.plans().map(|p| p.expanded.len()).sum()
    }

    /// BLAKE3 hex digest of the report's canonical JSON.
    ///
    /// Equal documents resolved with equal options always give the same digest.
    pub fn fingerprint(&self) -> String {
        // Derived impls only, every map key a string: serialization cannot fail.
        let json = serde_json::to_string(self).expect("RunReport must serialize");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// A document that passed the document-level checks.
///
/// Each entry is either a schema-valid template or the violations found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    pub common: Option<Template>,
    pub entries: Vec<Result<Template, Vec<SchemaViolation>>>,
}

impl PreparedDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&RawConfig> for PreparedDocument {
    fn from(config: &RawConfig) -> Self {
        Self {
            common: config.common.clone(),
            entries: config.templates.iter().cloned().map(Ok).collect(),
        }
    }
}

/// Runs documents through the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Resolve a raw JSON document.
    pub fn resolve(&self, doc: &Value) -> Result<RunReport, DocumentError> {
        let prepared = self.prepare(doc)?;
        Ok(self.resolve_prepared(&prepared))
    }

    /// Resolve an already-typed document. Schema checks are skipped: the types
    /// already guarantee them.
    pub fn resolve_config(&self, config: &RawConfig) -> RunReport {
        self.resolve_prepared(&PreparedDocument::from(config))
    }

    pub fn resolve_prepared(&self, prepared: &PreparedDocument) -> RunReport {
        RunReport {
            outcomes: (0..prepared.len())
                .filter_map(|i| self.outcome(prepared, i))
                .collect(),
        }
    }

    /// Document-level checks plus per-template schema validation.
    ///
    /// An invalid `common` is fatal; the error still lists the violations of every
    /// template so the caller sees the whole picture in one pass.
    pub fn prepare(&self, doc: &Value) -> Result<PreparedDocument, DocumentError> {
        let validator = Validator::new(self.options.deny_unknown_fields);
        let parts = validator.split(doc).map_err(DocumentError::Structure)?;

        let common = parts
            .common
            .map(|value| validator.template(value, "common"))
            .transpose();

        let entries: Vec<Result<Template, Vec<SchemaViolation>>> = parts
            .templates
            .iter()
            .enumerate()
            .map(|(i, value)| validator.template(value, &template_path(i)))
            .collect();

        match common {
            Ok(common) => Ok(PreparedDocument { common, entries }),
            Err(mut violations) => {
                for entry in entries {
                    if let Err(mut vs) = entry {
                        violations.append(&mut vs);
                    }
                }
                Err(DocumentError::InvalidCommon { violations })
            }
        }
    }

    /// Run one template through merge, expand and shape. `None` past the end.
    pub fn outcome(&self, prepared: &PreparedDocument, index: usize) -> Option<TemplateOutcome> {
        let entry = match prepared.entries.get(index)? {
            Ok(entry) => entry,
            Err(violations) => {
                debug!(template_index = index, violations = violations.len(), "schema violations");
                return Some(TemplateOutcome::Failed(TemplateFailure {
                    template_index: index,
                    errors: violations.iter().cloned().map(TemplateError::Schema).collect(),
                }));
            }
        };

        let resolved = merge(prepared.common.as_ref(), entry);
        let outcome = match expand(&resolved, self.options.scope) {
            Ok(expanded) => {
                let shape = shape(&expanded);
                debug!(
                    template_index = index,
                    units = expanded.len(),
                    orientation = %expanded.orientation,
                    "template planned"
                );
                TemplateOutcome::Planned(TemplatePlan {
                    template_index: index,
                    resolved,
                    expanded,
                    shape,
                })
            }
            Err(errors) => {
                debug!(template_index = index, errors = errors.len(), "template failed");
                TemplateOutcome::Failed(TemplateFailure {
                    template_index: index,
                    errors,
                })
            }
        };
        Some(outcome)
    }
}

/// Resolve a document with default options.
pub fn resolve(doc: &Value) -> Result<RunReport, DocumentError> {
    Resolver::default().resolve(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequiredField;
    use serde_json::json;

    #[test]
    fn empty_document_is_an_empty_report() {
        let report = resolve(&json!({})).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn common_alone_yields_nothing() {
        let report = resolve(&json!({"common": {"vendor": "acme", "endpoint": "/x",
            "symbol": ["A"], "field": ["f"]}}))
        .unwrap();
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn schema_violations_stay_with_their_template() {
        let doc = json!({
            "common": {"vendor": "acme", "endpoint": "/prices", "field": ["close"]},
            "templates": [
                {"symbol": ["A"], "resolution": "weekly"},
                {"symbol": ["B"]}
            ]
        });
        let report = resolve(&doc).unwrap();
        assert_eq!(report.outcomes.len(), 2);

        let failure = report.outcomes[0].failure().unwrap();
        assert_eq!(failure.template_index, 0);
        assert!(matches!(
            failure.errors.as_slice(),
            [TemplateError::Schema(v)] if v.path == "templates[0].resolution"
        ));

        let plan = report.outcomes[1].plan().unwrap();
        assert_eq!(plan.template_index, 1);
        assert_eq!(plan.expanded.len(), 1);
    }

    #[test]
    fn invalid_common_is_fatal_and_lists_everything() {
        let doc = json!({
            "common": {"orientation": "sideways"},
            "templates": [{"vendor": 1}, {"vendor": "ok"}]
        });
        let err = resolve(&doc).unwrap_err();
        let paths: Vec<String> = err.violations().into_iter().map(|v| v.path).collect();
        assert_eq!(paths, vec!["common.orientation", "templates[0].vendor"]);
    }

    #[test]
    fn structural_corruption_is_fatal() {
        let err = resolve(&json!({"templates": "nope"})).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v) if v.path == "templates"));

        let err = resolve(&json!({"common": [1]})).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v) if v.path == "common"));

        let err = resolve(&json!(null)).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v) if v.path == "$"));
    }

    #[test]
    fn null_sections_are_not_absent_sections() {
        let err = resolve(&json!({"common": null})).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v)
            if v.path == "common" && v.reason.contains("got null")));

        let err = resolve(&json!({"templates": null})).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v)
            if v.path == "templates" && v.reason.contains("got null")));

        let err = resolve(&json!({"common": null, "templates": []})).unwrap_err();
        assert!(matches!(err, DocumentError::Structure(ref v) if v.path == "common"));
    }

    #[test]
    fn merge_errors_are_per_template() {
        let doc = json!({
            "common": {"vendor": "acme", "field": ["close"]},
            "templates": [
                {"endpoint": "/prices", "symbol": ["A"]},
                {"symbol": ["B"]}
            ]
        });
        let report = resolve(&doc).unwrap();
        assert!(report.outcomes[0].plan().is_some());
        assert_eq!(
            report.outcomes[1].failure().unwrap().errors,
            vec![TemplateError::MissingRequiredField {
                field: RequiredField::Endpoint
            }]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn resolve_config_matches_resolve() {
        let doc = json!({
            "common": {"vendor": "acme", "endpoint": "/p", "resolution": "P1D",
                       "start": "2024-01-01"},
            "templates": [{"symbol": ["A", "B"], "field": ["open", "close"],
                           "orientation": "long"}]
        });
        let resolver = Resolver::default();
        let config = crate::validate::validate(&doc).unwrap();
        assert_eq!(resolver.resolve(&doc).unwrap(), resolver.resolve_config(&config));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let doc = json!({"templates": [{"vendor": "acme", "endpoint": "/p",
            "symbol": ["A"], "field": ["x"]}]});
        let a = resolve(&doc).unwrap().fingerprint();
        let b = resolve(&doc).unwrap().fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other = json!({"templates": [{"vendor": "acme", "endpoint": "/p",
            "symbol": ["B"], "field": ["x"]}]});
        assert_ne!(a, resolve(&other).unwrap().fingerprint());
    }

    #[test]
    fn placed_units_pair_units_with_cells() {
        let doc = json!({"templates": [{"vendor": "acme", "endpoint": "/p",
            "symbol": ["A", "B"], "field": ["x", "y"]}]});
        let report = resolve(&doc).unwrap();
        let plan = report.plans().next().unwrap();
        let cells: Vec<(usize, usize)> = plan
            .placed_units()
            .map(|(_, cell)| {
                let cell = cell.unwrap();
                (cell.row, cell.column)
            })
            .collect();
        assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn placed_units_cover_a_large_grid() {
        let symbols: Vec<String> = (0..2000).map(|i| format!("S{i}")).collect();
        let fields: Vec<String> = (0..50).map(|i| format!("f{i}")).collect();
        let doc = json!({"templates": [{"vendor": "acme", "endpoint": "/p",
            "symbol": symbols, "field": fields}]});
        let report = resolve(&doc).unwrap();
        let plan = report.plans().next().unwrap();
        let mut placed = 0;
        for (i, (unit, cell)) in plan.placed_units().enumerate() {
            let cell = cell.unwrap();
            assert_eq!((cell.row, cell.column), (i / 50, i % 50));
            if i % 997 == 0 {
                assert_eq!(plan.shape.locate(i, &unit), Some(cell));
            }
            placed += 1;
        }
        assert_eq!(placed, 100_000);
    }

    #[test]
    fn outcome_past_the_end_is_none() {
        let resolver = Resolver::default();
        let prepared = resolver.prepare(&json!({"templates": []})).unwrap();
        assert!(prepared.is_empty());
        assert!(resolver.outcome(&prepared, 0).is_none());
    }
}
