//! Batch resolution — resolve every document in a catalog.
//!
//! Documents and, within each document, templates are independent, so both levels
//! fan out on the rayon pool when parallelism is on. Results always come back in
//! catalog order and template order, whatever the thread scheduling.

use pullplan_core::{DocumentError, Resolver, RunReport, TemplatePlan};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::RunnerConfig;

/// Result of resolving one named document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub name: String,
    pub result: Result<RunReport, DocumentError>,
}

impl DocumentReport {
    pub fn report(&self) -> Option<&RunReport> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DocumentError> {
        self.result.as_ref().err()
    }

    /// True when the document resolved and none of its templates failed.
    pub fn is_clean(&self) -> bool {
        self.report().is_some_and(RunReport::is_clean)
    }
}

/// Reports for a whole catalog, in catalog (sorted name) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn get(&self, name: &str) -> Option<&DocumentReport> {
        self.documents.iter().find(|d| d.name == name)
    }

    /// Every successful plan, tagged with its document name.
    pub fn plans(&self) -> impl Iterator<Item = (&str, &TemplatePlan)> {
        self.documents.iter().flat_map(|doc| {
            doc.report()
                .into_iter()
                .flat_map(|report| report.plans())
                .map(move |plan| (doc.name.as_str(), plan))
        })
    }

    pub fn unit_count(&self) -> usize {
        self.documents
            .iter()
            .filter_map(DocumentReport::report)
            .map(RunReport::unit_count)
            .sum()
    }

    /// Template failures across all resolved documents.
    pub fn failure_count(&self) -> usize {
        self.documents
            .iter()
            .filter_map(DocumentReport::report)
            .map(|r| r.failures().count())
            .sum()
    }

    /// Documents that could not be resolved at all.
    pub fn rejected(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| d.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.documents.iter().all(DocumentReport::is_clean)
    }
}

/// Resolves catalogs, sequentially or on the rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct BatchResolver {
    resolver: Resolver,
    parallel: bool,
}

impl Default for BatchResolver {
    fn default() -> Self {
        Self::new(Resolver::default())
    }
}

impl BatchResolver {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            parallel: true,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(Resolver::new(config.resolve_options())).with_parallelism(config.parallel)
    }

    /// Enable or disable parallel resolution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn resolve_catalog(&self, catalog: &Catalog) -> BatchReport {
        let documents = if self.parallel {
            catalog
                .entries()
                .par_iter()
                .map(|entry| self.resolve_entry(entry))
                .collect()
        } else {
            catalog
                .entries()
                .iter()
                .map(|entry| self.resolve_entry(entry))
                .collect()
        };
        BatchReport { documents }
    }

    pub fn resolve_entry(&self, entry: &CatalogEntry) -> DocumentReport {
        let result = self.resolve_document(&entry.document);
        match &result {
            Ok(report) => info!(
                document = %entry.name,
                templates = report.outcomes.len(),
                planned = report.plans().count(),
                failed = report.failures().count(),
                units = report.unit_count(),
                "document resolved"
            ),
            Err(err) => warn!(document = %entry.name, error = %err, "document rejected"),
        }
        DocumentReport {
            name: entry.name.clone(),
            result,
        }
    }

    fn resolve_document(&self, doc: &serde_json::Value) -> Result<RunReport, DocumentError> {
        let prepared = self.resolver.prepare(doc)?;
        let outcomes = if self.parallel {
            (0..prepared.len())
                .into_par_iter()
                .filter_map(|i| self.resolver.outcome(&prepared, i))
                .collect()
        } else {
            (0..prepared.len())
                .filter_map(|i| self.resolver.outcome(&prepared, i))
                .collect()
        };
        Ok(RunReport { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::from_documents([
            (
                "equities",
                json!({
                    "common": {"vendor": "acme", "endpoint": "/prices", "field": ["close"],
                               "start": "2024-01-01"},
                    "templates": [{"symbol": ["A", "B"]}, {"symbol": ["C"], "endpoint": 7}]
                }),
            ),
            ("broken", json!({"templates": {}})),
            ("empty", json!({})),
        ])
        .unwrap()
    }

    #[test]
    fn reports_follow_catalog_order() {
        let batch = BatchResolver::default().resolve_catalog(&catalog());
        let names: Vec<&str> = batch.documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["broken", "empty", "equities"]);
    }

    #[test]
    fn failures_are_counted_per_level() {
        let batch = BatchResolver::default().resolve_catalog(&catalog());
        assert_eq!(batch.rejected().count(), 1);
        assert!(batch.get("broken").unwrap().error().is_some());
        assert!(batch.get("empty").unwrap().is_clean());
        assert_eq!(batch.failure_count(), 1);
        assert_eq!(batch.unit_count(), 2);
        assert_eq!(batch.plans().count(), 1);
        assert!(!batch.is_clean());
    }

    #[test]
    fn parallel_matches_sequential() {
        let catalog = catalog();
        let parallel = BatchResolver::default().resolve_catalog(&catalog);
        let sequential = BatchResolver::default()
            .with_parallelism(false)
            .resolve_catalog(&catalog);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn matches_single_document_resolution() {
        let catalog = catalog();
        let batch = BatchResolver::default().resolve_catalog(&catalog);
        let direct = Resolver::default()
            .resolve(&catalog.get("equities").unwrap().document)
            .unwrap();
        assert_eq!(batch.get("equities").unwrap().report(), Some(&direct));
    }
}
