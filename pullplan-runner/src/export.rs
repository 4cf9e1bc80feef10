//! Plan export — per-unit CSV and report JSON artifacts.
//!
//! For each document `<output_dir>/<document>/` receives:
//! - `units.csv`: one row per request unit of every plan, with the cell it fills
//! - `report.json`: the full run report (or the document error), plus its fingerprint

use std::path::{Path, PathBuf};

use pullplan_core::{RunReport, SchemaViolation};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::batch::{BatchReport, DocumentReport};

pub const UNITS_FILE: &str = "units.csv";
pub const REPORT_FILE: &str = "report.json";

const UNIT_COLUMNS: [&str; 10] = [
    "template_index",
    "vendor",
    "endpoint",
    "start",
    "end",
    "resolution",
    "symbol",
    "field",
    "row",
    "column",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV encoding: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// What lands in `report.json`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportArtifact<'a> {
    Resolved {
        document: &'a str,
        fingerprint: String,
        report: &'a RunReport,
    },
    Rejected {
        document: &'a str,
        error: String,
        violations: Vec<SchemaViolation>,
    },
}

impl<'a> ReportArtifact<'a> {
    pub fn new(doc: &'a DocumentReport) -> Self {
        match &doc.result {
            Ok(report) => ReportArtifact::Resolved {
                document: &doc.name,
                fingerprint: report.fingerprint(),
                report,
            },
            Err(err) => ReportArtifact::Rejected {
                document: &doc.name,
                error: err.to_string(),
                violations: err.violations(),
            },
        }
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Every unit of every plan in `report`, one row each.
pub fn units_csv(report: &RunReport) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(UNIT_COLUMNS)?;

    for plan in report.plans() {
        let index = plan.template_index.to_string();
        for (unit, cell) in plan.placed_units() {
            let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
            let (row, column) = cell
                .map(|c| (c.row.to_string(), c.column.to_string()))
                .unwrap_or_default();
            wtr.write_record([
                index.as_str(),
                unit.vendor.as_str(),
                unit.endpoint.as_str(),
                date(unit.start).as_str(),
                date(unit.end).as_str(),
                unit.resolution.as_ref().map_or("", |r| r.as_str()),
                unit.symbol.as_str(),
                unit.field.as_str(),
                row.as_str(),
                column.as_str(),
            ])?;
        }
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn report_json(doc: &DocumentReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&ReportArtifact::new(doc))?)
}

// ─── Artifact writing ───────────────────────────────────────────────

/// Write one document's artifacts under `<output_dir>/<name>/`.
///
/// Rejected documents get only `report.json`. Returns the paths written.
pub fn write_document(output_dir: &Path, doc: &DocumentReport) -> Result<Vec<PathBuf>, ExportError> {
    let dir = output_dir.join(&doc.name);
    std::fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut written = Vec::with_capacity(2);
    if let Some(report) = doc.report() {
        written.push(write_file(&dir.join(UNITS_FILE), &units_csv(report)?)?);
    }
    written.push(write_file(&dir.join(REPORT_FILE), &report_json(doc)?)?);

    info!(document = %doc.name, dir = %dir.display(), files = written.len(), "artifacts written");
    Ok(written)
}

/// Write artifacts for every document in `batch`.
pub fn write_artifacts(output_dir: &Path, batch: &BatchReport) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    for doc in &batch.documents {
        written.extend(write_document(output_dir, doc)?);
    }
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<PathBuf, ExportError> {
    std::fs::write(path, content).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
