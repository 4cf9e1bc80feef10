//! Pullplan Runner — catalogs, batch resolution, scheduling and export.
//!
//! Sits on top of `pullplan-core`:
//! - Loads a directory of named template documents
//! - Resolves them all, optionally in parallel
//! - Derives an intraday pull schedule from the resulting plans
//! - Writes per-document CSV and JSON artifacts

pub mod batch;
pub mod catalog;
pub mod config;
pub mod export;
pub mod schedule;

pub use batch::{BatchReport, BatchResolver, DocumentReport};
pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use config::{ConfigError, RunnerConfig, ScheduleConfig};
pub use export::{report_json, units_csv, write_artifacts, write_document, ExportError};
pub use schedule::{format_offset, Schedule, ScheduleItem};
