//! Pullplan Core — template validation, merging, grid expansion and output shaping.
//!
//! A template document describes recurring data pulls: vendor, endpoint, date range,
//! resolution, orientation, symbols and fields. This crate turns one document into
//! concrete fetch plans:
//! - Schema validation of the raw JSON, with every violation reported by path
//! - Two-level override merging of `common` into each template
//! - Lazy symbol × field expansion into request units
//! - Output shaping (wide or long) for the downstream writer
//!
//! Nothing here does I/O. Loading documents, fetching and writing live elsewhere.

pub mod error;
pub mod expand;
pub mod merge;
pub mod pipeline;
pub mod resolution;
pub mod shape;
pub mod template;
pub mod validate;

pub use error::{DocumentError, RequiredField, SchemaViolation, TemplateError};
pub use expand::{expand, DateSpan, ExpandedTemplate, RequestUnit, RequestUnits, ScopePolicy};
pub use merge::{check_resolved, merge, ResolvedTemplate};
pub use pipeline::{
    resolve, PreparedDocument, ResolveOptions, Resolver, RunReport, TemplateFailure,
    TemplateOutcome, TemplatePlan,
};
pub use resolution::{Resolution, ResolutionParseError};
pub use shape::{shape, Cell, OutputShape, Placement, LONG_COLUMNS};
pub use template::{Orientation, RawConfig, Template};
pub use validate::{validate, Validator};
