//! Template merger — two-level override of an entry over the shared `common` template.
//!
//! Precedence per field: entry, then common, then absent. `orientation` adds a third
//! level, the schema default `wide`. Lists are replaced wholesale, never concatenated,
//! so an explicit empty list in the entry suppresses the common list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{RequiredField, TemplateError};
use crate::resolution::Resolution;
use crate::template::{Orientation, Template};

/// A template after override merging, before expansion.
///
/// Only `orientation` is guaranteed. Missing required fields are reported by
/// [`check_resolved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTemplate {
    pub vendor: Option<String>,
    pub endpoint: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub resolution: Option<Resolution>,
    pub orientation: Orientation,
    pub symbol: Option<Vec<String>>,
    pub field: Option<Vec<String>>,
}

impl ResolvedTemplate {
    /// Required fields that neither the entry nor common supplied, in declaration order.
    pub fn missing_fields(&self) -> Vec<RequiredField> {
        RequiredField::ALL
            .into_iter()
            .filter(|f| match f {
                RequiredField::Vendor => self.vendor.is_none(),
                RequiredField::Endpoint => self.endpoint.is_none(),
                RequiredField::Symbol => self.symbol.is_none(),
                RequiredField::Field => self.field.is_none(),
            })
            .collect()
    }
}

fn pick<T: Clone>(entry: &Option<T>, common: Option<&Option<T>>) -> Option<T> {
    entry
        .as_ref()
        .or_else(|| common.and_then(|c| c.as_ref()))
        .cloned()
}

/// Merge `common` into `entry`. Pure: neither input is modified or referenced afterwards.
pub fn merge(common: Option<&Template>, entry: &Template) -> ResolvedTemplate {
    ResolvedTemplate {
        vendor: pick(&entry.vendor, common.map(|c| &c.vendor)),
        endpoint: pick(&entry.endpoint, common.map(|c| &c.endpoint)),
        start: pick(&entry.start, common.map(|c| &c.start)),
        end: pick(&entry.end, common.map(|c| &c.end)),
        resolution: pick(&entry.resolution, common.map(|c| &c.resolution)),
        orientation: pick(&entry.orientation, common.map(|c| &c.orientation)).unwrap_or_default(),
        symbol: pick(&entry.symbol, common.map(|c| &c.symbol)),
        field: pick(&entry.field, common.map(|c| &c.field)),
    }
}

/// Post-merge checks: required fields present and `start <= end` when both are set.
///
/// All problems are returned together. A single open bound is fine here.
pub fn check_resolved(resolved: &ResolvedTemplate) -> Result<(), Vec<TemplateError>> {
    let mut errors: Vec<TemplateError> = resolved
        .missing_fields()
        .into_iter()
        .map(|field| TemplateError::MissingRequiredField { field })
        .collect();

    if let (Some(start), Some(end)) = (resolved.start, resolved.end) {
        if start > end {
            errors.push(TemplateError::InvalidRange { start, end });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
