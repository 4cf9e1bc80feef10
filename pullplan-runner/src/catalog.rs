//! Template catalog — a directory of named JSON documents.
//!
//! Each `<name>.json` file is one document, keyed by its file stem. Files whose
//! name starts with `_` (schema files, scratch copies) and non-JSON files are
//! skipped. Documents are kept in sorted name order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate document name '{0}'")]
    Duplicate(String),
}

/// One named document.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    /// Where the document came from; `None` for in-memory documents.
    pub path: Option<PathBuf>,
    pub document: Value,
}

/// Named documents in sorted name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load every `<name>.json` in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut by_name = BTreeMap::new();
        for dir_entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = dir_entry.map_err(io_err)?.path();
            let Some(name) = document_name(&path) else {
                if path.is_file() {
                    warn!(path = %path.display(), "skipping non-document file");
                }
                continue;
            };

            let content = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let document = serde_json::from_str(&content).map_err(|source| CatalogError::Json {
                path: path.clone(),
                source,
            })?;
            debug!(name = %name, path = %path.display(), "loaded document");
            by_name.insert(
                name.clone(),
                CatalogEntry {
                    name,
                    path: Some(path),
                    document,
                },
            );
        }

        Ok(Self {
            entries: by_name.into_values().collect(),
        })
    }

    /// Build a catalog from in-memory documents.
    pub fn from_documents<I, S>(documents: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut by_name = BTreeMap::new();
        for (name, document) in documents {
            let name = name.into();
            if by_name.contains_key(&name) {
                return Err(CatalogError::Duplicate(name));
            }
            by_name.insert(
                name.clone(),
                CatalogEntry {
                    name,
                    path: None,
                    document,
                },
            );
        }
        Ok(Self {
            entries: by_name.into_values().collect(),
        })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File stem of a catalog document, or `None` if the path is not one.
fn document_name(path: &Path) -> Option<String> {
    if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.starts_with('_') {
        return None;
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_documents_sorts_by_name() {
        let catalog = Catalog::from_documents([
            ("rates", json!({})),
            ("equities", json!({"templates": []})),
        ])
        .unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["equities", "rates"]);
        assert_eq!(catalog.get("rates").unwrap().document, json!({}));
        assert!(catalog.get("fx").is_none());
        assert!(catalog.get("equities").unwrap().path.is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Catalog::from_documents([("a", json!({})), ("a", json!({}))]).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(ref n) if n == "a"));
    }

    #[test]
    fn missing_dir_is_io_error() {
        let err = Catalog::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
