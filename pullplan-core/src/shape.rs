//! Orientation shaper — how fetched values should be laid out. No fetching, no I/O.
//!
//! - `wide`: one row per distinct symbol, one column per distinct field. Units that
//!   share a symbol collapse into the same row.
//! - `long`: one row per unit in grid order, fixed columns `symbol, field, value`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expand::{ExpandedTemplate, RequestUnit};
use crate::template::Orientation;

/// Column headers of a long table.
pub const LONG_COLUMNS: [&str; 3] = ["symbol", "field", "value"];

/// Index of the value column in a long table.
const LONG_VALUE_COLUMN: usize = 2;

/// Layout contract handed to the external writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "orientation", rename_all = "lowercase")]
pub enum OutputShape {
    Wide {
        /// Row keys, first-appearance order.
        rows: Vec<String>,
        /// Column keys, template `field` order.
        columns: Vec<String>,
    },
    Long {
        /// Always one per unit.
        rows: usize,
        columns: Vec<String>,
    },
}

/// Where one unit's value lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
}

impl OutputShape {
    pub fn orientation(&self) -> Orientation {
        match self {
            OutputShape::Wide { .. } => Orientation::Wide,
            OutputShape::Long { .. } => Orientation::Long,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            OutputShape::Wide { rows, .. } => rows.len(),
            OutputShape::Long { rows, .. } => *rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            OutputShape::Wide { columns, .. } | OutputShape::Long { columns, .. } => columns,
        }
    }

    /// The cell that receives the value of `unit`, the `index`-th unit of the grid.
    ///
    /// `None` when the unit does not belong to this shape. Scans the row and column
    /// keys; to place a whole grid use [`Placement`].
    pub fn locate(&self, index: usize, unit: &RequestUnit) -> Option<Cell> {
        match self {
            OutputShape::Wide { rows, columns } => Some(Cell {
                row: rows.iter().position(|s| *s == unit.symbol)?,
                column: columns.iter().position(|f| *f == unit.field)?,
            }),
            OutputShape::Long { rows, .. } => (index < *rows).then_some(Cell {
                row: index,
                column: LONG_VALUE_COLUMN,
            }),
        }
    }
}

/// Distinct items in first-appearance order, plus each input's slot among them.
fn first_appearance(items: &[String]) -> (Vec<String>, Vec<usize>) {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    let mut distinct = Vec::new();
    let slots = items
        .iter()
        .map(|item| {
            *seen.entry(item.as_str()).or_insert_with(|| {
                distinct.push(item.clone());
                distinct.len() - 1
            })
        })
        .collect();
    (distinct, slots)
}

/// Unit-index → cell mapping for one expanded template, built once.
///
/// Looking a cell up is O(1): the grid is symbol-major, so unit `i` sits at
/// symbol `i / width` and field `i % width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    len: usize,
    width: usize,
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Wide {
        symbol_rows: Vec<usize>,
        field_columns: Vec<usize>,
    },
    Long,
}

impl Placement {
    pub fn new(expanded: &ExpandedTemplate) -> Self {
        let layout = match expanded.orientation {
            Orientation::Wide => Layout::Wide {
                symbol_rows: first_appearance(&expanded.symbols).1,
                field_columns: first_appearance(&expanded.fields).1,
            },
            Orientation::Long => Layout::Long,
        };
        Self {
            len: expanded.len(),
            width: expanded.fields.len(),
            layout,
        }
    }

    /// Cell of the `index`-th unit, `None` past the end of the grid.
    pub fn cell(&self, index: usize) -> Option<Cell> {
        if index >= self.len {
            return None;
        }
        match &self.layout {
            Layout::Wide {
                symbol_rows,
                field_columns,
            } => Some(Cell {
                row: symbol_rows[index / self.width],
                column: field_columns[index % self.width],
            }),
            Layout::Long => Some(Cell {
                row: index,
                column: LONG_VALUE_COLUMN,
            }),
        }
    }
}

/// Describe the output layout of an expanded template.
pub fn shape(expanded: &ExpandedTemplate) -> OutputShape {
    match expanded.orientation {
        Orientation::Wide => OutputShape::Wide {
            rows: first_appearance(&expanded.symbols).0,
            columns: first_appearance(&expanded.fields).0,
        },
        Orientation::Long => OutputShape::Long {
            rows: expanded.len(),
            columns: LONG_COLUMNS.iter().map(|c| c.to_string()).collect(),
        },
    }
}
