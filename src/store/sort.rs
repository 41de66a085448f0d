//! Sort and filter projections over a column.
//!
//! These build a new flat [`IndexMap`]; the store itself is never reordered.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::ColumnStore;
use crate::error::{Result, XlgridError};
use crate::index_map::IndexMap;
use crate::types::CellValue;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Normalized sort key. Variant order is the type rank:
/// numbers and dates < text < booleans. Blanks have no key and sort last.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Number(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
}

impl SortKey {
    fn from_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Null => None,
            CellValue::Number(n) | CellValue::Date(n) => Some(SortKey::Number(OrderedFloat(*n))),
            CellValue::Text(s) => Some(SortKey::Text(s.to_lowercase())),
            CellValue::Boolean(b) => Some(SortKey::Boolean(*b)),
        }
    }
}

impl ColumnStore {
    fn scope_or_identity(&self, scope: Option<&IndexMap>) -> Result<IndexMap> {
        match scope {
            Some(map) if map.row_count() != self.row_count() => {
                Err(XlgridError::ProjectionMismatch {
                    expected: self.row_count(),
                    found: map.row_count(),
                })
            }
            Some(map) => Ok(map.clone()),
            None => Ok(IndexMap::identity(self.row_count())),
        }
    }

    /// Stable sort of the visible rows of `scope` (all rows if `None`) by the
    /// effective values of column `id`. Ties keep their current visual order;
    /// blanks go last in both directions.
    pub fn sort_indices(
        &self,
        id: &str,
        direction: SortDirection,
        scope: Option<&IndexMap>,
    ) -> Result<IndexMap> {
        let base = self.scope_or_identity(scope)?;
        let mut sortable = Vec::with_capacity(base.len());
        for (visual, data) in base.iter() {
            let key = SortKey::from_value(self.get_value(data, id)?);
            sortable.push((key, visual));
        }

        sortable.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => match direction {
                SortDirection::Ascending => a.cmp(b),
                SortDirection::Descending => b.cmp(a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        let order: Vec<usize> = sortable.into_iter().map(|(_, visual)| visual).collect();
        let sorted = base.project(&order)?;
        tracing::debug!(column = %id, ?direction, rows = sorted.len(), "sorted projection built");
        Ok(sorted)
    }

    /// Keep the visible rows of `scope` whose effective value in column `id`
    /// satisfies `predicate`, preserving their order.
    pub fn filter_indices<F>(
        &self,
        id: &str,
        mut predicate: F,
        scope: Option<&IndexMap>,
    ) -> Result<IndexMap>
    where
        F: FnMut(&CellValue) -> bool,
    {
        let base = self.scope_or_identity(scope)?;
        // resolve the column once so an unknown id fails even on empty scopes
        self.column_key(id)?;
        let filtered = base.filter(|data| {
            self.get_value(data, id)
                .map(|value| predicate(value))
                .unwrap_or(false)
        });
        tracing::debug!(column = %id, kept = filtered.len(), of = base.len(), "filtered projection built");
        Ok(filtered)
    }
}
