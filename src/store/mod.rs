//! Typed columnar storage with an edit overlay and single-pass aggregation.
//!
//! Dense column data is the "original" snapshot. Every edit made through
//! [`ColumnStore::set_value`] goes to the store's own [`SparseMatrix`] overlay,
//! so reverting a cell is just deleting its override, and
//! [`ColumnStore::commit_overrides`] folds the overlay into the dense data
//! when the caller wants a new baseline.
//!
//! Reads check the overlay first, then the dense column.

mod column;
mod sort;

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::cache::LruCache;
use crate::error::{Result, XlgridError};
use crate::index_map::IndexMap;
use crate::sparse::SparseMatrix;
use crate::types::{Accumulator, Aggregate, AggregateOp, CellValue, ColumnType};

use column::Column;
pub use sort::SortDirection;

/// Default number of cached aggregate results.
pub const DEFAULT_AGGREGATE_CACHE: usize = 64;

/// Scope for [`ColumnStore::aggregate`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateOptions<'a> {
    /// Fold only the rows visible in this projection.
    pub indices: Option<&'a IndexMap>,
    /// Consult this overlay instead of the store's own.
    pub overlay: Option<&'a SparseMatrix<CellValue>>,
}

impl<'a> AggregateOptions<'a> {
    pub fn scoped(indices: &'a IndexMap) -> Self {
        Self {
            indices: Some(indices),
            overlay: None,
        }
    }

    pub fn with_overlay(mut self, overlay: &'a SparseMatrix<CellValue>) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedAggregate {
    revision: u64,
    result: Aggregate,
}

/// Columnar store of `row_count` rows.
#[derive(Debug)]
pub struct ColumnStore {
    row_count: usize,
    columns: Vec<Column>,
    by_id: FxHashMap<String, usize>,
    next_key: usize,
    overlay: SparseMatrix<CellValue>,
    aggregates: RefCell<LruCache<(usize, AggregateOp), CachedAggregate>>,
}

impl ColumnStore {
    pub fn new(row_count: usize) -> Self {
        Self::with_cache_capacity(row_count, DEFAULT_AGGREGATE_CACHE)
    }

    /// A capacity of 0 disables aggregate caching.
    pub fn with_cache_capacity(row_count: usize, capacity: usize) -> Self {
        Self {
            row_count,
            columns: Vec::new(),
            by_id: FxHashMap::default(),
            next_key: 0,
            overlay: SparseMatrix::new(),
            aggregates: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column identifiers in registration order.
    pub fn column_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.id.as_str())
    }

    /// Identifier of the column at display position `pos`.
    pub fn column_id_at(&self, pos: usize) -> Option<&str> {
        self.columns.get(pos).map(|c| c.id.as_str())
    }

    pub fn has_column(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn column_type(&self, id: &str) -> Result<ColumnType> {
        Ok(self.column(id)?.ty)
    }

    /// Overlay coordinate of a column. Stable for the column's lifetime; use it
    /// to key external overlays passed through [`AggregateOptions::overlay`].
    pub fn column_key(&self, id: &str) -> Result<usize> {
        Ok(self.column(id)?.key)
    }

    fn column(&self, id: &str) -> Result<&Column> {
        self.by_id
            .get(id)
            .and_then(|&pos| self.columns.get(pos))
            .ok_or_else(|| XlgridError::UnknownColumn(id.to_string()))
    }

    fn column_mut(&mut self, id: &str) -> Result<&mut Column> {
        self.by_id
            .get(id)
            .and_then(|&pos| self.columns.get_mut(pos))
            .ok_or_else(|| XlgridError::UnknownColumn(id.to_string()))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row < self.row_count {
            Ok(())
        } else {
            Err(XlgridError::row_out_of_range(row, self.row_count))
        }
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    /// Register an empty (all-null) column.
    pub fn add_column(&mut self, id: impl Into<String>, ty: ColumnType) -> Result<()> {
        let values = vec![CellValue::Null; self.row_count];
        self.insert_column(id.into(), ty, values)
    }

    /// Register a column with initial data. Every value is coerced to `ty`.
    pub fn add_column_with_values(
        &mut self,
        id: impl Into<String>,
        ty: ColumnType,
        values: Vec<CellValue>,
    ) -> Result<()> {
        let id = id.into();
        if self.by_id.contains_key(&id) {
            return Err(XlgridError::DuplicateColumn(id));
        }
        let values = self.coerce_column(&id, ty, values)?;
        self.insert_column(id, ty, values)
    }

    fn coerce_column(
        &self,
        id: &str,
        ty: ColumnType,
        values: Vec<CellValue>,
    ) -> Result<Vec<CellValue>> {
        if values.len() != self.row_count {
            return Err(XlgridError::LengthMismatch {
                column: id.to_string(),
                expected: self.row_count,
                found: values.len(),
            });
        }
        values
            .into_iter()
            .map(|value| coerce(id, ty, value))
            .collect()
    }

    fn insert_column(&mut self, id: String, ty: ColumnType, values: Vec<CellValue>) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(XlgridError::DuplicateColumn(id));
        }
        let key = self.next_key;
        self.next_key += 1;
        tracing::debug!(column = %id, key, ty = %ty, rows = self.row_count, "column added");
        self.by_id.insert(id.clone(), self.columns.len());
        self.columns.push(Column::new(id, key, ty, values));
        Ok(())
    }

    /// Unregister a column and prune its overrides.
    pub fn remove_column(&mut self, id: &str) -> Result<()> {
        let pos = *self
            .by_id
            .get(id)
            .ok_or_else(|| XlgridError::UnknownColumn(id.to_string()))?;
        let column = self.columns.remove(pos);
        let pruned = self.overlay.remove_col(column.key);
        self.aggregates
            .borrow_mut()
            .retain(|&(key, _)| key != column.key);
        self.by_id = self
            .columns
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.id.clone(), pos))
            .collect();
        tracing::debug!(column = %id, pruned, "column removed");
        Ok(())
    }

    /// Replace a column's dense data and drop its overrides.
    pub fn load_column(&mut self, id: &str, values: Vec<CellValue>) -> Result<()> {
        let ty = self.column(id)?.ty;
        let values = self.coerce_column(id, ty, values)?;
        let column = self.column_mut(id)?;
        column.values = values;
        column.touch();
        let key = column.key;
        self.overlay.remove_col(key);
        Ok(())
    }

    /// Full dataset replacement: every column becomes `row_count` nulls and the
    /// overlay is cleared. Follow with [`ColumnStore::load_column`].
    pub fn reset_rows(&mut self, row_count: usize) {
        self.row_count = row_count;
        for column in &mut self.columns {
            column.values = vec![CellValue::Null; row_count];
            column.touch();
        }
        self.overlay.clear();
        self.aggregates.borrow_mut().clear();
        tracing::debug!(rows = row_count, "dataset reset");
    }

    // ------------------------------------------------------------------
    // Structural row ops
    // ------------------------------------------------------------------

    /// Insert `count` null rows before `at` (`at == row_count` appends).
    pub fn insert_rows(&mut self, at: usize, count: usize) -> Result<()> {
        if at > self.row_count {
            return Err(XlgridError::row_out_of_range(at, self.row_count));
        }
        if count == 0 {
            return Ok(());
        }
        for column in &mut self.columns {
            column
                .values
                .splice(at..at, std::iter::repeat(CellValue::Null).take(count));
            column.touch();
        }
        self.row_count += count;
        self.overlay.shift_rows(at, isize::try_from(count).unwrap_or(isize::MAX));
        tracing::debug!(at, count, rows = self.row_count, "rows inserted");
        Ok(())
    }

    /// Remove rows `at..at + count`, dropping their overrides.
    pub fn remove_rows(&mut self, at: usize, count: usize) -> Result<()> {
        let end = at
            .checked_add(count)
            .filter(|&end| end <= self.row_count)
            .ok_or_else(|| XlgridError::row_out_of_range(at.saturating_add(count), self.row_count))?;
        if count == 0 {
            return Ok(());
        }
        for column in &mut self.columns {
            column.values.drain(at..end);
            column.touch();
        }
        self.row_count -= count;
        self.overlay
            .shift_rows(at, -isize::try_from(count).unwrap_or(isize::MAX));
        tracing::debug!(at, count, rows = self.row_count, "rows removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cell access
    // ------------------------------------------------------------------

    /// Effective value: the override if one exists, else the dense value.
    pub fn get_value(&self, row: usize, id: &str) -> Result<&CellValue> {
        let column = self.column(id)?;
        self.check_row(row)?;
        Ok(self.effective(column, row, &self.overlay))
    }

    /// Dense (pre-edit) value, ignoring the overlay.
    pub fn base_value(&self, row: usize, id: &str) -> Result<&CellValue> {
        let column = self.column(id)?;
        self.check_row(row)?;
        Ok(column.values.get(row).unwrap_or(&CellValue::Null))
    }

    fn effective<'a>(
        &'a self,
        column: &'a Column,
        row: usize,
        overlay: &'a SparseMatrix<CellValue>,
    ) -> &'a CellValue {
        overlay
            .get(row, column.key)
            .or_else(|| column.values.get(row))
            .unwrap_or(&CellValue::Null)
    }

    /// Write a value through the overlay after coercing it to the column type.
    ///
    /// Writing the dense value back removes the override.
    pub fn set_value(&mut self, row: usize, id: &str, value: impl Into<CellValue>) -> Result<()> {
        let row_count = self.row_count;
        let column = self
            .by_id
            .get(id)
            .and_then(|&pos| self.columns.get_mut(pos))
            .ok_or_else(|| XlgridError::UnknownColumn(id.to_string()))?;
        if row >= row_count {
            return Err(XlgridError::row_out_of_range(row, row_count));
        }
        let value = coerce(id, column.ty, value.into())?;
        if column.values.get(row) == Some(&value) {
            self.overlay.delete(row, column.key);
        } else {
            self.overlay.set(row, column.key, value);
        }
        column.touch();
        Ok(())
    }

    pub fn is_overridden(&self, row: usize, id: &str) -> Result<bool> {
        let column = self.column(id)?;
        Ok(self.overlay.contains(row, column.key))
    }

    /// Drop the override at `(row, id)`. Returns whether one existed.
    pub fn revert_value(&mut self, row: usize, id: &str) -> Result<bool> {
        let column = self.column_mut(id)?;
        let key = column.key;
        column.touch();
        Ok(self.overlay.delete(row, key).is_some())
    }

    /// Drop every override.
    pub fn revert_all(&mut self) {
        self.overlay.clear();
        for column in &mut self.columns {
            column.touch();
        }
    }

    /// Fold every override into the dense columns. Returns how many were applied.
    pub fn commit_overrides(&mut self) -> usize {
        let mut applied = 0;
        let columns = &mut self.columns;
        self.overlay.for_each_override(|row, key, value| {
            let Some(column) = columns.iter_mut().find(|c| c.key == key) else {
                return;
            };
            if let Some(slot) = column.values.get_mut(row) {
                *slot = value.clone();
                column.touch();
                applied += 1;
            }
        });
        self.overlay.clear();
        tracing::debug!(applied, "overrides committed");
        applied
    }

    pub fn overlay(&self) -> &SparseMatrix<CellValue> {
        &self.overlay
    }

    pub fn override_count(&self) -> usize {
        self.overlay.len()
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    /// Fold a column in one pass.
    ///
    /// Rows come from `options.indices` (visible rows only) or the whole
    /// column. Overridden cells contribute their override. Non-numeric cells
    /// are skipped by numeric operators and reported in
    /// [`Aggregate::skipped`].
    pub fn aggregate(
        &self,
        id: &str,
        op: AggregateOp,
        options: AggregateOptions<'_>,
    ) -> Result<Aggregate> {
        let column = self.column(id)?;
        if let Some(indices) = options.indices {
            if indices.row_count() != self.row_count {
                return Err(XlgridError::ProjectionMismatch {
                    expected: self.row_count,
                    found: indices.row_count(),
                });
            }
        }

        let cacheable = options.indices.is_none() && options.overlay.is_none();
        if cacheable {
            if let Some(hit) = self.aggregates.borrow().get(&(column.key, op)) {
                if hit.revision == column.revision {
                    return Ok(hit.result);
                }
            }
        }

        let overlay = options.overlay.unwrap_or(&self.overlay);
        let mut acc = Accumulator::new(op);
        match options.indices {
            Some(indices) => {
                for (_, data) in indices.iter() {
                    acc.push(self.effective(column, data, overlay));
                }
            }
            None => {
                for row in 0..self.row_count {
                    acc.push(self.effective(column, row, overlay));
                }
            }
        }
        let result = acc.finish();

        if cacheable {
            self.aggregates.borrow_mut().put(
                (column.key, op),
                CachedAggregate {
                    revision: column.revision,
                    result,
                },
            );
        }
        Ok(result)
    }
}

fn coerce(id: &str, ty: ColumnType, value: CellValue) -> Result<CellValue> {
    let found = value.type_name();
    ty.coerce(value).ok_or_else(|| XlgridError::TypeMismatch {
        column: id.to_string(),
        expected: ty,
        found,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::panic)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Vec<CellValue> {
        values.iter().map(|&n| CellValue::Number(n)).collect()
    }

    fn store_with(values: &[f64]) -> ColumnStore {
        let mut store = ColumnStore::new(values.len());
        store
            .add_column_with_values("n", ColumnType::Numeric, numbers(values))
            .unwrap();
        store
    }

    #[test]
    fn test_sum_respects_overlay() {
        let mut store = store_with(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        store.set_value(2, "n", 99.0).unwrap();
        let agg = store
            .aggregate("n", AggregateOp::Sum, AggregateOptions::default())
            .unwrap();
        assert_eq!(agg.value, 111.0);
        assert_eq!(store.base_value(2, "n").unwrap(), &CellValue::Number(3.0));
    }

    #[test]
    fn test_sum_scoped_to_projection() {
        let store = store_with(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let visible = IndexMap::new(vec![4, 0, 2], 5).unwrap();
        let agg = store
            .aggregate("n", AggregateOp::Sum, AggregateOptions::scoped(&visible))
            .unwrap();
        assert_eq!(agg.value, 90.0);
        assert_eq!(agg.valid_count, 3);
    }

    #[test]
    fn test_external_overlay() {
        let store = store_with(&[1.0, 1.0, 1.0]);
        let mut overlay = SparseMatrix::new();
        overlay.set(0, store.column_key("n").unwrap(), CellValue::Number(7.0));
        let agg = store
            .aggregate(
                "n",
                AggregateOp::Max,
                AggregateOptions::default().with_overlay(&overlay),
            )
            .unwrap();
        assert_eq!(agg.value, 7.0);
        // the store's own overlay is untouched
        assert_eq!(store.override_count(), 0);
    }

    #[test]
    fn test_cache_invalidated_by_write() {
        let mut store = store_with(&[1.0, 2.0]);
        let opts = AggregateOptions::default();
        assert_eq!(store.aggregate("n", AggregateOp::Sum, opts).unwrap().value, 3.0);
        assert_eq!(store.aggregate("n", AggregateOp::Sum, opts).unwrap().value, 3.0);
        store.set_value(0, "n", "5").unwrap();
        assert_eq!(store.aggregate("n", AggregateOp::Sum, opts).unwrap().value, 7.0);
        store.revert_value(0, "n").unwrap();
        assert_eq!(store.aggregate("n", AggregateOp::Sum, opts).unwrap().value, 3.0);
    }

    /// Whether the cached Sum for "n" would be served as is.
    fn sum_cache_is_current(store: &ColumnStore) -> bool {
        let column = store.column("n").unwrap();
        store
            .aggregates
            .borrow()
            .get(&(column.key, AggregateOp::Sum))
            .is_some_and(|hit| hit.revision == column.revision)
    }

    #[test]
    fn test_cache_invalidated_by_structural_ops() {
        let mut store = store_with(&[1.0, 2.0, 3.0]);
        let opts = AggregateOptions::default();
        let sum = |store: &ColumnStore| store.aggregate("n", AggregateOp::Sum, opts).unwrap();

        store.set_value(0, "n", "5").unwrap();
        assert_eq!(sum(&store).value, 10.0);
        assert!(sum_cache_is_current(&store));
        assert_eq!(store.commit_overrides(), 1);
        assert!(!sum_cache_is_current(&store));
        assert_eq!(sum(&store).value, 10.0);

        store.set_value(1, "n", "10").unwrap();
        assert_eq!(sum(&store).value, 18.0);
        store.revert_all();
        assert!(!sum_cache_is_current(&store));
        assert_eq!(sum(&store).value, 10.0);

        // [null, 5, 2, 3]
        store.insert_rows(0, 1).unwrap();
        assert!(!sum_cache_is_current(&store));
        let after_insert = sum(&store);
        assert_eq!(after_insert.value, 10.0);
        assert_eq!(after_insert.skipped, 1);

        // [2, 3]
        store.remove_rows(0, 2).unwrap();
        assert!(!sum_cache_is_current(&store));
        assert_eq!(sum(&store).value, 5.0);

        store.load_column("n", numbers(&[7.0, 8.0])).unwrap();
        assert!(!sum_cache_is_current(&store));
        assert_eq!(sum(&store).value, 15.0);
        assert!(sum_cache_is_current(&store));
    }

    #[test]
    fn test_get_value_errors() {
        let store = store_with(&[1.0]);
        assert!(matches!(
            store.get_value(0, "missing"),
            Err(XlgridError::UnknownColumn(_))
        ));
        assert!(matches!(
            store.get_value(1, "n"),
            Err(XlgridError::RowOutOfRange { row: 1, row_count: 1 })
        ));
    }

    #[test]
    fn test_set_value_type_mismatch() {
        let mut store = store_with(&[1.0]);
        let err = store.set_value(0, "n", "abc").unwrap_err();
        match err {
            XlgridError::TypeMismatch {
                column,
                expected,
                found,
            } => {
                assert_eq!(column, "n");
                assert_eq!(expected, ColumnType::Numeric);
                assert_eq!(found, "text");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.override_count(), 0);
    }

    #[test]
    fn test_writing_base_value_drops_override() {
        let mut store = store_with(&[1.0, 2.0]);
        store.set_value(1, "n", 8.0).unwrap();
        assert!(store.is_overridden(1, "n").unwrap());
        store.set_value(1, "n", 2.0).unwrap();
        assert!(!store.is_overridden(1, "n").unwrap());
    }

    #[test]
    fn test_commit_and_revert_all() {
        let mut store = store_with(&[1.0, 2.0, 3.0]);
        store.set_value(0, "n", 10.0).unwrap();
        store.set_value(2, "n", 30.0).unwrap();
        assert_eq!(store.commit_overrides(), 2);
        assert_eq!(store.override_count(), 0);
        assert_eq!(store.base_value(2, "n").unwrap(), &CellValue::Number(30.0));

        store.set_value(1, "n", 0.0).unwrap();
        store.revert_all();
        assert_eq!(store.get_value(1, "n").unwrap(), &CellValue::Number(2.0));
    }

    #[test]
    fn test_duplicate_and_remove_column() {
        let mut store = store_with(&[1.0, 2.0]);
        assert!(matches!(
            store.add_column("n", ColumnType::Text),
            Err(XlgridError::DuplicateColumn(_))
        ));
        store.add_column("label", ColumnType::Text).unwrap();
        store.set_value(0, "n", 5.0).unwrap();
        store.set_value(0, "label", "x").unwrap();
        assert_eq!(store.override_count(), 2);

        store.remove_column("n").unwrap();
        assert_eq!(store.override_count(), 1);
        assert!(!store.has_column("n"));
        assert_eq!(store.column_ids().collect::<Vec<_>>(), vec!["label"]);
        assert_eq!(store.get_value(0, "label").unwrap(), &CellValue::from("x"));
        assert!(matches!(
            store.remove_column("n"),
            Err(XlgridError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let mut store = ColumnStore::new(3);
        assert!(matches!(
            store.add_column_with_values("n", ColumnType::Numeric, numbers(&[1.0])),
            Err(XlgridError::LengthMismatch {
                expected: 3,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_insert_and_remove_rows_shift_overrides() {
        let mut store = store_with(&[1.0, 2.0, 3.0]);
        store.set_value(2, "n", 30.0).unwrap();
        store.insert_rows(1, 2).unwrap();
        assert_eq!(store.row_count(), 5);
        assert_eq!(store.get_value(1, "n").unwrap(), &CellValue::Null);
        assert_eq!(store.get_value(4, "n").unwrap(), &CellValue::Number(30.0));

        store.remove_rows(0, 2).unwrap();
        assert_eq!(store.row_count(), 3);
        assert_eq!(store.get_value(2, "n").unwrap(), &CellValue::Number(30.0));
        assert!(store.remove_rows(2, 5).is_err());
        assert!(store.insert_rows(4, 1).is_err());
    }

    #[test]
    fn test_scoped_aggregate_rejects_foreign_projection() {
        let store = store_with(&[1.0, 2.0]);
        let other = IndexMap::identity(5);
        assert!(matches!(
            store.aggregate("n", AggregateOp::Sum, AggregateOptions::scoped(&other)),
            Err(XlgridError::ProjectionMismatch { .. })
        ));
    }

    #[test]
    fn test_reset_and_load() {
        let mut store = store_with(&[1.0, 2.0]);
        store.set_value(0, "n", 9.0).unwrap();
        store.reset_rows(3);
        assert_eq!(store.override_count(), 0);
        store.load_column("n", numbers(&[4.0, 5.0, 6.0])).unwrap();
        let agg = store
            .aggregate("n", AggregateOp::Average, AggregateOptions::default())
            .unwrap();
        assert_eq!(agg.value, 5.0);
    }
}
