//! `GridView`: one virtualized grid over a [`ColumnStore`].
//!
//! This module ties the data layer together:
//! - the current projection ([`IndexMap`]) installed by sort/filter
//! - row and column layout ([`PrefixSumArray`]) in visual order
//! - the [`Viewport`] that turns scroll offsets into visual ranges
//! - the [`CellPool`] that holds one renderable unit per realized cell
//!
//! [`GridView::realize`] runs a full recomputation cycle: viewport to visual
//! range, visual index to data index, value read through the overlay, then
//! pool acquire for every cell in range and one `release_except` for the rest.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::GridConfig;
use crate::error::{Result, XlgridError};
use crate::index_map::IndexMap;
use crate::layout::{PrefixSumArray, Viewport};
use crate::render::{cell_key, CellLifecycle, CellPool, PoolStats};
use crate::store::{AggregateOptions, ColumnStore, SortDirection};
use crate::types::{Aggregate, AggregateOp, CellValue, ColumnType};

/// One cell produced by [`GridView::realize`].
///
/// Positions are in layout coordinates; subtract the viewport scroll offset to
/// get screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedCell {
    /// Pool key built from the data row and the column's stable store key,
    /// so it survives sorts and column removal.
    pub key: String,
    pub visual_row: usize,
    pub data_row: usize,
    pub col: usize,
    pub top: u64,
    pub left: u64,
    pub height: u32,
    pub width: u32,
    pub value: CellValue,
}

pub struct GridView<L: CellLifecycle> {
    config: GridConfig,
    store: ColumnStore,
    projection: Rc<IndexMap>,
    /// Row heights by data row, so a height survives re-projection.
    row_heights: Vec<u32>,
    /// Row layout in visual order, rebuilt on every projection install.
    rows: PrefixSumArray,
    /// Column layout in store column order.
    cols: PrefixSumArray,
    viewport: Viewport,
    pool: CellPool<L>,
    realized: Vec<RealizedCell>,
}

impl<L: CellLifecycle> GridView<L> {
    /// Wrap an existing store. Rows and columns start at the configured
    /// default sizes and the projection is the identity.
    pub fn new(config: GridConfig, store: ColumnStore, lifecycle: L) -> Self {
        let row_count = store.row_count();
        let row_heights = vec![config.default_row_height; row_count];
        let rows = PrefixSumArray::from_sizes(row_heights.clone());
        let cols = PrefixSumArray::uniform(store.column_count(), config.default_col_width);
        let pool = CellPool::new(lifecycle, config.pool_initial_size, config.pool_max_size);
        let viewport =
            Viewport::default().with_overscan(config.overscan_rows, config.overscan_cols);
        Self {
            projection: Rc::new(IndexMap::identity(row_count)),
            row_heights,
            rows,
            cols,
            viewport,
            pool,
            store,
            config,
            realized: Vec::new(),
        }
    }

    /// Empty grid of `row_count` rows with no columns.
    pub fn with_rows(config: GridConfig, row_count: usize, lifecycle: L) -> Self {
        let store = ColumnStore::with_cache_capacity(row_count, config.aggregate_cache_capacity);
        Self::new(config, store, lifecycle)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn store(&self) -> &ColumnStore {
        &self.store
    }

    /// Shared handle to the current projection.
    pub fn projection(&self) -> Rc<IndexMap> {
        Rc::clone(&self.projection)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn row_layout(&self) -> &PrefixSumArray {
        &self.rows
    }

    pub fn col_layout(&self) -> &PrefixSumArray {
        &self.cols
    }

    pub fn pool(&self) -> &CellPool<L> {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Cells produced by the last [`GridView::realize`].
    pub fn realized(&self) -> &[RealizedCell] {
        &self.realized
    }

    // ------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------

    /// Swap in a new projection and rebuild the row layout for it.
    pub fn install_projection(&mut self, projection: impl Into<Rc<IndexMap>>) -> Result<()> {
        let projection = projection.into();
        if projection.row_count() != self.store.row_count() {
            return Err(XlgridError::ProjectionMismatch {
                expected: self.store.row_count(),
                found: projection.row_count(),
            });
        }
        tracing::debug!(
            visible = projection.len(),
            rows = projection.row_count(),
            "projection installed"
        );
        self.projection = projection;
        self.rebuild_rows();
        Ok(())
    }

    /// Sort the currently visible rows by column `id`.
    pub fn sort_by(&mut self, id: &str, direction: SortDirection) -> Result<()> {
        let sorted = self
            .store
            .sort_indices(id, direction, Some(self.projection.as_ref()))?;
        self.install_projection(sorted)
    }

    /// Narrow the currently visible rows to those whose value in column `id`
    /// passes `predicate`.
    pub fn filter_by<F>(&mut self, id: &str, predicate: F) -> Result<()>
    where
        F: FnMut(&CellValue) -> bool,
    {
        let filtered = self
            .store
            .filter_indices(id, predicate, Some(self.projection.as_ref()))?;
        self.install_projection(filtered)
    }

    /// Back to every row in data order.
    pub fn clear_projection(&mut self) {
        self.projection = Rc::new(IndexMap::identity(self.store.row_count()));
        self.rebuild_rows();
    }

    fn rebuild_rows(&mut self) {
        let default = self.config.default_row_height;
        let sizes = self
            .projection
            .iter()
            .map(|(_, data)| self.row_heights.get(data).copied().unwrap_or(default))
            .collect();
        self.rows = PrefixSumArray::from_sizes(sizes);
        self.viewport.clamp_scroll(&self.rows, &self.cols);
        tracing::debug!(
            rows = self.rows.len(),
            total = self.rows.total_size(),
            "row layout rebuilt"
        );
    }

    // ------------------------------------------------------------------
    // Sizing and scrolling
    // ------------------------------------------------------------------

    /// Set the height of data row `row`. Updates the visual layout in place
    /// when the row is visible.
    pub fn set_row_height(&mut self, row: usize, height: u32) -> Result<()> {
        let row_count = self.row_heights.len();
        let slot = self
            .row_heights
            .get_mut(row)
            .ok_or_else(|| XlgridError::row_out_of_range(row, row_count))?;
        *slot = height;
        if let Some(visual) = self.projection.to_visual_index(row) {
            self.rows.set_size(visual, height)?;
        }
        Ok(())
    }

    /// Set the width of the column at display position `col`.
    pub fn set_col_width(&mut self, col: usize, width: u32) -> Result<()> {
        self.cols.set_size(col, width)
    }

    pub fn scroll_by(&mut self, dx: i64, dy: i64) {
        self.viewport.scroll_by(dx, dy, &self.rows, &self.cols);
    }

    pub fn set_scroll(&mut self, x: u64, y: u64) {
        self.viewport.set_scroll(x, y, &self.rows, &self.cols);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.resize(width, height);
        self.viewport.clamp_scroll(&self.rows, &self.cols);
    }

    // ------------------------------------------------------------------
    // Schema and structure
    // ------------------------------------------------------------------

    pub fn add_column(&mut self, id: impl Into<String>, ty: ColumnType) -> Result<()> {
        self.store.add_column(id, ty)?;
        self.cols.resize(self.cols.len() + 1, self.config.default_col_width);
        Ok(())
    }

    pub fn add_column_with_values(
        &mut self,
        id: impl Into<String>,
        ty: ColumnType,
        values: Vec<CellValue>,
    ) -> Result<()> {
        self.store.add_column_with_values(id, ty, values)?;
        self.cols.resize(self.cols.len() + 1, self.config.default_col_width);
        Ok(())
    }

    pub fn remove_column(&mut self, id: &str) -> Result<()> {
        let pos = self
            .store
            .column_ids()
            .position(|c| c == id)
            .ok_or_else(|| XlgridError::UnknownColumn(id.to_string()))?;
        self.store.remove_column(id)?;
        let mut widths = self.cols.sizes().to_vec();
        if pos < widths.len() {
            widths.remove(pos);
        }
        self.cols = PrefixSumArray::from_sizes(widths);
        self.viewport.clamp_scroll(&self.rows, &self.cols);
        Ok(())
    }

    /// Insert `count` blank data rows before data row `at`.
    ///
    /// The projection is carried over: existing rows keep their visual order
    /// and the new rows appear just above the row that was at `at`, or at the
    /// end when that row is not visible.
    pub fn insert_rows(&mut self, at: usize, count: usize) -> Result<()> {
        self.store.insert_rows(at, count)?;
        let default = self.config.default_row_height;
        self.row_heights
            .splice(at..at, std::iter::repeat(default).take(count));

        let anchor = self.projection.to_visual_index(at);
        let mut indices: Vec<usize> = self
            .projection
            .indices()
            .iter()
            .map(|&data| if data >= at { data + count } else { data })
            .collect();
        let pos = anchor.unwrap_or(indices.len());
        indices.splice(pos..pos, at..at + count);
        let projection = IndexMap::new(indices, self.store.row_count())?;
        self.release_all();
        self.install_projection(projection)
    }

    /// Remove data rows `at..at + count` and drop them from the projection.
    pub fn remove_rows(&mut self, at: usize, count: usize) -> Result<()> {
        self.store.remove_rows(at, count)?;
        let end = at + count;
        self.row_heights.drain(at..end);

        let indices: Vec<usize> = self
            .projection
            .indices()
            .iter()
            .filter(|&&data| data < at || data >= end)
            .map(|&data| if data >= end { data - count } else { data })
            .collect();
        let projection = IndexMap::new(indices, self.store.row_count())?;
        self.release_all();
        self.install_projection(projection)
    }

    /// Replace the dataset with `row_count` blank rows. Columns are kept
    /// (reload them with [`ColumnStore::load_column`] through
    /// [`GridView::load_column`]); heights and projection reset.
    pub fn reset_rows(&mut self, row_count: usize) {
        self.store.reset_rows(row_count);
        self.row_heights = vec![self.config.default_row_height; row_count];
        self.release_all();
        self.clear_projection();
    }

    /// Data rows were renumbered; no active key names the same cell anymore.
    fn release_all(&mut self) {
        self.realized.clear();
        let released = self.pool.release_except(&FxHashSet::default());
        tracing::debug!(released, "pool released after row renumbering");
    }

    pub fn load_column(&mut self, id: &str, values: Vec<CellValue>) -> Result<()> {
        self.store.load_column(id, values)
    }

    // ------------------------------------------------------------------
    // Edits and aggregates
    // ------------------------------------------------------------------

    pub fn set_value(&mut self, row: usize, id: &str, value: impl Into<CellValue>) -> Result<()> {
        self.store.set_value(row, id, value)
    }

    pub fn revert_value(&mut self, row: usize, id: &str) -> Result<bool> {
        self.store.revert_value(row, id)
    }

    pub fn commit_edits(&mut self) -> usize {
        self.store.commit_overrides()
    }

    /// Aggregate column `id`, over the visible rows only when `visible_only`.
    pub fn aggregate(&self, id: &str, op: AggregateOp, visible_only: bool) -> Result<Aggregate> {
        let options = if visible_only {
            AggregateOptions::scoped(&self.projection)
        } else {
            AggregateOptions::default()
        };
        self.store.aggregate(id, op, options)
    }

    // ------------------------------------------------------------------
    // Realization
    // ------------------------------------------------------------------

    /// Recompute the realized cell set for the current viewport.
    ///
    /// Every cell in range holds an active pool handle afterwards; every other
    /// handle has been released.
    pub fn realize(&mut self) -> Result<&[RealizedCell]> {
        self.realized.clear();
        let mut keep = FxHashSet::default();

        let rows = self.viewport.visible_rows(&self.rows);
        let cols = self.viewport.visible_cols(&self.cols);
        if let (Some(rows), Some(cols)) = (rows, cols) {
            for visual in rows {
                let Some(data) = self.projection.to_data_index(visual) else {
                    continue;
                };
                let top = self.rows.position_of_index(visual)?;
                let height = self.rows.get(visual)?;
                for col in cols.clone() {
                    let Some(id) = self.store.column_id_at(col) else {
                        continue;
                    };
                    let value = self.store.get_value(data, id)?.clone();
                    let key = cell_key(data, self.store.column_key(id)?);
                    self.pool.acquire(&key);
                    keep.insert(key.clone());
                    self.realized.push(RealizedCell {
                        key,
                        visual_row: visual,
                        data_row: data,
                        col,
                        top,
                        left: self.cols.position_of_index(col)?,
                        height,
                        width: self.cols.get(col)?,
                        value,
                    });
                }
            }
        }

        let released = self.pool.release_except(&keep);
        tracing::trace!(
            cells = self.realized.len(),
            released,
            active = self.pool.stats().active,
            "realized viewport"
        );
        Ok(&self.realized)
    }

    /// Release and destroy every pooled handle.
    pub fn clear_pool(&mut self) {
        self.realized.clear();
        self.pool.clear();
    }
}

impl<L: CellLifecycle> std::fmt::Debug for GridView<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridView")
            .field("rows", &self.store.row_count())
            .field("visible", &self.projection.len())
            .field("columns", &self.store.column_count())
            .field("viewport", &self.viewport)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        created: usize,
        recycled: Vec<String>,
    }

    impl CellLifecycle for Counter {
        type Handle = usize;

        fn create(&mut self) -> usize {
            self.created += 1;
            self.created
        }

        fn recycle(&mut self, _handle: &mut usize, key: &str) {
            self.recycled.push(key.to_string());
        }
    }

    fn config() -> GridConfig {
        GridConfig {
            default_row_height: 20,
            default_col_width: 100,
            pool_initial_size: 0,
            pool_max_size: 64,
            overscan_rows: 0,
            overscan_cols: 0,
            ..GridConfig::default()
        }
    }

    /// 100 rows; column "n" holds the row number, "label" its text.
    fn grid() -> GridView<Counter> {
        let mut grid = GridView::with_rows(config(), 100, Counter::default());
        grid.add_column_with_values(
            "n",
            ColumnType::Numeric,
            (0..100u32).map(|i| CellValue::Number(f64::from(i))).collect(),
        )
        .unwrap();
        grid.add_column_with_values(
            "label",
            ColumnType::Text,
            (0..100u32).map(|i| CellValue::from(format!("row {i}"))).collect(),
        )
        .unwrap();
        grid.resize(200, 60);
        grid
    }

    #[test]
    fn test_realize_top_left() {
        let mut grid = grid();
        let cells = grid.realize().unwrap();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].key, "0-0");
        assert_eq!(cells[5].value, CellValue::from("row 2"));
        assert_eq!(cells[5].left, 100);
        assert_eq!(cells[5].top, 40);
        assert_eq!(grid.pool_stats().active, 6);
    }

    #[test]
    fn test_scroll_releases_offscreen_cells() {
        let mut grid = grid();
        grid.realize().unwrap();
        grid.scroll_by(0, 40);
        let cells = grid.realize().unwrap();
        let rows: Vec<usize> = cells.iter().map(|c| c.data_row).collect();
        assert_eq!(rows, vec![2, 2, 3, 3, 4, 4]);
        assert_eq!(grid.pool_stats().active, 6);
        assert!(!grid.pool().is_active("0-0"));
        assert!(grid.pool().is_active("2-1"));
        // rows 0 and 1 went back to the pool
        assert_eq!(grid.pool_stats().pooled, 4);
        assert_eq!(grid.pool_stats().created, 10);

        grid.scroll_by(0, 40);
        grid.realize().unwrap();
        assert_eq!(grid.pool_stats().reused, 4);
        assert_eq!(grid.pool_stats().created, 10);
    }

    #[test]
    fn test_sort_then_realize_reads_through_projection() {
        let mut grid = grid();
        grid.sort_by("n", SortDirection::Descending).unwrap();
        let cells = grid.realize().unwrap();
        assert_eq!(cells[0].data_row, 99);
        assert_eq!(cells[0].visual_row, 0);
        assert_eq!(cells[0].key, "99-0");
        assert_eq!(cells[1].value, CellValue::from("row 99"));
    }

    #[test]
    fn test_filter_shrinks_layout_and_aggregates() {
        let mut grid = grid();
        grid.filter_by("n", |v| v.as_number().is_some_and(|n| n < 10.0))
            .unwrap();
        assert_eq!(grid.row_layout().total_size(), 200);
        let visible = grid.aggregate("n", AggregateOp::Sum, true).unwrap();
        assert!((visible.value - 45.0).abs() < f64::EPSILON);
        let all = grid.aggregate("n", AggregateOp::Count, false).unwrap();
        assert!((all.value - 100.0).abs() < f64::EPSILON);

        grid.set_scroll(0, 10_000);
        assert_eq!(grid.viewport().scroll_y, 140);
        grid.clear_projection();
        assert_eq!(grid.row_layout().total_size(), 2000);
    }

    #[test]
    fn test_row_height_follows_data_row() {
        let mut grid = grid();
        grid.set_row_height(0, 50).unwrap();
        assert_eq!(grid.row_layout().position_of_index(1).unwrap(), 50);

        grid.sort_by("n", SortDirection::Descending).unwrap();
        // data row 0 is now last
        assert_eq!(grid.row_layout().get(99).unwrap(), 50);
        assert_eq!(grid.row_layout().get(0).unwrap(), 20);
        assert!(grid.set_row_height(100, 10).is_err());
    }

    #[test]
    fn test_edit_is_visible_on_next_realize() {
        let mut grid = grid();
        grid.set_value(1, "label", "edited").unwrap();
        let cells = grid.realize().unwrap();
        assert_eq!(cells[3].value, CellValue::from("edited"));
        assert!(grid.revert_value(1, "label").unwrap());
    }

    #[test]
    fn test_insert_rows_keeps_sort_order() {
        let mut grid = grid();
        grid.sort_by("n", SortDirection::Descending).unwrap();
        grid.insert_rows(98, 2).unwrap();
        let projection = grid.projection();
        assert_eq!(projection.row_count(), 102);
        // old 99 is now data row 101, inserted rows sit above old row 98
        assert_eq!(&projection.indices()[..4], &[101, 98, 99, 100]);
        assert_eq!(grid.row_layout().len(), 102);
    }

    #[test]
    fn test_remove_rows_drops_from_projection() {
        let mut grid = grid();
        grid.sort_by("n", SortDirection::Descending).unwrap();
        grid.remove_rows(0, 50).unwrap();
        let projection = grid.projection();
        assert_eq!(projection.len(), 50);
        assert_eq!(projection.to_data_index(0), Some(49));
        assert_eq!(
            grid.store().get_value(49, "n").unwrap(),
            &CellValue::Number(99.0)
        );
    }

    #[test]
    fn test_install_projection_rejects_mismatch() {
        let mut grid = grid();
        assert!(matches!(
            grid.install_projection(IndexMap::identity(5)),
            Err(XlgridError::ProjectionMismatch {
                expected: 100,
                found: 5
            })
        ));
    }

    #[test]
    fn test_remove_column_updates_layout() {
        let mut grid = grid();
        grid.set_col_width(1, 300).unwrap();
        grid.remove_column("n").unwrap();
        assert_eq!(grid.col_layout().sizes(), &[300]);
        let cells = grid.realize().unwrap();
        assert!(cells.iter().all(|c| c.col == 0));
        assert_eq!(cells[0].value, CellValue::from("row 0"));
    }

    #[test]
    fn test_column_removal_keeps_handles_on_their_cells() {
        let mut grid = grid();
        grid.realize().unwrap();
        let label_handle = *grid.pool().get("0-1").unwrap();

        grid.remove_column("n").unwrap();
        let cells = grid.realize().unwrap();
        let keys: Vec<&str> = cells.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["0-1", "1-1", "2-1"]);
        assert_eq!(cells[0].col, 0);
        assert_eq!(grid.pool().get("0-1"), Some(&label_handle));
        assert!(!grid.pool().is_active("0-0"));
        assert!(grid.pool().lifecycle().recycled.is_empty());
    }

    #[test]
    fn test_row_renumbering_recycles_every_handle() {
        let mut grid = grid();
        grid.realize().unwrap();

        grid.remove_rows(0, 1).unwrap();
        assert_eq!(grid.pool_stats().active, 0);
        assert!(grid.realized().is_empty());
        let cells = grid.realize().unwrap();
        assert_eq!(cells[0].key, "0-0");
        assert_eq!(cells[0].value, CellValue::Number(1.0));
        assert_eq!(grid.pool().lifecycle().recycled.len(), 6);
        assert!(grid
            .pool()
            .lifecycle()
            .recycled
            .contains(&"0-0".to_string()));
        assert_eq!(grid.pool_stats().created, 6);

        grid.insert_rows(0, 1).unwrap();
        assert_eq!(grid.pool_stats().active, 0);
        let cells = grid.realize().unwrap();
        assert_eq!(cells[0].value, CellValue::Null);
        assert_eq!(grid.pool().lifecycle().recycled.len(), 12);

        grid.reset_rows(10);
        assert_eq!(grid.pool_stats().active, 0);
    }

    #[test]
    fn test_clear_pool() {
        let mut grid = grid();
        grid.realize().unwrap();
        grid.clear_pool();
        assert_eq!(grid.pool_stats().total, 0);
        assert!(grid.realized().is_empty());
    }
}
