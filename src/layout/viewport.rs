//! Viewport state: scroll position and extent in layout units.

use std::ops::Range;

use super::PrefixSumArray;

/// Visible window over the grid.
///
/// Scroll offsets are measured from the top-left of the full layout. The
/// viewport never reads cell data; it only turns offsets into visual ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Horizontal scroll position
    pub scroll_x: u64,
    /// Vertical scroll position
    pub scroll_y: u64,
    pub width: u32,
    pub height: u32,
    /// Extra rows realized on each side of the visible window
    pub overscan_rows: usize,
    /// Extra columns realized on each side of the visible window
    pub overscan_cols: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scroll_x: 0,
            scroll_y: 0,
            width,
            height,
            overscan_rows: 0,
            overscan_cols: 0,
        }
    }

    pub fn with_overscan(mut self, rows: usize, cols: usize) -> Self {
        self.overscan_rows = rows;
        self.overscan_cols = cols;
        self
    }

    /// Visual rows to realize at the current scroll position, overscan
    /// included. `None` if there is nothing under the viewport.
    pub fn visible_rows(&self, rows: &PrefixSumArray) -> Option<Range<usize>> {
        let range = rows.visible_range(self.scroll_y, u64::from(self.height))?;
        Some(pad(range, self.overscan_rows, rows.len()))
    }

    /// Visual columns to realize, overscan included.
    pub fn visible_cols(&self, cols: &PrefixSumArray) -> Option<Range<usize>> {
        let range = cols.visible_range(self.scroll_x, u64::from(self.width))?;
        Some(pad(range, self.overscan_cols, cols.len()))
    }

    /// Keep the scroll position inside the layout so the last row and
    /// column can be reached but not scrolled past.
    pub fn clamp_scroll(&mut self, rows: &PrefixSumArray, cols: &PrefixSumArray) {
        let max_x = cols.total_size().saturating_sub(u64::from(self.width));
        let max_y = rows.total_size().saturating_sub(u64::from(self.height));
        self.scroll_x = self.scroll_x.min(max_x);
        self.scroll_y = self.scroll_y.min(max_y);
    }

    /// Scroll by delta amounts
    pub fn scroll_by(&mut self, dx: i64, dy: i64, rows: &PrefixSumArray, cols: &PrefixSumArray) {
        self.scroll_x = self.scroll_x.saturating_add_signed(dx);
        self.scroll_y = self.scroll_y.saturating_add_signed(dy);
        self.clamp_scroll(rows, cols);
    }

    /// Set absolute scroll position
    pub fn set_scroll(&mut self, x: u64, y: u64, rows: &PrefixSumArray, cols: &PrefixSumArray) {
        self.scroll_x = x;
        self.scroll_y = y;
        self.clamp_scroll(rows, cols);
    }

    /// Resize the viewport. Call [`Viewport::clamp_scroll`] afterwards if the
    /// viewport grew.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

fn pad(range: Range<usize>, overscan: usize, len: usize) -> Range<usize> {
    range.start.saturating_sub(overscan)..range.end.saturating_add(overscan).min(len)
}
