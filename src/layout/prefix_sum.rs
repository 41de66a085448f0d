//! Cumulative-size index for variable row heights and column widths.
//!
//! Sizes are kept in a plain `Vec<u32>` for O(1) reads, with a Fenwick tree of
//! `u64` partial sums alongside so a single size change costs O(log n) instead
//! of a full re-accumulation of every later position.
//!
//! Position conventions, with `C[i] = s[0] + ... + s[i]`:
//! - `position_of_index(i)` is `C[i-1]`, the leading edge of element `i`;
//!   `i == len()` is accepted and yields the trailing edge (`total_size()`).
//! - `index_at_position(offset)` is the smallest `i` with `C[i] > offset`, so
//!   zero-sized (hidden) elements are never hit. `None` when the array is empty
//!   or `offset >= total_size()`.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XlgridError};

/// Prefix-sum index over non-negative sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct PrefixSumArray {
    /// Element sizes, 0-indexed.
    sizes: Vec<u32>,
    /// 1-indexed Fenwick storage; `tree[0]` is unused.
    tree: Vec<u64>,
}

impl PrefixSumArray {
    /// Build from explicit sizes in O(n).
    pub fn from_sizes(sizes: Vec<u32>) -> Self {
        let tree = build_tree(&sizes);
        Self { sizes, tree }
    }

    /// `n` elements, all of `size`.
    pub fn uniform(n: usize, size: u32) -> Self {
        Self::from_sizes(vec![size; n])
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Size of element `i`.
    pub fn get(&self, i: usize) -> Result<u32> {
        self.sizes
            .get(i)
            .copied()
            .ok_or_else(|| XlgridError::out_of_range(i, self.len()))
    }

    /// Raw sizes in index order.
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Replace the size of element `i`. O(log n).
    pub fn set_size(&mut self, i: usize, size: u32) -> Result<()> {
        let len = self.len();
        let slot = self
            .sizes
            .get_mut(i)
            .ok_or_else(|| XlgridError::out_of_range(i, len))?;
        let old = *slot;
        if old == size {
            return Ok(());
        }
        *slot = size;

        let mut idx = i + 1;
        while let Some(node) = self.tree.get_mut(idx) {
            if size > old {
                *node += u64::from(size - old);
            } else {
                *node -= u64::from(old - size);
            }
            idx += lowbit(idx);
        }
        Ok(())
    }

    /// Sum of the first `count` sizes (`C[count-1]`). O(log n).
    fn prefix(&self, count: usize) -> u64 {
        let mut sum = 0u64;
        let mut idx = count.min(self.len());
        while idx > 0 {
            sum += self.tree.get(idx).copied().unwrap_or(0);
            idx -= lowbit(idx);
        }
        sum
    }

    /// Leading edge of element `i`. `i == len()` yields the trailing edge.
    pub fn position_of_index(&self, i: usize) -> Result<u64> {
        if i > self.len() {
            return Err(XlgridError::out_of_range(i, self.len()));
        }
        Ok(self.prefix(i))
    }

    /// Smallest index whose cumulative size exceeds `offset`. O(log n).
    pub fn index_at_position(&self, offset: u64) -> Option<usize> {
        let n = self.len();
        if n == 0 {
            return None;
        }

        // Fenwick descent: find how many leading elements have C[i] <= offset.
        let mut pos = 0usize;
        let mut remaining = offset;
        let mut step = most_significant_bit(n);
        while step > 0 {
            let next = pos + step;
            if let Some(&node) = self.tree.get(next) {
                if node <= remaining {
                    remaining -= node;
                    pos = next;
                }
            }
            step >>= 1;
        }

        (pos < n).then_some(pos)
    }

    /// Total of all sizes.
    pub fn total_size(&self) -> u64 {
        self.prefix(self.len())
    }

    /// Combined size of the half-open range `start..end`.
    pub fn range_size(&self, start: usize, end: usize) -> Result<u64> {
        if start > end {
            return Err(XlgridError::out_of_range(start, end));
        }
        Ok(self.position_of_index(end)? - self.position_of_index(start)?)
    }

    /// Elements intersecting the window `[offset, offset + extent)`.
    ///
    /// Returns `None` when the window starts past the end. A zero extent still
    /// yields the single element under `offset`.
    pub fn visible_range(&self, offset: u64, extent: u64) -> Option<Range<usize>> {
        let start = self.index_at_position(offset)?;
        let last_offset = offset.saturating_add(extent.saturating_sub(1));
        let end = self
            .index_at_position(last_offset)
            .map_or(self.len(), |i| i + 1);
        Some(start..end.max(start + 1))
    }

    /// Resize to `n` elements. O(n).
    ///
    /// Surviving sizes are always kept and only appended elements get
    /// `default_size`, so `resize(len(), d)` is a no-op. Use
    /// [`PrefixSumArray::uniform`] to reset every size.
    pub fn resize(&mut self, n: usize, default_size: u32) {
        if n == self.len() {
            return;
        }
        self.sizes.resize(n, default_size);
        self.tree = build_tree(&self.sizes);
        tracing::debug!(len = n, total = self.total_size(), "prefix sums rebuilt");
    }
}

impl Default for PrefixSumArray {
    fn default() -> Self {
        Self::from_sizes(Vec::new())
    }
}

impl PartialEq for PrefixSumArray {
    fn eq(&self, other: &Self) -> bool {
        self.sizes == other.sizes
    }
}

impl Eq for PrefixSumArray {}

impl From<Vec<u32>> for PrefixSumArray {
    fn from(sizes: Vec<u32>) -> Self {
        Self::from_sizes(sizes)
    }
}

impl From<PrefixSumArray> for Vec<u32> {
    fn from(array: PrefixSumArray) -> Self {
        array.sizes
    }
}

/// Build the 1-indexed tree in O(n) by pushing each node into its parent.
fn build_tree(sizes: &[u32]) -> Vec<u64> {
    let n = sizes.len();
    let mut tree = Vec::with_capacity(n + 1);
    tree.push(0);
    tree.extend(sizes.iter().map(|&s| u64::from(s)));
    for i in 1..=n {
        let parent = i + lowbit(i);
        if parent <= n {
            let child = tree.get(i).copied().unwrap_or(0);
            if let Some(node) = tree.get_mut(parent) {
                *node += child;
            }
        }
    }
    tree
}

#[inline]
fn lowbit(x: usize) -> usize {
    x & x.wrapping_neg()
}

#[inline]
fn most_significant_bit(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}
