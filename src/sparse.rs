//! Sparse `(row, col) -> value` overlay.
//!
//! Holds only the cells that deviate from the dense data underneath (edits,
//! computed overrides). Absence of a key means "use the dense value". Memory is
//! proportional to the number of overrides.
//!
//! Enumeration order is unspecified and may change after any mutation.
//! Mutating the matrix while enumerating is not possible through the borrow
//! checker; collect keys first if removals are needed.

use rustc_hash::FxHashMap;

/// Sparse overlay keyed by `(row, col)`.
#[derive(Debug, Clone)]
pub struct SparseMatrix<V> {
    entries: FxHashMap<(usize, usize), V>,
}

impl<V> Default for SparseMatrix<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SparseMatrix<V> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Override at `(row, col)`, if any.
    pub fn get(&self, row: usize, col: usize) -> Option<&V> {
        self.entries.get(&(row, col))
    }

    /// Override at `(row, col)`, falling back to `default`.
    pub fn get_or<'a>(&'a self, row: usize, col: usize, default: &'a V) -> &'a V {
        self.entries.get(&(row, col)).unwrap_or(default)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.entries.contains_key(&(row, col))
    }

    /// Insert or replace an override. Returns the previous override.
    pub fn set(&mut self, row: usize, col: usize, value: V) -> Option<V> {
        self.entries.insert((row, col), value)
    }

    /// Remove an override, reverting the cell to its dense value.
    pub fn delete(&mut self, row: usize, col: usize) -> Option<V> {
        self.entries.remove(&(row, col))
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every override.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Visit every override. Never scans empty cells.
    pub fn for_each_override<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, &V),
    {
        for (&(row, col), value) in &self.entries {
            f(row, col, value);
        }
    }

    /// Drop every override in `col`. Returns how many were removed.
    pub fn remove_col(&mut self, col: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&(_, c), _| c != col);
        before - self.entries.len()
    }

    /// Re-key rows after `count` rows were inserted (`delta > 0`) or removed
    /// (`delta < 0`) at `at`. Overrides inside a removed span are dropped.
    /// O(overrides).
    pub fn shift_rows(&mut self, at: usize, delta: isize) {
        if delta == 0 || self.entries.is_empty() {
            return;
        }
        let span = delta.unsigned_abs();
        let removed_end = at.saturating_add(span);
        let old = std::mem::take(&mut self.entries);
        self.entries.reserve(old.len());
        for ((row, col), value) in old {
            let moved = if row < at {
                Some(row)
            } else if delta > 0 {
                row.checked_add(span)
            } else if row < removed_end {
                None
            } else {
                Some(row - span)
            };
            if let Some(row) = moved {
                self.entries.insert((row, col), value);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let mut m: SparseMatrix<&str> = SparseMatrix::new();
        let default = "-";
        m.set(2, 3, "X");
        assert_eq!(m.get(2, 3), Some(&"X"));
        assert_eq!(*m.get_or(2, 3, &default), "X");
        assert_eq!(m.delete(2, 3), Some("X"));
        assert_eq!(m.get(2, 3), None);
        assert_eq!(*m.get_or(2, 3, &default), "-");
        assert!(m.is_empty());
    }

    #[test]
    fn test_replace_and_len() {
        let mut m = SparseMatrix::new();
        assert_eq!(m.set(0, 0, 1), None);
        assert_eq!(m.set(0, 0, 2), Some(1));
        m.set(5, 1, 3);
        assert_eq!(m.len(), 2);
        assert!(m.contains(5, 1));
    }

    #[test]
    fn test_for_each_visits_only_overrides() {
        let mut m = SparseMatrix::new();
        m.set(1_000_000, 7, 'a');
        m.set(3, 2, 'b');
        let mut seen = Vec::new();
        m.for_each_override(|r, c, v| seen.push((r, c, *v)));
        seen.sort_unstable();
        assert_eq!(seen, vec![(3, 2, 'b'), (1_000_000, 7, 'a')]);
    }

    #[test]
    fn test_shift_rows_insert() {
        let mut m = SparseMatrix::new();
        m.set(1, 0, "a");
        m.set(4, 0, "b");
        m.shift_rows(2, 3);
        assert_eq!(m.get(1, 0), Some(&"a"));
        assert_eq!(m.get(4, 0), None);
        assert_eq!(m.get(7, 0), Some(&"b"));
    }

    #[test]
    fn test_shift_rows_delete_drops_span() {
        let mut m = SparseMatrix::new();
        m.set(1, 0, "a");
        m.set(2, 0, "gone");
        m.set(3, 1, "gone too");
        m.set(6, 1, "b");
        m.shift_rows(2, -2);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(1, 0), Some(&"a"));
        assert_eq!(m.get(4, 1), Some(&"b"));
    }

    #[test]
    fn test_remove_col() {
        let mut m = SparseMatrix::new();
        m.set(0, 0, 1);
        m.set(0, 3, 2);
        m.set(1, 3, 3);
        assert_eq!(m.remove_col(3), 2);
        assert_eq!(m.remove_col(3), 0);
        assert_eq!(m.get(0, 0), Some(&1));
        assert_eq!(m.len(), 1);
    }
}
