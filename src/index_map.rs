//! Visual <-> data row projection.
//!
//! An [`IndexMap`] is the result of a sort and/or filter: `indices[visual] =
//! data`. It never touches the underlying data. Both directions are O(1): the
//! forward array plus a reverse array sized to the data row count, built once
//! at construction.
//!
//! Instances are immutable. A new sort or filter builds a new map (chaining is
//! flattened at construction, see [`IndexMap::project`]) and the owner swaps
//! its handle, so a map can be shared read-only through `Rc`/`Arc`.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XlgridError};

/// Marker in the reverse array for data rows not present in the projection.
const ABSENT: usize = usize::MAX;

/// Immutable visual-to-data row projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMapRepr", into = "IndexMapRepr")]
pub struct IndexMap {
    /// `forward[visual] = data`
    forward: Vec<usize>,
    /// `reverse[data] = visual`, or `ABSENT`
    reverse: Vec<usize>,
}

/// Serialized form: the data row count plus the ordered surviving indices.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexMapRepr {
    row_count: usize,
    indices: Vec<usize>,
}

impl IndexMap {
    /// Identity projection over `row_count` rows.
    pub fn identity(row_count: usize) -> Self {
        Self {
            forward: (0..row_count).collect(),
            reverse: (0..row_count).collect(),
        }
    }

    /// Projection from an ordered sequence of surviving data indices.
    ///
    /// Fails if an index is `>= row_count` or appears twice.
    pub fn new(indices: Vec<usize>, row_count: usize) -> Result<Self> {
        let mut reverse = vec![ABSENT; row_count];
        for (visual, &data) in indices.iter().enumerate() {
            let slot = reverse
                .get_mut(data)
                .ok_or_else(|| XlgridError::out_of_range(data, row_count))?;
            if *slot != ABSENT {
                return Err(XlgridError::DuplicateIndex(data));
            }
            *slot = visual;
        }
        Ok(Self {
            forward: indices,
            reverse,
        })
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of rows in the data space this projection was built over.
    pub fn row_count(&self) -> usize {
        self.reverse.len()
    }

    /// Data row shown at `visual`, or `None` past the end.
    #[inline]
    pub fn to_data_index(&self, visual: usize) -> Option<usize> {
        self.forward.get(visual).copied()
    }

    /// Visual position of `data`, or `None` if it was filtered out or is
    /// outside the data space.
    #[inline]
    pub fn to_visual_index(&self, data: usize) -> Option<usize> {
        self.reverse.get(data).copied().filter(|&v| v != ABSENT)
    }

    pub fn contains_data(&self, data: usize) -> bool {
        self.to_visual_index(data).is_some()
    }

    /// Surviving data indices in visual order.
    pub fn indices(&self) -> &[usize] {
        &self.forward
    }

    /// True when every data row is visible in original order.
    pub fn is_identity(&self) -> bool {
        self.len() == self.row_count() && self.forward.iter().enumerate().all(|(v, &d)| v == d)
    }

    /// `(visual, data)` pairs in visual order. Restartable.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.forward.iter().enumerate(),
        }
    }

    /// Reorder or subset this projection's visual space. `visual_order` lists
    /// positions in *this* map; the result maps straight to data rows, so no
    /// chain of maps is kept.
    pub fn project(&self, visual_order: &[usize]) -> Result<Self> {
        let indices = visual_order
            .iter()
            .map(|&v| {
                self.to_data_index(v)
                    .ok_or_else(|| XlgridError::out_of_range(v, self.len()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(indices, self.row_count())
    }

    /// Keep visible rows whose data index satisfies `keep`, preserving order.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize) -> bool,
    {
        let mut reverse = vec![ABSENT; self.row_count()];
        let mut forward = Vec::with_capacity(self.len());
        for &data in &self.forward {
            if keep(data) {
                if let Some(slot) = reverse.get_mut(data) {
                    *slot = forward.len();
                }
                forward.push(data);
            }
        }
        Self { forward, reverse }
    }

    /// Stable sort of the visible rows by data index comparator.
    pub fn sorted_by<F>(&self, mut compare: F) -> Self
    where
        F: FnMut(usize, usize) -> std::cmp::Ordering,
    {
        let mut forward = self.forward.clone();
        forward.sort_by(|&a, &b| compare(a, b));
        let mut reverse = vec![ABSENT; self.row_count()];
        for (visual, &data) in forward.iter().enumerate() {
            if let Some(slot) = reverse.get_mut(data) {
                *slot = visual;
            }
        }
        Self { forward, reverse }
    }
}

impl Default for IndexMap {
    fn default() -> Self {
        Self::identity(0)
    }
}

impl TryFrom<IndexMapRepr> for IndexMap {
    type Error = XlgridError;

    fn try_from(repr: IndexMapRepr) -> Result<Self> {
        Self::new(repr.indices, repr.row_count)
    }
}

impl From<IndexMap> for IndexMapRepr {
    fn from(map: IndexMap) -> Self {
        IndexMapRepr {
            row_count: map.row_count(),
            indices: map.forward,
        }
    }
}

impl<'a> IntoIterator for &'a IndexMap {
    type Item = (usize, usize);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Iterator over `(visual, data)` pairs.
pub struct Iter<'a> {
    inner: std::iter::Enumerate<std::slice::Iter<'a, usize>>,
}

impl Iterator for Iter<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, &d)| (v, d))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}
