use crate::types::{CellValue, ColumnType};

/// One dense, homogeneously typed column.
///
/// `key` is a stable slot number assigned at registration; it is the column
/// coordinate used in the overlay and in cache keys, so removing another
/// column never re-keys this one.
#[derive(Debug, Clone)]
pub(crate) struct Column {
    pub id: String,
    pub key: usize,
    pub ty: ColumnType,
    pub values: Vec<CellValue>,
    /// Bumped on every write that can change an aggregate over this column.
    pub revision: u64,
}

impl Column {
    pub fn new(id: String, key: usize, ty: ColumnType, values: Vec<CellValue>) -> Self {
        Self {
            id,
            key,
            ty,
            values,
            revision: 0,
        }
    }

    pub fn touch(&mut self) {
        self.revision += 1;
    }
}
