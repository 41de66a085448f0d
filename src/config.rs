//! Grid configuration.
//!
//! The caller builds a [`GridConfig`] (usually from JSON handed over by the
//! host) and passes it to [`crate::viewer::GridView::new`]. Nothing here is
//! global; two grids can run with different settings side by side.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::DEFAULT_AGGREGATE_CACHE;

/// Sizing, pooling and caching knobs for one grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Height given to rows that have not been measured.
    pub default_row_height: u32,
    /// Width given to columns that have not been measured.
    pub default_col_width: u32,
    /// Handles created up front by the cell pool.
    pub pool_initial_size: usize,
    /// Soft cap on pooled plus active handles.
    pub pool_max_size: usize,
    pub overscan_rows: usize,
    pub overscan_cols: usize,
    /// Cached aggregate results; 0 disables the cache.
    pub aggregate_cache_capacity: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_row_height: 20,
            default_col_width: 64,
            pool_initial_size: 64,
            pool_max_size: 512,
            overscan_rows: 2,
            overscan_cols: 1,
            aggregate_cache_capacity: DEFAULT_AGGREGATE_CACHE,
        }
    }
}

impl GridConfig {
    /// Parse a JSON object. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
