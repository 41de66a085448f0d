//! xlgrid - virtualization core for large tabular grids
//!
//! Keeps a million-row grid responsive by only ever touching what is on
//! screen:
//! - Columnar typed storage with a sparse edit overlay and single-pass aggregates
//! - Flat sort/filter projections mapping visual rows to data rows
//! - Cumulative row/column sizes with O(log n) update and offset lookup
//! - A keyed reuse pool for whatever renderable units the host draws with
//!
//! # Usage
//!
//! ```
//! use xlgrid::{CellLifecycle, ColumnType, GridConfig, GridView, SortDirection};
//!
//! struct Labels;
//! impl CellLifecycle for Labels {
//!     type Handle = String;
//!     fn create(&mut self) -> String {
//!         String::new()
//!     }
//! }
//!
//! let mut grid = GridView::with_rows(GridConfig::default(), 3, Labels);
//! grid.add_column_with_values(
//!     "price",
//!     ColumnType::Numeric,
//!     vec![3.0.into(), 1.0.into(), 2.0.into()],
//! )?;
//! grid.sort_by("price", SortDirection::Ascending)?;
//! let cells = grid.realize()?;
//! assert_eq!(cells[0].data_row, 1);
//! # Ok::<(), xlgrid::XlgridError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod index_map;
pub mod layout;
pub mod render;
pub mod sparse;
pub mod store;
pub mod types;
pub mod viewer;

pub use config::GridConfig;
pub use error::{Result, XlgridError};
pub use index_map::IndexMap;
pub use layout::{PrefixSumArray, Viewport};
pub use render::{cell_key, CellLifecycle, CellPool, PoolStats};
pub use sparse::SparseMatrix;
pub use store::{AggregateOptions, ColumnStore, SortDirection};
pub use types::*;
pub use viewer::{GridView, RealizedCell};
