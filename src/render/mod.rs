//! Rendering-side support.
//!
//! The grid core does not draw anything. It decides which cells must exist
//! and hands their keys to a [`CellPool`], which recycles whatever renderable
//! units the host supplies through [`CellLifecycle`].

mod pool;

pub use pool::{cell_key, CellLifecycle, CellPool, PoolStats};
