//! Layout engine for variable-size rows and columns.
//!
//! This module handles:
//! - Cumulative sizes with O(log n) update and lookup ([`PrefixSumArray`])
//! - Viewport state (scroll position, visible visual range)

mod prefix_sum;
mod viewport;

pub use prefix_sum::PrefixSumArray;
pub use viewport::Viewport;
