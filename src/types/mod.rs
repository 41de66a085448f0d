//! Value and result types shared by the grid data layer.

mod aggregate;
mod cell;

pub(crate) use aggregate::Accumulator;
pub use aggregate::{Aggregate, AggregateOp};
pub use cell::*;
