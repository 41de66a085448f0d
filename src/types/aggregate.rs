use std::fmt;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::CellValue;

/// Column aggregation operator.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AggregateOp {
    Sum,
    Average,
    Min,
    Max,
    Count,
    DistinctCount,
}

impl AggregateOp {
    /// Operators that fold only numeric (and date) cells.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            AggregateOp::Sum | AggregateOp::Average | AggregateOp::Min | AggregateOp::Max
        )
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Average => "average",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Count => "count",
            AggregateOp::DistinctCount => "distinctCount",
        })
    }
}

/// Result of a single-pass column aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub op: AggregateOp,
    /// Folded value. `NaN` for average/min/max over zero numeric cells.
    pub value: f64,
    /// Cells that contributed to the fold.
    pub valid_count: usize,
    /// Cells skipped (null, or non-numeric for numeric operators).
    pub skipped: usize,
}

#[derive(Hash, PartialEq, Eq)]
enum DistinctKey<'a> {
    Number(OrderedFloat<f64>),
    Text(&'a str),
    Boolean(bool),
    Date(OrderedFloat<f64>),
}

impl<'a> DistinctKey<'a> {
    fn from_value(value: &'a CellValue) -> Option<Self> {
        match value {
            CellValue::Null => None,
            CellValue::Number(n) => Some(DistinctKey::Number(OrderedFloat(*n))),
            CellValue::Text(s) => Some(DistinctKey::Text(s)),
            CellValue::Boolean(b) => Some(DistinctKey::Boolean(*b)),
            CellValue::Date(d) => Some(DistinctKey::Date(OrderedFloat(*d))),
        }
    }
}

/// Fold state for one aggregation pass.
pub(crate) struct Accumulator<'a> {
    op: AggregateOp,
    sum: f64,
    min: f64,
    max: f64,
    valid: usize,
    skipped: usize,
    distinct: FxHashSet<DistinctKey<'a>>,
}

impl<'a> Accumulator<'a> {
    pub(crate) fn new(op: AggregateOp) -> Self {
        Self {
            op,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            valid: 0,
            skipped: 0,
            distinct: FxHashSet::default(),
        }
    }

    pub(crate) fn push(&mut self, value: &'a CellValue) {
        match self.op {
            AggregateOp::Count => {
                if value.is_null() {
                    self.skipped += 1;
                } else {
                    self.valid += 1;
                }
            }
            AggregateOp::DistinctCount => match DistinctKey::from_value(value) {
                Some(key) => {
                    self.valid += 1;
                    self.distinct.insert(key);
                }
                None => self.skipped += 1,
            },
            AggregateOp::Sum | AggregateOp::Average | AggregateOp::Min | AggregateOp::Max => {
                match value.as_number().filter(|n| !n.is_nan()) {
                    Some(n) => {
                        self.valid += 1;
                        self.sum += n;
                        self.min = self.min.min(n);
                        self.max = self.max.max(n);
                    }
                    None => self.skipped += 1,
                }
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(self) -> Aggregate {
        let empty = self.valid == 0;
        let value = match self.op {
            AggregateOp::Sum => self.sum,
            AggregateOp::Average if empty => f64::NAN,
            AggregateOp::Average => self.sum / self.valid as f64,
            AggregateOp::Min if empty => f64::NAN,
            AggregateOp::Min => self.min,
            AggregateOp::Max if empty => f64::NAN,
            AggregateOp::Max => self.max,
            AggregateOp::Count => self.valid as f64,
            AggregateOp::DistinctCount => self.distinct.len() as f64,
        };
        Aggregate {
            op: self.op,
            value,
            valid_count: self.valid,
            skipped: self.skipped,
        }
    }
}
