//! Filter predicates over inventory dimensions
//!
//! A predicate is either an exact comparison against one value or a range made
//! of two comparisons that must both hold. Predicates are plain data and are
//! evaluated against a [`Column`] into a boolean row mask.

use std::fmt;
use std::str::FromStr;

use arrow::array::BooleanArray;
use arrow::compute::kernels::boolean::and;
use chrono::{NaiveDate, NaiveDateTime};

use super::column::Column;
use super::error::{CubeError, CubeResult};
use super::value::DimValue;

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    /// Operator token, e.g. `">="`
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
        }
    }
}

impl FromStr for Comparator {
    type Err = CubeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::Ne),
            ">" => Ok(Comparator::Gt),
            "<" => Ok(Comparator::Lt),
            ">=" => Ok(Comparator::Ge),
            "<=" => Ok(Comparator::Le),
            other => Err(CubeError::InvalidComparator(other.to_string())),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A typed filter predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> value`
    Exact { op: Comparator, value: DimValue },
    /// `column <lower_op> lower AND column <upper_op> upper`
    Range {
        lower_op: Comparator,
        lower: DimValue,
        upper_op: Comparator,
        upper: DimValue,
    },
}

impl Predicate {
    /// Equality predicate, the default when no comparator is given
    pub fn equals(value: impl Into<DimValue>) -> Self {
        Predicate::Exact {
            op: Comparator::Eq,
            value: value.into(),
        }
    }

    pub fn exact(op: Comparator, value: impl Into<DimValue>) -> Self {
        Predicate::Exact {
            op,
            value: value.into(),
        }
    }

    /// Closed range `lower <= column <= upper`
    pub fn range(lower: impl Into<DimValue>, upper: impl Into<DimValue>) -> Self {
        Self::range_with(Comparator::Ge, lower, Comparator::Le, upper)
    }

    pub fn range_with(
        lower_op: Comparator,
        lower: impl Into<DimValue>,
        upper_op: Comparator,
        upper: impl Into<DimValue>,
    ) -> Self {
        Predicate::Range {
            lower_op,
            lower: lower.into(),
            upper_op,
            upper: upper.into(),
        }
    }

    /// Build a predicate from a loosely shaped value/expression pair.
    ///
    /// A scalar value needs a single comparator (or none, meaning `==`), a
    /// pair of values needs a pair of comparators.
    ///
    /// # Errors
    /// Returns `PredicateShape` if the value and expression shapes differ
    pub fn from_parts(value: FilterValue, expr: Option<FilterExpr>) -> CubeResult<Self> {
        match (value, expr) {
            (FilterValue::Scalar(value), None) => Ok(Predicate::Exact {
                op: Comparator::Eq,
                value,
            }),
            (FilterValue::Scalar(value), Some(FilterExpr::Single(op))) => {
                Ok(Predicate::Exact { op, value })
            }
            (FilterValue::Pair(lower, upper), Some(FilterExpr::Pair(lower_op, upper_op))) => {
                Ok(Predicate::Range {
                    lower_op,
                    lower,
                    upper_op,
                    upper,
                })
            }
            (value, expr) => Err(CubeError::PredicateShape {
                values: value.arity(),
                expressions: expr.map_or(1, |e| e.arity()),
            }),
        }
    }

    /// Evaluate the predicate against a column into a row mask.
    ///
    /// Null rows evaluate to null and are treated as not selected.
    ///
    /// # Errors
    /// Returns error if a bound's type is incompatible with the column
    pub fn evaluate(&self, column: &Column) -> CubeResult<BooleanArray> {
        match self {
            Predicate::Exact { op, value } => column.compare_scalar(*op, value),
            Predicate::Range {
                lower_op,
                lower,
                upper_op,
                upper,
            } => {
                let lower_mask = column.compare_scalar(*lower_op, lower)?;
                let upper_mask = column.compare_scalar(*upper_op, upper)?;
                Ok(and(&lower_mask, &upper_mask)?)
            }
        }
    }

    /// Row indices selected by the predicate, in row order
    ///
    /// # Errors
    /// Returns error if a bound's type is incompatible with the column
    pub fn select(&self, column: &Column) -> CubeResult<Vec<usize>> {
        let mask = self.evaluate(column)?;
        Ok(mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| (keep == Some(true)).then_some(i))
            .collect())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Exact { op, value } => write!(f, "{op} {value}"),
            Predicate::Range {
                lower_op,
                lower,
                upper_op,
                upper,
            } => write!(f, "{lower_op} {lower} and {upper_op} {upper}"),
        }
    }
}

/// Filter value: a scalar or a (lower, upper) pair
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(DimValue),
    Pair(DimValue, DimValue),
}

impl FilterValue {
    fn arity(&self) -> usize {
        match self {
            FilterValue::Scalar(_) => 1,
            FilterValue::Pair(..) => 2,
        }
    }
}

macro_rules! impl_scalar_filter_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Scalar(value.into())
                }
            }
        )*
    };
}

impl_scalar_filter_value!(DimValue, &str, String, i64, f64, bool, NaiveDateTime, NaiveDate);

/// Filter expression: one comparator or a (lower, upper) pair of comparators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterExpr {
    Single(Comparator),
    Pair(Comparator, Comparator),
}

impl FilterExpr {
    fn arity(self) -> usize {
        match self {
            FilterExpr::Single(_) => 1,
            FilterExpr::Pair(..) => 2,
        }
    }

    /// Parse comparator tokens; one token gives `Single`, two give `Pair`
    ///
    /// # Errors
    /// Returns error for unknown tokens or more than two tokens
    pub fn parse(tokens: &[&str]) -> CubeResult<Self> {
        match tokens {
            [op] => Ok(FilterExpr::Single(op.parse()?)),
            [lower, upper] => Ok(FilterExpr::Pair(lower.parse()?, upper.parse()?)),
            _ => Err(CubeError::PredicateShape {
                values: 0,
                expressions: tokens.len(),
            }),
        }
    }
}

impl From<Comparator> for FilterExpr {
    fn from(op: Comparator) -> Self {
        FilterExpr::Single(op)
    }
}

/// Pair up filter values with their expressions.
///
/// With no expressions every value is compared with `==`. Every pair is
/// validated before any predicate is returned.
///
/// # Errors
/// Returns `PredicateCount` if the two lists differ in length and
/// `PredicateShape` if a value and its expression differ in shape
pub fn predicates_from_parts(
    values: Vec<FilterValue>,
    expressions: Option<Vec<FilterExpr>>,
) -> CubeResult<Vec<Predicate>> {
    match expressions {
        None => values
            .into_iter()
            .map(|v| Predicate::from_parts(v, None))
            .collect(),
        Some(exprs) => {
            if exprs.len() != values.len() {
                return Err(CubeError::PredicateCount {
                    values: values.len(),
                    expressions: exprs.len(),
                });
            }
            values
                .into_iter()
                .zip(exprs)
                .map(|(v, e)| Predicate::from_parts(v, Some(e)))
                .collect()
        }
    }
}
