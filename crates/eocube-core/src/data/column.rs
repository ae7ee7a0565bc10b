//! Column: a single named inventory dimension backed by an Arrow array

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, BooleanArray, Datum, Float64Array, Int64Array,
    Scalar, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::kernels::cmp;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use arrow::error::ArrowError;

use super::error::{CubeError, CubeResult};
use super::predicate::Comparator;
use super::value::DimValue;

/// A single column of homogeneous values backed by an Arrow array
#[derive(Clone)]
pub struct Column {
    /// Column name
    name: String,
    /// The underlying Arrow array (reference-counted for zero-copy)
    array: ArrayRef,
}

impl Column {
    /// Create a new Column from an Arrow array
    #[must_use]
    pub fn new(name: impl Into<String>, array: ArrayRef) -> Self {
        Self {
            name: name.into(),
            array,
        }
    }

    /// Create a Column of strings
    #[must_use]
    pub fn from_strings(name: impl Into<String>, values: &[&str]) -> Self {
        let array = Arc::new(StringArray::from(values.to_vec())) as ArrayRef;
        Self::new(name, array)
    }

    /// Create a Column where every row is null
    #[must_use]
    pub fn nulls(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, new_null_array(&DataType::Null, len))
    }

    /// Create a Column from dimension values
    ///
    /// The type is inferred from the first non-null value. Integers are
    /// widened when mixed with floats.
    ///
    /// # Errors
    /// Returns error if values have mixed, incompatible kinds
    pub fn from_values(name: impl Into<String>, values: &[DimValue]) -> CubeResult<Self> {
        let name = name.into();
        let Some(first) = values.iter().find(|v| !v.is_null()) else {
            return Ok(Self::nulls(name, values.len()));
        };

        let has_float = values.iter().any(|v| matches!(v, DimValue::Float(_)));
        let mismatch = |v: &DimValue, expected: &str| CubeError::TypeMismatch {
            expected: format!("{expected} values for dimension '{name}'"),
            found: v.kind().to_string(),
        };

        let floats = || -> CubeResult<ArrayRef> {
            let floats = values
                .iter()
                .map(|v| match v {
                    DimValue::Null => Ok(None),
                    DimValue::Int(_) | DimValue::Float(_) => Ok(v.as_f64()),
                    other => Err(mismatch(other, "Float")),
                })
                .collect::<CubeResult<Vec<_>>>()?;
            Ok(Arc::new(Float64Array::from(floats)))
        };

        let array: ArrayRef = match first {
            DimValue::Null => new_null_array(&DataType::Null, values.len()),
            DimValue::Float(_) => floats()?,
            DimValue::Int(_) if has_float => floats()?,
            DimValue::Int(_) => {
                let ints = values
                    .iter()
                    .map(|v| match v {
                        DimValue::Null => Ok(None),
                        DimValue::Int(i) => Ok(Some(*i)),
                        other => Err(mismatch(other, "Int")),
                    })
                    .collect::<CubeResult<Vec<_>>>()?;
                Arc::new(Int64Array::from(ints))
            }
            DimValue::Bool(_) => {
                let bools = values
                    .iter()
                    .map(|v| match v {
                        DimValue::Null => Ok(None),
                        DimValue::Bool(b) => Ok(Some(*b)),
                        other => Err(mismatch(other, "Bool")),
                    })
                    .collect::<CubeResult<Vec<_>>>()?;
                Arc::new(BooleanArray::from(bools))
            }
            DimValue::Str(_) => {
                let strings = values
                    .iter()
                    .map(|v| match v {
                        DimValue::Null => Ok(None),
                        DimValue::Str(s) => Ok(Some(s.as_str())),
                        other => Err(mismatch(other, "String")),
                    })
                    .collect::<CubeResult<Vec<_>>>()?;
                Arc::new(StringArray::from(strings))
            }
            DimValue::Time(_) => {
                let micros = values
                    .iter()
                    .map(|v| match v {
                        DimValue::Null => Ok(None),
                        DimValue::Time(t) => Ok(Some(DimValue::micros(t))),
                        other => Err(mismatch(other, "Timestamp")),
                    })
                    .collect::<CubeResult<Vec<_>>>()?;
                Arc::new(TimestampMicrosecondArray::from(micros))
            }
        };

        Ok(Self::new(name, array))
    }

    /// Get the column name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the column
    #[must_use]
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Get the Arrow data type
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Get the underlying Arrow array
    #[must_use]
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Check whether this column stores timestamps
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self.data_type(), DataType::Timestamp(_, _))
    }

    /// Get the value at the given row
    ///
    /// # Errors
    /// Returns error if the row is out of bounds or the Arrow type is not a
    /// dimension type
    pub fn get(&self, index: usize) -> CubeResult<DimValue> {
        if index >= self.len() {
            return Err(CubeError::OutOfBounds {
                index,
                length: self.len(),
            });
        }

        if self.array.is_null(index) {
            return Ok(DimValue::Null);
        }

        match self.array.data_type() {
            DataType::Null => Ok(DimValue::Null),
            DataType::Boolean => Ok(DimValue::Bool(self.array.as_boolean().value(index))),
            DataType::Int64 => Ok(DimValue::Int(
                self.array.as_primitive::<Int64Type>().value(index),
            )),
            DataType::Float64 => Ok(DimValue::Float(
                self.array.as_primitive::<Float64Type>().value(index),
            )),
            DataType::Utf8 => Ok(DimValue::Str(
                self.array.as_string::<i32>().value(index).to_string(),
            )),
            DataType::Timestamp(TimeUnit::Microsecond, None) => Ok(DimValue::from_micros(
                self.array
                    .as_primitive::<TimestampMicrosecondType>()
                    .value(index),
            )),
            other => Err(CubeError::TypeMismatch {
                expected: "dimension type".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// Collect all values of the column
    ///
    /// # Errors
    /// Returns error if the Arrow type is not a dimension type
    pub fn to_values(&self) -> CubeResult<Vec<DimValue>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Compare every row against a scalar.
    ///
    /// Null rows, and every row of an all-null column, compare as null and
    /// are never selected downstream.
    ///
    /// # Errors
    /// Returns error if the value kind is incompatible with the column type
    pub fn compare_scalar(&self, op: Comparator, value: &DimValue) -> CubeResult<BooleanArray> {
        if self.data_type() == &DataType::Null || value.is_null() {
            return Ok(BooleanArray::new_null(self.len()));
        }

        let cmp_fn: fn(&dyn Datum, &dyn Datum) -> Result<BooleanArray, ArrowError> = match op {
            Comparator::Eq => cmp::eq,
            Comparator::Ne => cmp::neq,
            Comparator::Gt => cmp::gt,
            Comparator::Lt => cmp::lt,
            Comparator::Ge => cmp::gt_eq,
            Comparator::Le => cmp::lt_eq,
        };

        #[allow(clippy::cast_precision_loss)]
        let result = match (self.data_type(), value) {
            (DataType::Int64, DimValue::Int(v)) => {
                cmp_fn(&self.array, &Scalar::new(Int64Array::from(vec![*v])))
            }
            (DataType::Int64, DimValue::Float(v)) => {
                let widened = arrow::compute::cast(&self.array, &DataType::Float64)?;
                cmp_fn(&widened, &Scalar::new(Float64Array::from(vec![*v])))
            }
            (DataType::Float64, DimValue::Int(v)) => {
                cmp_fn(&self.array, &Scalar::new(Float64Array::from(vec![*v as f64])))
            }
            (DataType::Float64, DimValue::Float(v)) => {
                cmp_fn(&self.array, &Scalar::new(Float64Array::from(vec![*v])))
            }
            (DataType::Boolean, DimValue::Bool(v)) => {
                cmp_fn(&self.array, &Scalar::new(BooleanArray::from(vec![*v])))
            }
            (DataType::Utf8, DimValue::Str(v)) => {
                cmp_fn(&self.array, &Scalar::new(StringArray::from(vec![v.as_str()])))
            }
            (DataType::Timestamp(TimeUnit::Microsecond, None), DimValue::Time(t)) => cmp_fn(
                &self.array,
                &Scalar::new(TimestampMicrosecondArray::from(vec![DimValue::micros(t)])),
            ),
            _ => {
                return Err(CubeError::TypeMismatch {
                    expected: format!("{:?} value for dimension '{}'", self.data_type(), self.name),
                    found: value.kind().to_string(),
                })
            }
        };
        Ok(result?)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Column {{ name: {:?}, dtype: {:?}, len: {} }}",
            self.name,
            self.data_type(),
            self.len()
        )
    }
}
