//! Inventory: the file table behind a data cube
//!
//! Rows are files, columns are dimensions. The table is one Arrow
//! `RecordBatch` holding the `filepath` column followed by the dimension
//! columns, plus an optional footprint polygon per row. Arrow buffers and the
//! geometry vector are reference-counted, so clones are cheap and every
//! structural change produces new buffers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, UInt32Array};
use arrow::compute::{concat_batches, lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::datatypes::{DataType, Field, Schema};
use geo::Polygon;

use super::column::Column;
use super::error::{CubeError, CubeResult};
use super::value::DimValue;

/// Name of the mandatory file identifier column
pub const FILEPATH: &str = "filepath";

/// Name of the optional footprint column
pub const GEOMETRY: &str = "geometry";

/// Footprint polygons, one per row
pub type Geometry = Arc<[Option<Polygon<f64>>]>;

/// A table of files and their dimension values
#[derive(Clone)]
pub struct Inventory {
    /// `filepath` followed by the dimension columns
    batch: RecordBatch,
    /// Footprint per row, parallel to `batch`
    geometry: Option<Geometry>,
}

impl Inventory {
    /// Create an inventory from file identifiers and dimension columns
    ///
    /// # Errors
    /// Returns error if lengths differ or a dimension name is reserved or
    /// repeated
    pub fn from_columns(
        filepaths: &[impl AsRef<str>],
        dimensions: Vec<Column>,
        geometry: Option<Vec<Option<Polygon<f64>>>>,
    ) -> CubeResult<Self> {
        let paths: Vec<&str> = filepaths.iter().map(AsRef::as_ref).collect();
        let mut columns = Vec::with_capacity(dimensions.len() + 1);
        columns.push(Column::from_strings(FILEPATH, &paths));
        columns.extend(dimensions);
        Self::from_parts(columns, geometry.map(Into::into))
    }

    /// Create an inventory with only the `filepath` column
    ///
    /// # Errors
    /// Returns error if the Arrow batch cannot be built
    pub fn from_filepaths(filepaths: &[impl AsRef<str>]) -> CubeResult<Self> {
        Self::from_columns(filepaths, Vec::new(), None)
    }

    /// Assemble from a complete column list whose first column is `filepath`
    fn from_parts(columns: Vec<Column>, geometry: Option<Geometry>) -> CubeResult<Self> {
        let len = columns.first().map_or(0, Column::len);

        let mut seen = HashSet::new();
        for (i, col) in columns.iter().enumerate() {
            let reserved = col.name() == GEOMETRY || (i > 0 && col.name() == FILEPATH);
            if reserved || !seen.insert(col.name().to_string()) {
                return Err(CubeError::DimensionCollision(col.name().to_string()));
            }
            if col.len() != len {
                return Err(CubeError::LengthMismatch {
                    expected: len,
                    found: col.len(),
                });
            }
        }
        if let Some(geometry) = &geometry {
            if geometry.len() != len {
                return Err(CubeError::LengthMismatch {
                    expected: len,
                    found: geometry.len(),
                });
            }
        }

        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(c.name(), c.data_type().clone(), true))
            .collect();
        let arrays: Vec<ArrayRef> = columns.iter().map(|c| c.array().clone()).collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

        Ok(Self { batch, geometry })
    }

    /// Number of rows (files)
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The underlying Arrow batch (`filepath` plus dimensions, no geometry)
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Dimension names in column order, excluding `filepath` and `geometry`
    #[must_use]
    pub fn dimension_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .skip(1)
            .map(|f| f.name().clone())
            .collect()
    }

    /// Check whether a dimension exists
    #[must_use]
    pub fn has_dimension(&self, name: &str) -> bool {
        name != FILEPATH && self.batch.schema().index_of(name).is_ok()
    }

    /// Get a column by name, `filepath` included
    ///
    /// # Errors
    /// Returns `UnknownDimension` if no such column exists
    pub fn column(&self, name: &str) -> CubeResult<Column> {
        let index = self
            .batch
            .schema()
            .index_of(name)
            .map_err(|_| CubeError::UnknownDimension(name.to_string()))?;
        Ok(Column::new(name, self.batch.column(index).clone()))
    }

    /// All dimension columns in order
    #[must_use]
    pub fn dimension_columns(&self) -> Vec<Column> {
        let schema = self.batch.schema();
        schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .skip(1)
            .map(|(field, array)| Column::new(field.name(), array.clone()))
            .collect()
    }

    /// Values of one column
    ///
    /// # Errors
    /// Returns `UnknownDimension` if no such column exists
    pub fn values(&self, name: &str) -> CubeResult<Vec<DimValue>> {
        self.column(name)?.to_values()
    }

    /// File identifiers in row order
    #[must_use]
    pub fn filepaths(&self) -> Vec<String> {
        self.batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::StringArray>()
            .map(|paths| {
                paths
                    .iter()
                    .map(|p| p.unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Footprint polygons, if the inventory has a geometry column
    #[must_use]
    pub fn geometry(&self) -> Option<&[Option<Polygon<f64>>]> {
        self.geometry.as_deref()
    }

    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    /// Attach a footprint per row
    ///
    /// # Errors
    /// Returns `LengthMismatch` if there is not exactly one entry per row
    pub fn with_geometry(&self, geometry: Vec<Option<Polygon<f64>>>) -> CubeResult<Self> {
        if geometry.len() != self.len() {
            return Err(CubeError::LengthMismatch {
                expected: self.len(),
                found: geometry.len(),
            });
        }
        Ok(Self {
            batch: self.batch.clone(),
            geometry: Some(geometry.into()),
        })
    }

    /// Values of the given columns at one row, used as a row key
    pub(crate) fn row_key(columns: &[Column], row: usize) -> CubeResult<Vec<DimValue>> {
        columns.iter().map(|c| c.get(row)).collect()
    }

    // ========================================================================
    // Row selection
    // ========================================================================

    /// Select rows by index, in the given order; indices may repeat
    ///
    /// # Errors
    /// Returns error if any index is out of bounds
    pub fn take(&self, indices: &[usize]) -> CubeResult<Self> {
        let len = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(CubeError::OutOfBounds { index, length: len });
        }

        let idx = UInt32Array::from(
            indices
                .iter()
                .map(|&i| u32::try_from(i).map_err(|_| CubeError::OutOfBounds { index: i, length: len }))
                .collect::<CubeResult<Vec<u32>>>()?,
        );
        let arrays = self
            .batch
            .columns()
            .iter()
            .map(|array| take(array, &idx, None))
            .collect::<Result<Vec<_>, _>>()?;
        let batch = RecordBatch::try_new(self.batch.schema(), arrays)?;

        let geometry = self
            .geometry
            .as_ref()
            .map(|g| indices.iter().map(|&i| g[i].clone()).collect());

        Ok(Self { batch, geometry })
    }

    /// An inventory with the same columns and no rows
    ///
    /// # Errors
    /// Returns error if the empty batch cannot be built
    pub fn empty_like(&self) -> CubeResult<Self> {
        self.take(&[])
    }

    /// Remove duplicate rows, keeping first occurrences in order.
    ///
    /// Rows are compared on `filepath` and every dimension; footprints are
    /// derived from the file and are not compared.
    ///
    /// # Errors
    /// Returns error if a column cannot be read
    pub fn distinct(&self) -> CubeResult<Self> {
        if self.is_empty() {
            return Ok(self.clone());
        }

        let mut columns = vec![self.column(FILEPATH)?];
        columns.extend(self.dimension_columns());

        let mut seen: HashSet<Vec<DimValue>> = HashSet::new();
        let mut unique_indices = Vec::new();
        for row in 0..self.len() {
            if seen.insert(Self::row_key(&columns, row)?) {
                unique_indices.push(row);
            }
        }

        if unique_indices.len() == self.len() {
            return Ok(self.clone());
        }
        self.take(&unique_indices)
    }

    /// Sort rows by one dimension, nulls last. Ties keep their row order.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn sort_by(&self, name: &str, ascending: bool) -> CubeResult<Self> {
        let column = self.column(name)?;
        if self.is_empty() || column.data_type() == &DataType::Null {
            return Ok(self.clone());
        }

        let rows = u32::try_from(self.len()).map_err(|_| CubeError::OutOfBounds {
            index: self.len(),
            length: u32::MAX as usize,
        })?;
        let row_numbers: ArrayRef = Arc::new(UInt32Array::from_iter_values(0..rows));
        let sort_columns = vec![
            SortColumn {
                values: column.array().clone(),
                options: Some(SortOptions {
                    descending: !ascending,
                    nulls_first: false,
                }),
            },
            SortColumn {
                values: row_numbers,
                options: None,
            },
        ];

        let indices: UInt32Array = lexsort_to_indices(&sort_columns, None)?;
        let order: Vec<usize> = indices.values().iter().map(|&i| i as usize).collect();
        self.take(&order)
    }

    // ========================================================================
    // Column operations
    // ========================================================================

    /// Append a dimension column
    ///
    /// # Errors
    /// Returns `DimensionCollision` if the name exists and `LengthMismatch`
    /// if the column does not have one value per row
    pub fn with_column(&self, column: Column) -> CubeResult<Self> {
        if column.name() == FILEPATH || self.has_dimension(column.name()) {
            return Err(CubeError::DimensionCollision(column.name().to_string()));
        }
        if column.len() != self.len() {
            return Err(CubeError::LengthMismatch {
                expected: self.len(),
                found: column.len(),
            });
        }
        let mut columns = self.all_columns();
        columns.push(column);
        Self::from_parts(columns, self.geometry.clone())
    }

    /// Replace an existing dimension column, keeping its position
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist and
    /// `LengthMismatch` if the column does not have one value per row
    pub fn replace_column(&self, column: Column) -> CubeResult<Self> {
        if !self.has_dimension(column.name()) {
            return Err(CubeError::UnknownDimension(column.name().to_string()));
        }
        let columns = self
            .all_columns()
            .into_iter()
            .map(|c| {
                if c.name() == column.name() {
                    column.clone()
                } else {
                    c
                }
            })
            .collect();
        Self::from_parts(columns, self.geometry.clone())
    }

    /// Rename dimensions. Every rename is checked before any is applied.
    ///
    /// # Errors
    /// Returns `UnknownDimension` for a missing source name and
    /// `DimensionCollision` if a target name is already used
    pub fn rename(&self, mapping: &[(&str, &str)]) -> CubeResult<Self> {
        let current = self.dimension_names();
        for (from, _) in mapping {
            if !current.iter().any(|d| d == from) {
                return Err(CubeError::UnknownDimension((*from).to_string()));
            }
        }

        let renamed: Vec<String> = current
            .iter()
            .map(|name| {
                mapping
                    .iter()
                    .find(|(from, _)| from == name)
                    .map_or_else(|| name.clone(), |(_, to)| (*to).to_string())
            })
            .collect();
        let mut seen = HashSet::new();
        for name in &renamed {
            if name == FILEPATH || name == GEOMETRY || !seen.insert(name) {
                return Err(CubeError::DimensionCollision(name.clone()));
            }
        }

        let mut columns = vec![self.column(FILEPATH)?];
        columns.extend(
            self.dimension_columns()
                .into_iter()
                .zip(renamed)
                .map(|(col, name)| col.rename(name)),
        );
        Self::from_parts(columns, self.geometry.clone())
    }

    /// Keep only the given dimensions, in the given order
    ///
    /// # Errors
    /// Returns `UnknownDimension` if a name does not exist
    pub fn select_dimensions(&self, names: &[&str]) -> CubeResult<Self> {
        let mut columns = vec![self.column(FILEPATH)?];
        for name in names {
            if !self.has_dimension(name) {
                return Err(CubeError::UnknownDimension((*name).to_string()));
            }
            columns.push(self.column(name)?);
        }
        Self::from_parts(columns, self.geometry.clone())
    }

    fn all_columns(&self) -> Vec<Column> {
        let schema = self.batch.schema();
        schema
            .fields()
            .iter()
            .zip(self.batch.columns())
            .map(|(field, array)| Column::new(field.name(), array.clone()))
            .collect()
    }

    // ========================================================================
    // Concatenation
    // ========================================================================

    /// Concatenate inventories vertically.
    ///
    /// The result carries the union of all dimensions in first-seen order;
    /// rows from an inventory lacking a dimension get nulls. Geometry is kept
    /// if any part has it.
    ///
    /// # Errors
    /// Returns error if one dimension holds incompatible types across parts
    pub fn concat(parts: &[&Inventory]) -> CubeResult<Self> {
        let Some(first) = parts.first() else {
            let no_files: [&str; 0] = [];
            return Self::from_filepaths(&no_files);
        };

        let geometry = if parts.iter().any(|p| p.has_geometry()) {
            let polygons: Vec<Option<Polygon<f64>>> = parts
                .iter()
                .flat_map(|p| match p.geometry() {
                    Some(g) => g.to_vec(),
                    None => vec![None; p.len()],
                })
                .collect();
            Some(Geometry::from(polygons))
        } else {
            None
        };

        // Fast path: identical schemas concatenate buffer-wise
        let schema = first.batch.schema();
        if parts.iter().all(|p| p.batch.schema() == schema) {
            let batch = concat_batches(&schema, parts.iter().map(|p| &p.batch))?;
            return Ok(Self { batch, geometry });
        }

        let mut names: Vec<String> = vec![FILEPATH.to_string()];
        for part in parts {
            for name in part.dimension_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let mut values = Vec::new();
            for part in parts {
                if part.batch.schema().index_of(name).is_ok() {
                    values.extend(part.values(name)?);
                } else {
                    values.extend(std::iter::repeat(DimValue::Null).take(part.len()));
                }
            }
            columns.push(Column::from_values(name.as_str(), &values)?);
        }

        Self::from_parts(columns, geometry)
    }

    // ========================================================================
    // Display
    // ========================================================================

    /// Pretty print the inventory as a table
    #[must_use]
    pub fn to_pretty_string(&self, max_rows: usize) -> String {
        use arrow::util::pretty::pretty_format_batches;

        let shown = self.batch.slice(0, max_rows.min(self.len()));
        match pretty_format_batches(&[shown]) {
            Ok(table) => {
                let total = self.len();
                let geometry = if self.has_geometry() { " (with geometry)" } else { "" };
                if total > max_rows {
                    format!("{table}\n... showing {max_rows} of {total} files{geometry}")
                } else {
                    format!("{table}\n{total} files{geometry}")
                }
            }
            Err(e) => format!("Error formatting: {e}"),
        }
    }
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("rows", &self.len())
            .field("dimensions", &self.dimension_names())
            .field("geometry", &self.has_geometry())
            .finish()
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pretty_string(20))
    }
}

impl PartialEq for Inventory {
    fn eq(&self, other: &Self) -> bool {
        self.batch == other.batch && self.geometry() == other.geometry()
    }
}
