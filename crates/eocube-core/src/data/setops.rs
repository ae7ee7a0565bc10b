//! Operations across several inventories: match, align, intersect, merge
//! and unite.

use std::collections::{HashMap, HashSet};

use log::debug;

use super::column::Column;
use super::error::{CubeError, CubeResult};
use super::inventory::{Inventory, FILEPATH};
use super::predicate::Predicate;
use super::value::DimValue;

impl Inventory {
    fn require_dimension(&self, name: &str) -> CubeResult<()> {
        if self.has_dimension(name) {
            Ok(())
        } else {
            Err(CubeError::UnknownDimension(name.to_string()))
        }
    }

    /// Distinct non-null values of a dimension, in order of first occurrence
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn unique_values(&self, name: &str) -> CubeResult<Vec<DimValue>> {
        self.require_dimension(name)?;
        let mut seen = HashSet::new();
        Ok(self
            .values(name)?
            .into_iter()
            .filter(|v| !v.is_null() && seen.insert(v.clone()))
            .collect())
    }

    /// Keep rows whose value of `name` is in `values`, preserving row order
    fn retain_values(&self, name: &str, values: &HashSet<DimValue>) -> CubeResult<Self> {
        let indices: Vec<usize> = self
            .values(name)?
            .iter()
            .enumerate()
            .filter_map(|(i, v)| values.contains(v).then_some(i))
            .collect();
        self.take(&indices)
    }

    /// Conform rows to `other` along one dimension.
    ///
    /// The result has one row per row of `other`, in `other`'s order, and
    /// its `name` column equals `other`'s. The k-th occurrence of a value
    /// takes this inventory's rows with that value in turn, cycling when
    /// `other` has more. A value this inventory lacks copies the row with
    /// the nearest value (first row if values have no distance) and takes
    /// over the new value.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if either side lacks the dimension
    pub fn align(&self, other: &Inventory, name: &str) -> CubeResult<Self> {
        self.require_dimension(name)?;
        other.require_dimension(name)?;
        if self.is_empty() {
            return self.empty_like();
        }

        let own = self.values(name)?;
        let target = other.values(name)?;

        let mut rows_by_value: HashMap<&DimValue, Vec<usize>> = HashMap::new();
        for (i, v) in own.iter().enumerate() {
            rows_by_value.entry(v).or_default().push(i);
        }

        let mut taken: HashMap<&DimValue, usize> = HashMap::new();
        let mut indices = Vec::with_capacity(target.len());
        let mut synthesized = 0usize;
        for value in &target {
            let index = match rows_by_value.get(value) {
                Some(rows) => {
                    let k = taken.entry(value).or_insert(0);
                    let index = rows[*k % rows.len()];
                    *k += 1;
                    index
                }
                None => {
                    synthesized += 1;
                    nearest_row(&own, value)
                }
            };
            indices.push(index);
        }
        debug!(
            "aligned '{name}': {} rows from {}, {synthesized} synthesized",
            indices.len(),
            self.len()
        );

        let aligned = self.take(&indices)?;
        if synthesized == 0 {
            return Ok(aligned);
        }
        let column = Column::from_values(name, &target)?;
        aligned.replace_column(column)
    }

    /// Rows of this inventory that also occur in `other`.
    ///
    /// With `on`, only that dimension has to match: the first row of this
    /// inventory for each non-null value of `on` that `other` also holds is
    /// kept, whatever the files on either side. Without `on`, rows are keyed
    /// by `filepath` and every shared dimension and each key appears once.
    /// Only shared dimensions are kept, so the result is never longer than
    /// either input.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if either side lacks `on`
    pub fn intersect(&self, other: &Inventory, on: Option<&str>) -> CubeResult<Self> {
        let other_dims = other.dimension_names();
        let shared: Vec<String> = self
            .dimension_names()
            .into_iter()
            .filter(|d| other_dims.contains(d))
            .collect();

        let indices = match on {
            Some(name) => self.first_rows_matching(other, name)?,
            None => {
                let key_names: Vec<&str> = std::iter::once(FILEPATH)
                    .chain(shared.iter().map(String::as_str))
                    .collect();
                self.rows_matching_keys(other, &key_names)?
            }
        };
        debug!(
            "intersected {} rows with {} on {on:?}: {} kept",
            self.len(),
            other.len(),
            indices.len()
        );

        let shared: Vec<&str> = shared.iter().map(String::as_str).collect();
        self.take(&indices)?.select_dimensions(&shared)
    }

    /// First row per non-null value of `name` that `other` also holds
    fn first_rows_matching(&self, other: &Inventory, name: &str) -> CubeResult<Vec<usize>> {
        self.require_dimension(name)?;
        other.require_dimension(name)?;
        let wanted: HashSet<DimValue> = other.unique_values(name)?.into_iter().collect();

        let mut seen = HashSet::new();
        Ok(self
            .values(name)?
            .into_iter()
            .enumerate()
            .filter_map(|(row, value)| {
                (wanted.contains(&value) && seen.insert(value)).then_some(row)
            })
            .collect())
    }

    /// Rows whose key over `key_names` occurs in `other`, each key once
    fn rows_matching_keys(&self, other: &Inventory, key_names: &[&str]) -> CubeResult<Vec<usize>> {
        let key_columns = |inv: &Inventory| -> CubeResult<Vec<Column>> {
            key_names.iter().map(|n| inv.column(n)).collect()
        };
        let other_columns = key_columns(other)?;
        let other_keys = (0..other.len())
            .map(|row| Self::row_key(&other_columns, row))
            .collect::<CubeResult<HashSet<_>>>()?;

        let own_columns = key_columns(self)?;
        let mut seen = HashSet::new();
        let mut indices = Vec::new();
        for row in 0..self.len() {
            let key = Self::row_key(&own_columns, row)?;
            if other_keys.contains(&key) && seen.insert(key) {
                indices.push(row);
            }
        }
        Ok(indices)
    }

    /// Combine inventories keeping only the dimensions all of them share.
    ///
    /// Duplicate rows are removed. With `name`, only rows whose `name` value
    /// occurs in every input are kept.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if `name` is not shared by all inputs
    pub fn merge(parts: &[&Inventory], name: Option<&str>) -> CubeResult<Self> {
        let Some(first) = parts.first() else {
            return Inventory::concat(&[]);
        };
        let common: Vec<String> = first
            .dimension_names()
            .into_iter()
            .filter(|d| parts.iter().all(|p| p.has_dimension(d)))
            .collect();
        let common: Vec<&str> = common.iter().map(String::as_str).collect();

        let projected = parts
            .iter()
            .map(|p| p.select_dimensions(&common))
            .collect::<CubeResult<Vec<_>>>()?;
        Self::combine(&projected, name)
    }

    /// Combine inventories keeping the union of their dimensions.
    ///
    /// Rows from an input lacking a dimension get nulls there. Duplicate
    /// rows are removed. With `name`, only rows whose `name` value occurs in
    /// every input are kept.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if `name` is missing from any input, or a
    /// type error if a dimension holds incompatible types across inputs
    pub fn unite(parts: &[&Inventory], name: Option<&str>) -> CubeResult<Self> {
        let owned: Vec<Inventory> = parts.iter().map(|p| (*p).clone()).collect();
        Self::combine(&owned, name)
    }

    fn combine(parts: &[Inventory], name: Option<&str>) -> CubeResult<Self> {
        let joined: Vec<Inventory> = match name {
            Some(name) => {
                let refs: Vec<&Inventory> = parts.iter().collect();
                let common: HashSet<DimValue> = common_values(&refs, name)?.into_iter().collect();
                parts
                    .iter()
                    .map(|p| p.retain_values(name, &common))
                    .collect::<CubeResult<Vec<_>>>()?
            }
            None => parts.to_vec(),
        };
        let refs: Vec<&Inventory> = joined.iter().collect();
        let combined = Inventory::concat(&refs)?.distinct()?;
        debug!(
            "combined {} inventories into {} rows with dimensions {:?}",
            parts.len(),
            combined.len(),
            combined.dimension_names()
        );
        Ok(combined)
    }
}

/// Values of `name` present in every inventory, ordered by first occurrence
/// in the first one.
///
/// This is the intersection of the value sets, not their union: a value
/// missing from any inventory is left out, which is what gives every
/// inventory passed to [`match_dimension`] the same value set afterwards.
///
/// # Errors
/// Returns `UnknownDimension` if any inventory lacks the dimension
pub fn common_values(parts: &[&Inventory], name: &str) -> CubeResult<Vec<DimValue>> {
    let Some(first) = parts.first() else {
        return Ok(Vec::new());
    };
    let mut others = Vec::with_capacity(parts.len().saturating_sub(1));
    for part in &parts[1..] {
        others.push(part.unique_values(name)?.into_iter().collect::<HashSet<_>>());
    }
    Ok(first
        .unique_values(name)?
        .into_iter()
        .filter(|v| others.iter().all(|set| set.contains(v)))
        .collect())
}

/// Restrict every inventory to the values of `name` they all share.
///
/// Unlike a union over all inputs, values only some inventories hold are
/// removed everywhere; see [`common_values`].
///
/// Each inventory is filtered with one equality predicate per shared value,
/// so rows come out grouped by value.
///
/// # Errors
/// Returns `UnknownDimension` if any inventory lacks the dimension
pub fn match_dimension(parts: &[&Inventory], name: &str) -> CubeResult<Vec<Inventory>> {
    let predicates: Vec<Predicate> = common_values(parts, name)?
        .into_iter()
        .map(Predicate::equals)
        .collect();
    parts.iter().map(|p| p.filter(name, &predicates)).collect()
}

/// Row whose value is closest to `target`; the first row when no value has
/// a distance to it
fn nearest_row(values: &[DimValue], target: &DimValue) -> usize {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.distance(target).map(|d| (i, d)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}
