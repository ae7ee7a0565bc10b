//! Yearly and monthly splitting of a time dimension
//!
//! Each period becomes a closed range between the earliest and latest
//! timestamp observed in it, and the ranges are handed to [`Inventory::split`].
//! Periods are always visited in ascending order; requested periods without
//! data produce no part.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::error::{CubeError, CubeResult};
use super::inventory::Inventory;
use super::predicate::Predicate;
use super::value::DimValue;

impl Inventory {
    /// Split into one inventory per calendar year.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist and
    /// `TypeMismatch` if it does not hold timestamps
    pub fn split_yearly(&self, name: &str, years: Option<&[i32]>) -> CubeResult<Vec<Self>> {
        let ranges = self.observed_ranges(name, |t| DimValue::Time(t).year(), years)?;
        self.split(name, &ranges)
    }

    /// Split into one inventory per (year, month) with data.
    ///
    /// `months` restricts the months considered in every year.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist and
    /// `TypeMismatch` if it does not hold timestamps
    pub fn split_monthly(
        &self,
        name: &str,
        months: Option<&[u32]>,
        years: Option<&[i32]>,
    ) -> CubeResult<Vec<Self>> {
        let mut parts = Vec::new();
        for yearly in self.split_yearly(name, years)? {
            let ranges = yearly.observed_ranges(name, |t| DimValue::Time(t).month(), months)?;
            parts.extend(yearly.split(name, &ranges)?);
        }
        Ok(parts)
    }

    /// Closed `[min, max]` range per period, in ascending period order
    fn observed_ranges<K: Ord + Copy>(
        &self,
        name: &str,
        period: impl Fn(NaiveDateTime) -> Option<K>,
        wanted: Option<&[K]>,
    ) -> CubeResult<Vec<Predicate>> {
        if !self.has_dimension(name) {
            return Err(CubeError::UnknownDimension(name.to_string()));
        }
        let column = self.column(name)?;
        if !column.is_temporal() && !column.to_values()?.iter().all(DimValue::is_null) {
            return Err(CubeError::TypeMismatch {
                expected: format!("timestamps in dimension '{name}'"),
                found: format!("{:?}", column.data_type()),
            });
        }

        let mut bounds: BTreeMap<K, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
        for value in column.to_values()? {
            let Some(t) = value.as_time() else { continue };
            let Some(key) = period(t) else { continue };
            if wanted.is_some_and(|w| !w.contains(&key)) {
                continue;
            }
            bounds
                .entry(key)
                .and_modify(|(lo, hi)| {
                    *lo = (*lo).min(t);
                    *hi = (*hi).max(t);
                })
                .or_insert((t, t));
        }

        Ok(bounds
            .into_values()
            .map(|(lo, hi)| Predicate::range(lo, hi))
            .collect())
    }
}
