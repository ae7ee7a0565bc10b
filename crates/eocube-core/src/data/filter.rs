//! Predicate filtering and splitting of inventories

use log::debug;
use regex::Regex;

use super::error::{CubeError, CubeResult};
use super::inventory::{Inventory, FILEPATH};
use super::predicate::Predicate;
use crate::data::builder::basename;

impl Inventory {
    /// Row indices selected by each predicate on one dimension.
    ///
    /// Every predicate is evaluated before anything is returned, so a bad
    /// predicate fails the whole call.
    fn select_per_predicate(&self, name: &str, predicates: &[Predicate]) -> CubeResult<Vec<Vec<usize>>> {
        if !self.has_dimension(name) {
            return Err(CubeError::UnknownDimension(name.to_string()));
        }
        let column = self.column(name)?;
        predicates.iter().map(|p| p.select(&column)).collect()
    }

    /// Apply each predicate independently and concatenate the selections.
    ///
    /// Selections keep row order and are appended in predicate order. Rows
    /// matched by several predicates appear once per match.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist, or a type
    /// error if a predicate value does not fit the column
    pub fn filter(&self, name: &str, predicates: &[Predicate]) -> CubeResult<Self> {
        let selections = self.select_per_predicate(name, predicates)?;
        let indices: Vec<usize> = selections.into_iter().flatten().collect();
        debug!(
            "filter on '{name}' with {} predicates kept {} of {} rows",
            predicates.len(),
            indices.len(),
            self.len()
        );
        self.take(&indices)
    }

    /// Apply each predicate independently, one inventory per predicate.
    ///
    /// Empty selections yield empty inventories; the output always has one
    /// entry per predicate, in predicate order.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist, or a type
    /// error if a predicate value does not fit the column
    pub fn split(&self, name: &str, predicates: &[Predicate]) -> CubeResult<Vec<Self>> {
        let selections = self.select_per_predicate(name, predicates)?;
        debug!(
            "split on '{name}' into {} parts of sizes {:?}",
            selections.len(),
            selections.iter().map(Vec::len).collect::<Vec<_>>()
        );
        selections.iter().map(|indices| self.take(indices)).collect()
    }

    /// Keep rows whose file name matches `pattern` at its start.
    ///
    /// With `full_path` the whole identifier is matched instead of the
    /// basename.
    ///
    /// # Errors
    /// Returns `InvalidPattern` if the pattern does not compile
    pub fn filter_by_pattern(&self, pattern: &str, full_path: bool) -> CubeResult<Self> {
        let anchored = Regex::new(&format!("^(?:{pattern})"))?;
        let indices: Vec<usize> = self
            .filepaths()
            .iter()
            .enumerate()
            .filter_map(|(i, path)| {
                let subject = if full_path { path.as_str() } else { basename(path) };
                anchored.is_match(subject).then_some(i)
            })
            .collect();
        debug!(
            "pattern '{pattern}' on {} kept {} of {} rows",
            if full_path { FILEPATH } else { "basename" },
            indices.len(),
            self.len()
        );
        self.take(&indices)
    }
}
