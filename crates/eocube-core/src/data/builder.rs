//! Inventory construction from file identifiers

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};

use super::column::Column;
use super::error::CubeResult;
use super::inventory::{Inventory, FILEPATH, GEOMETRY};
use super::value::DimValue;
use crate::collab::Translator;

/// Builds an [`Inventory`] by translating file names into dimension values.
///
/// Files the translator rejects stay in the inventory with null dimensions.
#[derive(Default)]
pub struct InventoryBuilder<'a> {
    translator: Option<&'a dyn Translator>,
    dimensions: Option<Vec<String>>,
}

impl<'a> InventoryBuilder<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translator applied to the basename of every file
    #[must_use]
    pub fn translator(mut self, translator: &'a dyn Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Restrict dimensions to this list; other translated keys are discarded
    #[must_use]
    pub fn dimensions(mut self, names: &[&str]) -> Self {
        self.dimensions = Some(names.iter().map(|n| (*n).to_string()).collect());
        self
    }

    /// Build the inventory.
    ///
    /// Without a dimension list the dimensions are every key seen in any
    /// translation, in first-seen order following the translator's field
    /// order. With a list, they are the listed names that at least one file
    /// produced, in list order. A key repeated within one file keeps its
    /// last value.
    ///
    /// # Errors
    /// Returns `TypeMismatch` if one dimension receives values of different
    /// kinds from different files
    pub fn build(&self, filepaths: &[impl AsRef<str>]) -> CubeResult<Inventory> {
        let Some(translator) = self.translator else {
            info!("built inventory of {} files without translator", filepaths.len());
            return Inventory::from_filepaths(filepaths);
        };

        let mut rows: Vec<Option<HashMap<String, DimValue>>> = Vec::with_capacity(filepaths.len());
        let mut seen_order: Vec<String> = Vec::new();
        let mut failures = 0usize;

        for filepath in filepaths {
            let filepath = filepath.as_ref();
            match translator.translate(basename(filepath)) {
                Ok(fields) => {
                    let mut row = HashMap::with_capacity(fields.len());
                    for (key, value) in fields {
                        if !self.keeps(&key) {
                            continue;
                        }
                        if !seen_order.contains(&key) {
                            seen_order.push(key.clone());
                        }
                        row.insert(key, value);
                    }
                    rows.push(Some(row));
                }
                Err(e) => {
                    debug!("could not translate '{filepath}': {e}");
                    failures += 1;
                    rows.push(None);
                }
            }
        }

        let names: Vec<String> = match &self.dimensions {
            Some(requested) => requested
                .iter()
                .filter(|name| seen_order.contains(*name))
                .cloned()
                .collect(),
            None => seen_order,
        };

        let columns = names
            .iter()
            .map(|name| {
                let values: Vec<DimValue> = rows
                    .iter()
                    .map(|row| {
                        row.as_ref()
                            .and_then(|fields| fields.get(name))
                            .cloned()
                            .unwrap_or(DimValue::Null)
                    })
                    .collect();
                Column::from_values(name.as_str(), &values)
            })
            .collect::<CubeResult<Vec<_>>>()?;

        info!(
            "built inventory of {} files with dimensions {:?} ({} untranslatable)",
            filepaths.len(),
            names,
            failures
        );
        Inventory::from_columns(filepaths, columns, None)
    }

    fn keeps(&self, key: &str) -> bool {
        if key == FILEPATH || key == GEOMETRY {
            return false;
        }
        self.dimensions
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == key))
    }
}

/// Final path component, or the whole identifier if it has none
pub(crate) fn basename(filepath: &str) -> &str {
    Path::new(filepath)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filepath)
}
