//! DataCube: a file inventory together with the collaborators that produced it
//!
//! Every transforming operation comes in two forms: `op(&self)` returns a new
//! cube and leaves the original untouched, `op_in_place(&mut self)` replaces
//! the inventory. In-place forms compute the complete new inventory before
//! swapping it in, so a failing call leaves the cube unchanged.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use super::builder::InventoryBuilder;
use super::column::Column;
use super::error::{CubeError, CubeResult};
use super::inventory::Inventory;
use super::predicate::{predicates_from_parts, FilterExpr, FilterValue, Predicate};
use super::setops;
use super::value::DimValue;
use crate::collab::{
    BoundaryExtractor, Collaborators, DirTree, Grid, MetadataReader, Reprojector, Translator,
};
use crate::config::CubeConfig;
use crate::spatial::{intersecting_rows, Roi, SpatialRef};

/// A virtual data cube over a collection of raster files
///
/// Rows are files, dimensions are the values their names (or a precomputed
/// table) assign them. Clones share immutable Arrow buffers and the
/// stateless collaborators; nothing a clone does is visible to the original.
#[derive(Clone)]
pub struct DataCube {
    inventory: Inventory,
    grid: Option<Arc<dyn Grid>>,
    dir_tree: Option<Arc<dyn DirTree>>,
    spatial_ref: Option<SpatialRef>,
    collaborators: Collaborators,
    config: Arc<CubeConfig>,
}

impl DataCube {
    /// Start building a cube
    #[must_use]
    pub fn builder() -> DataCubeBuilder {
        DataCubeBuilder::new()
    }

    /// Wrap a precomputed inventory without any collaborators
    #[must_use]
    pub fn from_inventory(inventory: Inventory) -> Self {
        DataCubeBuilder::new().build_from_inventory(inventory)
    }

    /// A cube sharing this cube's context but holding another inventory
    fn derive(&self, inventory: Inventory) -> Self {
        Self {
            inventory,
            grid: self.grid.clone(),
            dir_tree: self.dir_tree.clone(),
            spatial_ref: self.spatial_ref.clone(),
            collaborators: self.collaborators.clone(),
            config: Arc::clone(&self.config),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Consume the cube, returning its inventory
    #[must_use]
    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }

    /// Dimension names, always in step with the inventory's columns
    #[must_use]
    pub fn dimensions(&self) -> Vec<String> {
        self.inventory.dimension_names()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inventory.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inventory.is_empty()
    }

    #[must_use]
    pub fn filepaths(&self) -> Vec<String> {
        self.inventory.filepaths()
    }

    /// Values of one dimension
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn values(&self, name: &str) -> CubeResult<Vec<DimValue>> {
        if !self.inventory.has_dimension(name) {
            return Err(CubeError::UnknownDimension(name.to_string()));
        }
        self.inventory.values(name)
    }

    #[must_use]
    pub fn config(&self) -> &CubeConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> Option<&dyn Grid> {
        self.grid.as_deref()
    }

    #[must_use]
    pub fn dir_tree(&self) -> Option<&dyn DirTree> {
        self.dir_tree.as_deref()
    }

    /// Reference frame of the cube: the explicit one, else the grid's
    #[must_use]
    pub fn spatial_ref(&self) -> Option<SpatialRef> {
        self.spatial_ref
            .clone()
            .or_else(|| self.grid.as_ref().and_then(|g| g.spatial_ref()))
    }

    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    // ========================================================================
    // Dimension management
    // ========================================================================

    /// Rename dimensions given as `(from, to)` pairs
    ///
    /// # Errors
    /// Returns `UnknownDimension` for a missing source name and
    /// `DimensionCollision` if a target name is already in use
    pub fn rename_dimensions(&self, mapping: &[(&str, &str)]) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.rename(mapping)?))
    }

    /// In-place form of [`DataCube::rename_dimensions`]
    ///
    /// # Errors
    /// See [`DataCube::rename_dimensions`]
    pub fn rename_dimensions_in_place(&mut self, mapping: &[(&str, &str)]) -> CubeResult<()> {
        self.inventory = self.inventory.rename(mapping)?;
        Ok(())
    }

    /// Append a dimension with one value per file
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `values` does not have one entry per row
    /// and `DimensionCollision` if the name is taken
    pub fn add_dimension(&self, name: &str, values: &[DimValue]) -> CubeResult<Self> {
        Ok(self.derive(self.with_dimension(name, values)?))
    }

    /// In-place form of [`DataCube::add_dimension`]
    ///
    /// # Errors
    /// See [`DataCube::add_dimension`]
    pub fn add_dimension_in_place(&mut self, name: &str, values: &[DimValue]) -> CubeResult<()> {
        self.inventory = self.with_dimension(name, values)?;
        Ok(())
    }

    fn with_dimension(&self, name: &str, values: &[DimValue]) -> CubeResult<Inventory> {
        if values.len() != self.len() {
            return Err(CubeError::LengthMismatch {
                expected: self.len(),
                found: values.len(),
            });
        }
        self.inventory.with_column(Column::from_values(name, values)?)
    }

    /// Sort files by one dimension, nulls last
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn sort_by_dimension(&self, name: &str, ascending: bool) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.sort_by(name, ascending)?))
    }

    /// In-place form of [`DataCube::sort_by_dimension`]
    ///
    /// # Errors
    /// See [`DataCube::sort_by_dimension`]
    pub fn sort_by_dimension_in_place(&mut self, name: &str, ascending: bool) -> CubeResult<()> {
        self.inventory = self.inventory.sort_by(name, ascending)?;
        Ok(())
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    /// Keep files whose name matches a regular expression at its start
    ///
    /// # Errors
    /// Returns `InvalidPattern` if the pattern does not compile
    pub fn filter_files_with_pattern(&self, pattern: &str, full_path: bool) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.filter_by_pattern(pattern, full_path)?))
    }

    /// In-place form of [`DataCube::filter_files_with_pattern`]
    ///
    /// # Errors
    /// See [`DataCube::filter_files_with_pattern`]
    pub fn filter_files_with_pattern_in_place(
        &mut self,
        pattern: &str,
        full_path: bool,
    ) -> CubeResult<()> {
        self.inventory = self.inventory.filter_by_pattern(pattern, full_path)?;
        Ok(())
    }

    /// Filter one dimension with value/expression pairs.
    ///
    /// Every pair is applied on its own and the selections are concatenated
    /// in order; files matched by several pairs appear several times.
    /// Without expressions each value is compared with `==`.
    ///
    /// # Errors
    /// Returns `PredicateCount`/`PredicateShape` for malformed pairs,
    /// `UnknownDimension` if the dimension does not exist
    pub fn filter_by_dimension(
        &self,
        name: &str,
        values: Vec<FilterValue>,
        expressions: Option<Vec<FilterExpr>>,
    ) -> CubeResult<Self> {
        let predicates = predicates_from_parts(values, expressions)?;
        self.filter_by_predicates(name, &predicates)
    }

    /// In-place form of [`DataCube::filter_by_dimension`]
    ///
    /// # Errors
    /// See [`DataCube::filter_by_dimension`]
    pub fn filter_by_dimension_in_place(
        &mut self,
        name: &str,
        values: Vec<FilterValue>,
        expressions: Option<Vec<FilterExpr>>,
    ) -> CubeResult<()> {
        let predicates = predicates_from_parts(values, expressions)?;
        self.filter_by_predicates_in_place(name, &predicates)
    }

    /// Filter one dimension with typed predicates, concatenating selections
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn filter_by_predicates(&self, name: &str, predicates: &[Predicate]) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.filter(name, predicates)?))
    }

    /// In-place form of [`DataCube::filter_by_predicates`]
    ///
    /// # Errors
    /// See [`DataCube::filter_by_predicates`]
    pub fn filter_by_predicates_in_place(
        &mut self,
        name: &str,
        predicates: &[Predicate],
    ) -> CubeResult<()> {
        self.inventory = self.inventory.filter(name, predicates)?;
        Ok(())
    }

    /// One cube per value/expression pair, in input order; empty cubes are
    /// kept
    ///
    /// # Errors
    /// Returns `PredicateCount`/`PredicateShape` for malformed pairs,
    /// `UnknownDimension` if the dimension does not exist
    pub fn split_by_dimension(
        &self,
        name: &str,
        values: Vec<FilterValue>,
        expressions: Option<Vec<FilterExpr>>,
    ) -> CubeResult<Vec<Self>> {
        let predicates = predicates_from_parts(values, expressions)?;
        self.split_by_predicates(name, &predicates)
    }

    /// One cube per typed predicate
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist
    pub fn split_by_predicates(&self, name: &str, predicates: &[Predicate]) -> CubeResult<Vec<Self>> {
        Ok(self
            .inventory
            .split(name, predicates)?
            .into_iter()
            .map(|inventory| self.derive(inventory))
            .collect())
    }

    /// One cube per calendar year, ascending. `name` defaults to the
    /// configured time dimension.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist and
    /// `TypeMismatch` if it does not hold timestamps
    pub fn split_yearly(&self, name: Option<&str>, years: Option<&[i32]>) -> CubeResult<Vec<Self>> {
        let name = name.unwrap_or(&self.config.time_dimension);
        Ok(self
            .inventory
            .split_yearly(name, years)?
            .into_iter()
            .map(|inventory| self.derive(inventory))
            .collect())
    }

    /// One cube per (year, month) with data, ascending
    ///
    /// # Errors
    /// Returns `UnknownDimension` if the dimension does not exist and
    /// `TypeMismatch` if it does not hold timestamps
    pub fn split_monthly(
        &self,
        name: Option<&str>,
        months: Option<&[u32]>,
        years: Option<&[i32]>,
    ) -> CubeResult<Vec<Self>> {
        let name = name.unwrap_or(&self.config.time_dimension);
        Ok(self
            .inventory
            .split_monthly(name, months, years)?
            .into_iter()
            .map(|inventory| self.derive(inventory))
            .collect())
    }

    /// Keep files by tile name and/or footprint.
    ///
    /// Tile names are matched on the configured tile dimension. A region of
    /// interest is intersected with each file's footprint; when `sref`
    /// differs from the cube's reference the region is reprojected first.
    ///
    /// # Errors
    /// Returns `MissingGeometry` if a region is given but the cube has no
    /// footprints, `MissingCollaborator`/`Reprojection` if the region cannot
    /// be brought into the cube's frame
    pub fn filter_spatially(
        &self,
        tilenames: Option<&[&str]>,
        roi: Option<&Roi>,
        sref: Option<&SpatialRef>,
    ) -> CubeResult<Self> {
        Ok(self.derive(self.spatial_selection(tilenames, roi, sref)?))
    }

    /// In-place form of [`DataCube::filter_spatially`]
    ///
    /// # Errors
    /// See [`DataCube::filter_spatially`]
    pub fn filter_spatially_in_place(
        &mut self,
        tilenames: Option<&[&str]>,
        roi: Option<&Roi>,
        sref: Option<&SpatialRef>,
    ) -> CubeResult<()> {
        self.inventory = self.spatial_selection(tilenames, roi, sref)?;
        Ok(())
    }

    fn spatial_selection(
        &self,
        tilenames: Option<&[&str]>,
        roi: Option<&Roi>,
        sref: Option<&SpatialRef>,
    ) -> CubeResult<Inventory> {
        let mut inventory = self.inventory.clone();

        if let Some(names) = tilenames {
            let predicates: Vec<Predicate> = names.iter().map(|n| Predicate::equals(*n)).collect();
            inventory = inventory.filter(&self.config.tile_dimension, &predicates)?;
        }

        if let Some(roi) = roi {
            let polygon = self.roi_in_cube_frame(roi, sref)?;
            let geometry = inventory.geometry().ok_or(CubeError::MissingGeometry)?;
            let indices = intersecting_rows(geometry, &polygon);
            debug!(
                "region of interest intersects {} of {} files",
                indices.len(),
                inventory.len()
            );
            inventory = inventory.take(&indices)?;
        }

        Ok(inventory)
    }

    fn roi_in_cube_frame(
        &self,
        roi: &Roi,
        sref: Option<&SpatialRef>,
    ) -> CubeResult<geo::Polygon<f64>> {
        let polygon = roi.to_polygon();
        let (Some(from), Some(to)) = (sref, self.spatial_ref()) else {
            return Ok(polygon);
        };
        if *from == to {
            return Ok(polygon);
        }
        let reprojector = self
            .collaborators
            .reprojector
            .as_ref()
            .ok_or(CubeError::MissingCollaborator("reprojector"))?;
        reprojector
            .reproject(&polygon, from, &to)
            .map_err(|e| CubeError::Reprojection(format!("{from} -> {to}: {e}")))
    }

    /// Keep files whose header metadata contains every given key with the
    /// given value.
    ///
    /// Files are read one at a time. Unrecognized or unreadable files are
    /// dropped.
    ///
    /// # Errors
    /// Returns `MissingCollaborator` if the cube has no metadata reader
    pub fn filter_by_metadata(&self, metadata: &HashMap<String, DimValue>) -> CubeResult<Self> {
        Ok(self.derive(self.metadata_selection(metadata)?))
    }

    /// In-place form of [`DataCube::filter_by_metadata`]
    ///
    /// # Errors
    /// See [`DataCube::filter_by_metadata`]
    pub fn filter_by_metadata_in_place(
        &mut self,
        metadata: &HashMap<String, DimValue>,
    ) -> CubeResult<()> {
        self.inventory = self.metadata_selection(metadata)?;
        Ok(())
    }

    fn metadata_selection(&self, metadata: &HashMap<String, DimValue>) -> CubeResult<Inventory> {
        let reader = self
            .collaborators
            .metadata
            .as_ref()
            .ok_or(CubeError::MissingCollaborator("metadata reader"))?;

        let mut indices = Vec::new();
        for (row, filepath) in self.filepaths().iter().enumerate() {
            let Some(file_type) = self.config.file_type(filepath) else {
                debug!("skipping '{filepath}': unrecognized file type");
                continue;
            };
            let Some(header) = reader.metadata(filepath, file_type) else {
                warn!("could not read metadata of '{filepath}'");
                continue;
            };
            if metadata.iter().all(|(key, value)| header.get(key) == Some(value)) {
                indices.push(row);
            }
        }
        debug!(
            "metadata filter kept {} of {} files",
            indices.len(),
            self.len()
        );
        self.inventory.take(&indices)
    }

    // ========================================================================
    // Cross-cube operations
    // ========================================================================

    /// Conform this cube's files to `other` along one dimension
    ///
    /// # Errors
    /// Returns `UnknownDimension` if either cube lacks the dimension
    pub fn align_dimension(&self, other: &DataCube, name: &str) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.align(&other.inventory, name)?))
    }

    /// In-place form of [`DataCube::align_dimension`]
    ///
    /// # Errors
    /// See [`DataCube::align_dimension`]
    pub fn align_dimension_in_place(&mut self, other: &DataCube, name: &str) -> CubeResult<()> {
        self.inventory = self.inventory.align(&other.inventory, name)?;
        Ok(())
    }

    /// Rows of this cube that `other` also holds. With `on_dimension`, one
    /// row per value of that dimension found in both cubes, whatever their
    /// files; without it, files present in both with equal shared
    /// dimensions. Only shared dimensions are kept. An empty result is valid.
    ///
    /// # Errors
    /// Returns `UnknownDimension` if either cube lacks `on_dimension`
    pub fn intersect(&self, other: &DataCube, on_dimension: Option<&str>) -> CubeResult<Self> {
        Ok(self.derive(self.inventory.intersect(&other.inventory, on_dimension)?))
    }

    /// In-place form of [`DataCube::intersect`]
    ///
    /// # Errors
    /// See [`DataCube::intersect`]
    pub fn intersect_in_place(
        &mut self,
        other: &DataCube,
        on_dimension: Option<&str>,
    ) -> CubeResult<()> {
        self.inventory = self.inventory.intersect(&other.inventory, on_dimension)?;
        Ok(())
    }
}

/// Restrict every cube to the values of `name` present in all of them.
///
/// Values found in only some of the cubes are dropped rather than kept as a
/// union, so every returned cube holds the same set of values.
/// Returns one cube per input, in input order.
///
/// # Errors
/// Returns `UnknownDimension` if any cube lacks the dimension
pub fn match_dimension(cubes: &[&DataCube], name: &str) -> CubeResult<Vec<DataCube>> {
    let inventories: Vec<&Inventory> = cubes.iter().map(|c| &c.inventory).collect();
    Ok(setops::match_dimension(&inventories, name)?
        .into_iter()
        .zip(cubes)
        .map(|(inventory, cube)| cube.derive(inventory))
        .collect())
}

/// Combine cubes keeping only their common dimensions, without duplicate
/// rows. The result takes its context from the first cube.
///
/// # Errors
/// Returns `UnknownDimension` if `name` is not shared by all cubes
pub fn merge(cubes: &[&DataCube], name: Option<&str>) -> CubeResult<DataCube> {
    let inventories: Vec<&Inventory> = cubes.iter().map(|c| &c.inventory).collect();
    let merged = Inventory::merge(&inventories, name)?;
    Ok(match cubes.first() {
        Some(first) => first.derive(merged),
        None => DataCube::from_inventory(merged),
    })
}

/// Combine cubes keeping the union of their dimensions, without duplicate
/// rows. The result takes its context from the first cube.
///
/// # Errors
/// Returns `UnknownDimension` if `name` is missing from any cube
pub fn unite(cubes: &[&DataCube], name: Option<&str>) -> CubeResult<DataCube> {
    let inventories: Vec<&Inventory> = cubes.iter().map(|c| &c.inventory).collect();
    let united = Inventory::unite(&inventories, name)?;
    Ok(match cubes.first() {
        Some(first) => first.derive(united),
        None => DataCube::from_inventory(united),
    })
}

impl fmt::Debug for DataCube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCube")
            .field("files", &self.len())
            .field("dimensions", &self.dimensions())
            .field("grid", &self.grid.as_ref().map(|g| g.name().to_string()))
            .field("spatial_ref", &self.spatial_ref())
            .field("collaborators", &self.collaborators)
            .finish()
    }
}

impl fmt::Display for DataCube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(grid) = &self.grid {
            writeln!(f, "DataCube on grid '{}'", grid.name())?;
        }
        write!(f, "{}", self.inventory)
    }
}

/// Builder for [`DataCube`]
///
/// Collects the configuration and collaborators, then builds the cube from
/// file identifiers, a directory tree or a precomputed inventory.
#[derive(Default)]
pub struct DataCubeBuilder {
    config: CubeConfig,
    collaborators: Collaborators,
    grid: Option<Arc<dyn Grid>>,
    spatial_ref: Option<SpatialRef>,
    dimensions: Option<Vec<String>>,
}

impl DataCubeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: CubeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn translator(mut self, translator: impl Translator + 'static) -> Self {
        self.collaborators.translator = Some(Arc::new(translator));
        self
    }

    #[must_use]
    pub fn boundary_extractor(mut self, extractor: impl BoundaryExtractor + 'static) -> Self {
        self.collaborators.boundary = Some(Arc::new(extractor));
        self
    }

    #[must_use]
    pub fn metadata_reader(mut self, reader: impl MetadataReader + 'static) -> Self {
        self.collaborators.metadata = Some(Arc::new(reader));
        self
    }

    #[must_use]
    pub fn reprojector(mut self, reprojector: impl Reprojector + 'static) -> Self {
        self.collaborators.reprojector = Some(Arc::new(reprojector));
        self
    }

    /// Tiling scheme of the files; footprints are then not derived per file
    #[must_use]
    pub fn grid(mut self, grid: impl Grid + 'static) -> Self {
        self.grid = Some(Arc::new(grid));
        self
    }

    #[must_use]
    pub fn spatial_ref(mut self, sref: SpatialRef) -> Self {
        self.spatial_ref = Some(sref);
        self
    }

    /// Restrict translated dimensions to this list
    #[must_use]
    pub fn dimensions(mut self, names: &[&str]) -> Self {
        self.dimensions = Some(names.iter().map(|n| (*n).to_string()).collect());
        self
    }

    /// Build a cube from file identifiers
    ///
    /// # Errors
    /// Returns `TypeMismatch` if the translator gives one dimension values of
    /// different kinds
    pub fn build_from_filepaths(self, filepaths: &[impl AsRef<str>]) -> CubeResult<DataCube> {
        self.build(filepaths, None)
    }

    /// Build a cube from the files registered in a directory tree
    ///
    /// # Errors
    /// See [`DataCubeBuilder::build_from_filepaths`]
    pub fn build_from_dir_tree(self, dir_tree: impl DirTree + 'static) -> CubeResult<DataCube> {
        let dir_tree: Arc<dyn DirTree> = Arc::new(dir_tree);
        let filepaths = dir_tree.file_register();
        self.build(&filepaths, Some(dir_tree))
    }

    /// Wrap a precomputed inventory; nothing is translated or derived
    #[must_use]
    pub fn build_from_inventory(self, inventory: Inventory) -> DataCube {
        DataCube {
            inventory,
            grid: self.grid,
            dir_tree: None,
            spatial_ref: self.spatial_ref,
            collaborators: self.collaborators,
            config: Arc::new(self.config),
        }
    }

    fn build(
        self,
        filepaths: &[impl AsRef<str>],
        dir_tree: Option<Arc<dyn DirTree>>,
    ) -> CubeResult<DataCube> {
        let mut builder = InventoryBuilder::new();
        if let Some(translator) = &self.collaborators.translator {
            builder = builder.translator(&**translator);
        }
        if let Some(names) = &self.dimensions {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            builder = builder.dimensions(&names);
        }
        let mut inventory = builder.build(filepaths)?;

        if let Some(extractor) = self.geometry_source() {
            let geometry = inventory
                .filepaths()
                .iter()
                .map(|filepath| {
                    let file_type = self.config.file_type(filepath)?;
                    let boundary = extractor.boundary(filepath, file_type);
                    if boundary.is_none() {
                        warn!("could not read footprint of '{filepath}'");
                    }
                    boundary
                })
                .collect();
            inventory = inventory.with_geometry(geometry)?;
        }

        let mut cube = self.build_from_inventory(inventory);
        cube.dir_tree = dir_tree;
        Ok(cube)
    }

    /// Boundary extractor to derive footprints with, if they are derived
    fn geometry_source(&self) -> Option<&Arc<dyn BoundaryExtractor>> {
        if !self.config.derive_geometry || self.grid.is_some() {
            return None;
        }
        self.collaborators.boundary.as_ref()
    }
}
