//! Collaborator interfaces
//!
//! The cube never opens raster files, parses filenames or walks directories
//! itself. Those jobs belong to the implementations injected here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use geo::Polygon;

use crate::config::FileType;
use crate::data::{DimValue, TranslateError};
use crate::spatial::SpatialRef;

/// Dimension values of one file, in the order the translator produced them
pub type Fields = Vec<(String, DimValue)>;

/// Maps a file name to its dimension values.
///
/// Receives the basename of a file. Any error marks the file as
/// untranslatable; the file stays in the inventory with null dimensions.
/// The order of the returned fields decides the order of new dimensions.
pub trait Translator {
    fn translate(&self, basename: &str) -> Result<Fields, TranslateError>;
}

impl<F> Translator for F
where
    F: Fn(&str) -> Result<Fields, TranslateError>,
{
    fn translate(&self, basename: &str) -> Result<Fields, TranslateError> {
        self(basename)
    }
}

/// Reads the footprint of a raster file.
pub trait BoundaryExtractor {
    /// Footprint polygon, or `None` if the file cannot be read
    fn boundary(&self, filepath: &str, file_type: FileType) -> Option<Polygon<f64>>;
}

/// Reads header metadata of a raster file.
pub trait MetadataReader {
    /// Header metadata, or `None` if the file cannot be read
    fn metadata(&self, filepath: &str, file_type: FileType) -> Option<HashMap<String, DimValue>>;
}

/// Transforms a region of interest between spatial reference systems.
pub trait Reprojector {
    fn reproject(
        &self,
        polygon: &Polygon<f64>,
        from: &SpatialRef,
        to: &SpatialRef,
    ) -> Result<Polygon<f64>, TranslateError>;
}

/// A spatial tiling scheme. Its presence means footprints come from the grid
/// rather than from the files.
pub trait Grid {
    fn name(&self) -> &str;

    /// Reference frame of the grid's tiles
    fn spatial_ref(&self) -> Option<SpatialRef> {
        None
    }
}

/// A directory tree listing raster files.
pub trait DirTree {
    /// Full paths of all files registered in the tree
    fn file_register(&self) -> Vec<String>;
}

/// The set of collaborators a cube delegates to.
///
/// Cloned cubes share collaborators; they are stateless capabilities.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub translator: Option<Arc<dyn Translator>>,
    pub boundary: Option<Arc<dyn BoundaryExtractor>>,
    pub metadata: Option<Arc<dyn MetadataReader>>,
    pub reprojector: Option<Arc<dyn Reprojector>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("translator", &self.translator.is_some())
            .field("boundary", &self.boundary.is_some())
            .field("metadata", &self.metadata.is_some())
            .field("reprojector", &self.reprojector.is_some())
            .finish()
    }
}
