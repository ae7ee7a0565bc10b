//! EO Cube Core - file-based data cubes over georeferenced raster collections
//!
//! This crate provides the core functionality:
//! - Data: the dimensional inventory model and the DataCube façade
//! - Collaborators: interfaces for filename translation, footprint and
//!   metadata reading, reprojection, grids and directory trees
//! - Spatial: regions of interest and spatial references
//! - Config: cube settings loaded from TOML

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data operations module - inventories, predicates and data cubes
pub mod data;

/// Collaborator interfaces the cube delegates file access to
pub mod collab;

/// Regions of interest and spatial reference identifiers
pub mod spatial;

/// Cube configuration
pub mod config;

/// Test utilities - in-memory collaborators for tests and benchmarks
pub mod testutil;

/// Convenience re-export of the data cube
pub use data::{DataCube, DataCubeBuilder};

/// Convenience re-export of the inventory model
pub use data::{Column, DimValue, Inventory, Predicate};

/// Convenience re-export of errors
pub use data::{CubeError, CubeResult};

/// Convenience re-export of configuration
pub use config::{CubeConfig, FileType};

/// Convenience re-export of spatial types
pub use spatial::{Roi, SpatialRef};
