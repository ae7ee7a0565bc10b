//! Dimensional inventory model
//!
//! This module provides:
//! - DimValue: typed dimension values
//! - Column: a named dimension backed by an Arrow array
//! - Predicate: typed filter predicates and their evaluator
//! - Inventory: the Arrow-backed file table, with filtering, temporal
//!   splitting and cross-inventory operations
//! - DataCube: the façade pairing an inventory with its collaborators

mod builder;
mod column;
mod cube;
mod error;
mod filter;
mod inventory;
mod predicate;
mod setops;
mod temporal;
mod value;

pub use builder::InventoryBuilder;
pub use column::Column;
pub use cube::{match_dimension, merge, unite, DataCube, DataCubeBuilder};
pub use error::{CubeError, CubeResult, TranslateError};
pub use inventory::{Geometry, Inventory, FILEPATH, GEOMETRY};
pub use predicate::{predicates_from_parts, Comparator, FilterExpr, FilterValue, Predicate};
pub use setops::common_values;
pub use value::DimValue;
