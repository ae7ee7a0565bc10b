//! Error types for inventory and data cube operations

use thiserror::Error;

/// Result type for inventory and data cube operations
pub type CubeResult<T> = Result<T, CubeError>;

/// Error raised by a translator for a single file identifier.
///
/// Never surfaced to callers: the file is kept as an untranslatable row.
pub type TranslateError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while building or transforming a data cube
#[derive(Error, Debug)]
pub enum CubeError {
    /// A filter value and its expression disagree in shape (scalar vs pair)
    #[error("length of value (={values}) and length of expression (={expressions}) does not match or is larger than 2")]
    PredicateShape { values: usize, expressions: usize },

    /// Number of filter values differs from number of expressions
    #[error("got {values} filter values but {expressions} expressions")]
    PredicateCount { values: usize, expressions: usize },

    /// Comparator token could not be parsed
    #[error("invalid comparator '{0}', expected one of: ==, !=, >, <, >=, <=")]
    InvalidComparator(String),

    /// Dimension is not part of the inventory
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// Dimension name is already taken
    #[error("dimension '{0}' already exists")]
    DimensionCollision(String),

    /// Number of values does not match number of rows
    #[error("expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    /// Row index out of bounds
    #[error("index {index} out of bounds for length {length}")]
    OutOfBounds { index: usize, length: usize },

    /// Value type is incompatible with a column or with other values
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Spatial filtering on an inventory without a geometry column
    #[error("inventory has no geometry column")]
    MissingGeometry,

    /// Operation needs a collaborator the cube was built without
    #[error("no {0} configured")]
    MissingCollaborator(&'static str),

    /// Region of interest could not be brought into the cube's reference frame
    #[error("reprojection failed: {0}")]
    Reprojection(String),

    /// Invalid filename pattern
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Configuration parsed but holds an unusable value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error (configuration file read)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error (from arrow-rs)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
