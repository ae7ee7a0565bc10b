//! Regions of interest and spatial reference identifiers

use std::fmt;

use geo::{coord, Intersects, Polygon, Rect};

/// Spatial reference system identifier (EPSG code, WKT or PROJ string).
///
/// Opaque to the cube: two references are the same frame only when their
/// identifiers are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpatialRef(String);

impl SpatialRef {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into())
    }

    /// EPSG code reference, e.g. `SpatialRef::epsg(4326)`
    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Region of interest for spatial filtering
#[derive(Debug, Clone, PartialEq)]
pub enum Roi {
    Polygon(Polygon<f64>),
    /// `[x_min, y_min, x_max, y_max]`
    Extent([f64; 4]),
}

impl Roi {
    /// The region as a polygon; extents become their bounding rectangle
    pub fn to_polygon(&self) -> Polygon<f64> {
        match self {
            Roi::Polygon(polygon) => polygon.clone(),
            Roi::Extent([x_min, y_min, x_max, y_max]) => Rect::new(
                coord! { x: *x_min, y: *y_min },
                coord! { x: *x_max, y: *y_max },
            )
            .to_polygon(),
        }
    }
}

impl From<Polygon<f64>> for Roi {
    fn from(polygon: Polygon<f64>) -> Self {
        Roi::Polygon(polygon)
    }
}

impl From<[f64; 4]> for Roi {
    fn from(extent: [f64; 4]) -> Self {
        Roi::Extent(extent)
    }
}

/// Row indices whose geometry intersects `roi`; null geometries never match.
pub(crate) fn intersecting_rows(geometry: &[Option<Polygon<f64>>], roi: &Polygon<f64>) -> Vec<usize> {
    geometry
        .iter()
        .enumerate()
        .filter_map(|(i, g)| match g {
            Some(polygon) if polygon.intersects(roi) => Some(i),
            _ => None,
        })
        .collect()
}
