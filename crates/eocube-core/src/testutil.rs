//! Test utilities for EO Cube
//!
//! In-memory collaborators and sample file names for tests and benchmarks.
//! File names follow `{var}_{YYYYMMDD}_{pol}_{orbit}_{tile}.{ext}`, e.g.
//! `SIG0_20160101_VV_117_E048N012T6.tif`, where the tile `E{x}N{y}T{size}`
//! covers the square `[x, y, x + size, y + size]`.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use geo::{Polygon, Translate};

use crate::collab::{BoundaryExtractor, DirTree, Fields, Grid, MetadataReader, Reprojector};
use crate::config::FileType;
use crate::data::{DimValue, TranslateError};
use crate::spatial::{Roi, SpatialRef};

/// Translate a sample file name into `var`, `time`, `pol`, `orbit` and `tile`
///
/// # Errors
/// Returns error if the name does not follow the sample naming scheme
pub fn smart_translator(name: &str) -> Result<Fields, TranslateError> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or("file name without stem")?;
    let parts: Vec<&str> = stem.split('_').collect();
    let [var, date, pol, orbit, tile] = parts.as_slice() else {
        return Err(format!("'{name}' does not have 5 fields").into());
    };

    let time = NaiveDate::parse_from_str(date, "%Y%m%d")?;
    let orbit: i64 = orbit.parse()?;
    Ok(vec![
        ("var".to_string(), DimValue::from(*var)),
        ("time".to_string(), DimValue::from(time)),
        ("pol".to_string(), DimValue::from(*pol)),
        ("orbit".to_string(), DimValue::from(orbit)),
        ("tile".to_string(), DimValue::from(*tile)),
    ])
}

/// A translator that rejects every file
///
/// # Errors
/// Always
pub fn failing_translator(name: &str) -> Result<Fields, TranslateError> {
    Err(format!("cannot interpret '{name}'").into())
}

/// Build a sample file path under `dir`
pub fn sample_path(dir: &str, var: &str, date: &str, pol: &str, orbit: u32, tile: &str) -> String {
    format!("{dir}/{var}_{date}_{pol}_{orbit}_{tile}.tif")
}

/// Sample files: `n_days` consecutive days from 2016-01-01, VV and VH each,
/// alternating between two tiles
pub fn sample_filepaths(n_days: usize) -> Vec<String> {
    let start = NaiveDate::from_ymd_opt(2016, 1, 1).unwrap_or_default();
    start
        .iter_days()
        .take(n_days)
        .enumerate()
        .flat_map(|(i, day)| {
            let date = day.format("%Y%m%d").to_string();
            let tile = if i % 2 == 0 { "E000N000T1" } else { "E001N000T1" };
            ["VV", "VH"].map(|pol| sample_path("/data/s1", "SIG0", &date, pol, 117, tile))
        })
        .collect()
}

/// Footprint of a tile name `E{x}N{y}T{size}`
pub fn tile_footprint(tile: &str) -> Option<Polygon<f64>> {
    let rest = tile.strip_prefix('E')?;
    let (x, rest) = rest.split_once('N')?;
    let (y, size) = rest.split_once('T')?;
    let (x, y, size): (f64, f64, f64) = (x.parse().ok()?, y.parse().ok()?, size.parse().ok()?);
    Some(Roi::Extent([x, y, x + size, y + size]).to_polygon())
}

/// Reads footprints from the tile field of sample file names
#[derive(Debug, Clone, Copy, Default)]
pub struct TileFootprints;

impl BoundaryExtractor for TileFootprints {
    fn boundary(&self, filepath: &str, _file_type: FileType) -> Option<Polygon<f64>> {
        let stem = Path::new(filepath).file_stem()?.to_str()?;
        tile_footprint(stem.rsplit('_').next()?)
    }
}

/// Metadata keyed by file basename; unknown files are unreadable
#[derive(Debug, Clone, Default)]
pub struct FixedMetadata(pub HashMap<String, HashMap<String, DimValue>>);

impl MetadataReader for FixedMetadata {
    fn metadata(&self, filepath: &str, _file_type: FileType) -> Option<HashMap<String, DimValue>> {
        let name = Path::new(filepath).file_name()?.to_str()?;
        self.0.get(name).cloned()
    }
}

/// A grid known only by name and reference frame
#[derive(Debug, Clone)]
pub struct NamedGrid {
    pub name: String,
    pub sref: Option<SpatialRef>,
}

impl Grid for NamedGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn spatial_ref(&self) -> Option<SpatialRef> {
        self.sref.clone()
    }
}

/// A fixed list of files
#[derive(Debug, Clone, Default)]
pub struct StaticDirTree(pub Vec<String>);

impl DirTree for StaticDirTree {
    fn file_register(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Reprojects by shifting coordinates
#[derive(Debug, Clone, Copy)]
pub struct ShiftReprojector {
    pub dx: f64,
    pub dy: f64,
}

impl Reprojector for ShiftReprojector {
    fn reproject(
        &self,
        polygon: &Polygon<f64>,
        _from: &SpatialRef,
        _to: &SpatialRef,
    ) -> Result<Polygon<f64>, TranslateError> {
        Ok(polygon.translate(self.dx, self.dy))
    }
}
