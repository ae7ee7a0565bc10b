//! Cube configuration (`eocube.toml`) parsing and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{CubeError, CubeResult};

/// Raster container formats the collaborators know how to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    GeoTiff,
    NetCdf,
}

/// Settings shared by every cube built from the same configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CubeConfig {
    /// Dimension used by yearly/monthly splitting when none is named.
    pub time_dimension: String,

    /// Dimension holding tile names, used by tile-based spatial filtering.
    pub tile_dimension: String,

    /// Derive a geometry column through the boundary extractor at construction.
    pub derive_geometry: bool,

    /// File extensions (without dot, case-insensitive) treated as GeoTIFF.
    pub geotiff_extensions: Vec<String>,

    /// File extensions (without dot, case-insensitive) treated as NetCDF.
    pub netcdf_extensions: Vec<String>,
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            time_dimension: "time".to_string(),
            tile_dimension: "tile".to_string(),
            derive_geometry: true,
            geotiff_extensions: vec!["tif".to_string(), "tiff".to_string()],
            netcdf_extensions: vec!["nc".to_string()],
        }
    }
}

impl CubeConfig {
    /// Load a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> CubeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value is unusable.
    pub fn parse(content: &str) -> CubeResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CubeResult<()> {
        if self.time_dimension.trim().is_empty() {
            return Err(CubeError::InvalidConfig(
                "time_dimension must not be empty".to_string(),
            ));
        }
        if self.tile_dimension.trim().is_empty() {
            return Err(CubeError::InvalidConfig(
                "tile_dimension must not be empty".to_string(),
            ));
        }
        let all_extensions = self.geotiff_extensions.iter().chain(&self.netcdf_extensions);
        for ext in all_extensions {
            if ext.is_empty() || ext.starts_with('.') {
                return Err(CubeError::InvalidConfig(format!(
                    "invalid file extension '{ext}', expected a bare extension like 'tif'"
                )));
            }
        }
        Ok(())
    }

    /// Serialize the configuration to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Classify a file by its extension.
    pub fn file_type(&self, filepath: &str) -> Option<FileType> {
        let ext = Path::new(filepath).extension()?.to_str()?.to_ascii_lowercase();
        let matches = |exts: &[String]| exts.iter().any(|e| e.eq_ignore_ascii_case(&ext));
        if matches(&self.geotiff_extensions) {
            Some(FileType::GeoTiff)
        } else if matches(&self.netcdf_extensions) {
            Some(FileType::NetCdf)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = CubeConfig::parse("").unwrap();
        assert_eq!(config, CubeConfig::default());
        assert_eq!(config.time_dimension, "time");
        assert!(config.derive_geometry);
    }

    #[test]
    fn test_parse_overrides() {
        let config = CubeConfig::parse(
            r#"
time_dimension = "datetime_1"
derive_geometry = false
netcdf_extensions = ["nc", "nc4"]
"#,
        )
        .unwrap();
        assert_eq!(config.time_dimension, "datetime_1");
        assert_eq!(config.tile_dimension, "tile");
        assert!(!config.derive_geometry);
        assert_eq!(config.file_type("/data/ssm.NC4"), Some(FileType::NetCdf));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = CubeConfig::parse("grid = \"Equi7\"").unwrap_err();
        assert!(matches!(err, CubeError::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = CubeConfig::parse("time_dimension = \"\"").unwrap_err();
        assert!(matches!(err, CubeError::InvalidConfig(_)));

        let err = CubeConfig::parse("geotiff_extensions = [\".tif\"]").unwrap_err();
        assert!(matches!(err, CubeError::InvalidConfig(_)));
    }

    #[test]
    fn test_file_type() {
        let config = CubeConfig::default();
        assert_eq!(config.file_type("a/b/S1A_VV.tif"), Some(FileType::GeoTiff));
        assert_eq!(config.file_type("a/b/S1A_VV.TIFF"), Some(FileType::GeoTiff));
        assert_eq!(config.file_type("a/b/ssm.nc"), Some(FileType::NetCdf));
        assert_eq!(config.file_type("a/b/readme.txt"), None);
        assert_eq!(config.file_type("a/b/noext"), None);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let config = CubeConfig {
            tile_dimension: "tile_name".to_string(),
            ..CubeConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = CubeConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded, config);
    }
}
