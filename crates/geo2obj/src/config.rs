//! Project configuration: one JSON file per project, validated at startup.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::crs;
use crate::error::{Error, Result};

fn default_decimation() -> u32 {
    1
}

fn default_building_height() -> f64 {
    3.0
}

fn default_simplify_threshold() -> f64 {
    10.0
}

/// Road widths (meters) for the primary road categories.
fn default_road_widths() -> BTreeMap<String, f64> {
    let mut widths = BTreeMap::new();
    widths.insert("trunk".to_string(), 12.5);
    widths.insert("primary".to_string(), 12.5);
    widths.insert("secondary".to_string(), 10.0);
    widths.insert("tertiary".to_string(), 8.5);
    widths.insert("residential".to_string(), 7.5);
    widths.insert("service".to_string(), 5.0);
    widths
}

/// Per-project run configuration.
///
/// The bbox is in the project's projected CRS; all geometry (terrain and
/// features alike) is translated to be relative to its lower-left corner so
/// the meshes share one local origin.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project identifier; derives the conventional file names.
    pub project_name: String,

    /// `[xmin, ymin, xmax, ymax]` in the projected CRS.
    pub bbox: [f64; 4],

    /// Numeric code of the projected CRS (must be registered).
    pub project_srid: u32,

    /// Use every k-th raster sample when building the terrain mesh.
    #[serde(default = "default_decimation")]
    pub decimation: u32,

    /// Fallback building height (meters) when a footprint carries none.
    #[serde(default = "default_building_height")]
    pub building_height: f64,

    /// Road ribbon widths (meters) keyed by road category.
    #[serde(default = "default_road_widths")]
    pub road_widths: BTreeMap<String, f64>,

    /// Run-collapse distance threshold for road centerlines (meters).
    #[serde(default = "default_simplify_threshold")]
    pub simplify_threshold: f64,
}

impl ProjectConfig {
    /// Load and validate a config file. Any violation aborts the stage
    /// before output is written.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let config: ProjectConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.project_name.is_empty() {
            return Err(Error::Config("project_name must not be empty".into()));
        }
        if !self.bbox.iter().all(|v| v.is_finite()) {
            return Err(Error::Config("bbox coordinates must be finite".into()));
        }
        if self.bbox[0] >= self.bbox[2] || self.bbox[1] >= self.bbox[3] {
            return Err(Error::Config(
                "bbox must be [xmin, ymin, xmax, ymax] with min < max".into(),
            ));
        }
        if self.decimation < 1 {
            return Err(Error::Config("decimation must be >= 1".into()));
        }
        if self.building_height <= 0.0 {
            return Err(Error::Config("building_height must be positive".into()));
        }
        if self.simplify_threshold <= 0.0 {
            return Err(Error::Config("simplify_threshold must be positive".into()));
        }
        // Fail fast on unknown CRS codes rather than at first transform.
        crs::lookup(self.project_srid)?;
        Ok(())
    }

    /// Conventional per-project file name: `<project>-<suffix>.<ext>`.
    pub fn file_name(&self, suffix: &str, ext: &str) -> String {
        format!("{}-{}.{}", self.project_name, suffix, ext)
    }

    /// Lower-left corner of the project bbox (the shared local origin).
    #[inline]
    pub fn origin(&self) -> [f64; 2] {
        [self.bbox[0], self.bbox[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ProjectConfig> {
        let config: ProjectConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    const MINIMAL: &str = r#"{
        "project_name": "fjordvik",
        "bbox": [140000.0, 6940000.0, 144000.0, 6943000.0],
        "project_srid": 25833
    }"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.decimation, 1);
        assert_eq!(config.building_height, 3.0);
        assert_eq!(config.simplify_threshold, 10.0);
        assert_eq!(config.road_widths.get("primary"), Some(&12.5));
        assert_eq!(config.file_name("terrain", "obj"), "fjordvik-terrain.obj");
    }

    #[test]
    fn unknown_srid_is_rejected() {
        let json = MINIMAL.replace("25833", "9999");
        assert!(matches!(parse(&json), Err(Error::Config(_))));
    }

    #[test]
    fn inverted_bbox_is_rejected() {
        let json = MINIMAL.replace("144000.0", "139000.0");
        assert!(matches!(parse(&json), Err(Error::Config(_))));
    }

    #[test]
    fn zero_decimation_is_rejected() {
        let json = r#"{
            "project_name": "fjordvik",
            "bbox": [0.0, 0.0, 1.0, 1.0],
            "project_srid": 25833,
            "decimation": 0
        }"#;
        assert!(matches!(parse(json), Err(Error::Config(_))));
    }
}
