//! Vector feature interchange: a typed GeoJSON-style feature collection.
//!
//! Known numeric properties get typed fields; everything else survives in
//! an open string-keyed extras map so unrecognized tags round-trip intact.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 2D or 3D coordinate tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<f64>", try_from = "Vec<f64>")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Position {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    #[inline]
    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    #[inline]
    pub fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<Position> for Vec<f64> {
    fn from(p: Position) -> Self {
        match p.z {
            Some(z) => vec![p.x, p.y, z],
            None => vec![p.x, p.y],
        }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(v: Vec<f64>) -> std::result::Result<Self, String> {
        match v.len() {
            2 => Ok(Position::new(v[0], v[1])),
            3 => Ok(Position::with_z(v[0], v[1], v[2])),
            n => Err(format!("coordinate tuple with {n} elements")),
        }
    }
}

/// Feature geometry: a polygon (array of rings, first ring is the outer
/// boundary) or a single ordered line string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<Position>>),
    LineString(Vec<Position>),
}

impl Geometry {
    /// The outer boundary ring of a polygon.
    pub fn outer_ring(&self) -> Result<&[Position]> {
        match self {
            Geometry::Polygon(rings) => rings
                .first()
                .map(Vec::as_slice)
                .ok_or_else(|| Error::Geometry("polygon without an outer ring".into())),
            Geometry::LineString(_) => {
                Err(Error::Geometry("expected a Polygon geometry".into()))
            }
        }
    }

    /// The coordinate path of a line string.
    pub fn line(&self) -> Result<&[Position]> {
        match self {
            Geometry::LineString(path) => Ok(path),
            Geometry::Polygon(_) => Err(Error::Geometry("expected a LineString geometry".into())),
        }
    }
}

fn feature_kind() -> String {
    "Feature".to_string()
}

/// Typed property bag: known keys as fields, the rest in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    #[serde(rename = "roadType", default, skip_serializing_if = "Option::is_none")]
    pub road_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(
        rename = "minSurfaceElevation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub min_surface_elevation: Option<f64>,

    #[serde(
        rename = "maxSurfaceElevation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_surface_elevation: Option<f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::io(path, std::io::Error::new(ErrorKind::InvalidData, e.to_string()))
        })
    }

    /// Serialize to disk in a single write step.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer(&mut out, self)
            .map_err(|e| Error::io(path, std::io::Error::new(ErrorKind::Other, e.to_string())))?;
        use std::io::Write;
        out.flush().map_err(|e| Error::io(path, e))
    }
}
