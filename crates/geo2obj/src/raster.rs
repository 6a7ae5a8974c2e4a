//! Raster elevation input: a row-major single-band float grid with its
//! implicit geotransform (cell size, origin), read-only once loaded.
//!
//! The on-disk format is the ESRI ASCII grid (`.asc`): a small key/value
//! header followed by `nrows` rows of samples, northernmost row first.

use std::path::Path;

use log::warn;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    /// Ground distance covered by one cell, in CRS units.
    pub cell_size: f64,
    /// Lower-left corner of the grid in the projected CRS.
    pub origin: [f64; 2],
    /// Row-major samples, row 0 = northernmost.
    samples: Vec<f32>,
}

impl RasterGrid {
    pub fn new(
        width: usize,
        height: usize,
        cell_size: f64,
        origin: [f64; 2],
        samples: Vec<f32>,
    ) -> std::result::Result<Self, String> {
        if width == 0 || height == 0 {
            return Err("raster dimensions must be positive".into());
        }
        if samples.len() != width * height {
            return Err(format!(
                "expected {} samples, got {}",
                width * height,
                samples.len()
            ));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err("cell size must be positive".into());
        }
        Ok(Self {
            width,
            height,
            cell_size,
            origin,
            samples,
        })
    }

    /// Elevation sample at (row, col); row 0 is the northernmost row.
    #[inline]
    pub fn sample(&self, row: usize, col: usize) -> f32 {
        self.samples[row * self.width + col]
    }

    /// Load an ESRI ASCII grid file.
    pub fn from_ascii_grid(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        parse_ascii_grid(&text).map_err(|msg| {
            Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, msg),
            )
        })
    }

    /// Keep every k-th sample in both axes; output dims are the ceilings.
    pub fn decimate(&self, k: usize) -> RasterGrid {
        assert!(k >= 1);
        let mut samples = Vec::with_capacity(self.width.div_ceil(k) * self.height.div_ceil(k));
        for row in (0..self.height).step_by(k) {
            for col in (0..self.width).step_by(k) {
                samples.push(self.sample(row, col));
            }
        }
        RasterGrid {
            width: self.width.div_ceil(k),
            height: self.height.div_ceil(k),
            cell_size: self.cell_size * k as f64,
            origin: self.origin,
            samples,
        }
    }

    /// Bilinear resample to `width` x `height`, preserving the full extent
    /// of the source grid (corner samples map to corner samples).
    pub fn resample_bilinear(&self, width: usize, height: usize) -> RasterGrid {
        assert!(width >= 1 && height >= 1);

        let step = |i: usize, out: usize, src: usize| -> f64 {
            if out <= 1 {
                0.0
            } else {
                i as f64 * (src - 1) as f64 / (out - 1) as f64
            }
        };

        let mut samples = Vec::with_capacity(width * height);
        for row in 0..height {
            let src_y = step(row, height, self.height);
            let r0 = src_y.floor() as usize;
            let r1 = (r0 + 1).min(self.height - 1);
            let fy = (src_y - r0 as f64) as f32;

            for col in 0..width {
                let src_x = step(col, width, self.width);
                let c0 = src_x.floor() as usize;
                let c1 = (c0 + 1).min(self.width - 1);
                let fx = (src_x - c0 as f64) as f32;

                let top = self.sample(r0, c0) * (1.0 - fx) + self.sample(r0, c1) * fx;
                let bottom = self.sample(r1, c0) * (1.0 - fx) + self.sample(r1, c1) * fx;
                samples.push(top * (1.0 - fy) + bottom * fy);
            }
        }

        RasterGrid {
            width,
            height,
            cell_size: self.cell_size * self.width as f64 / width as f64,
            origin: self.origin,
            samples,
        }
    }
}

/// Parse ESRI ASCII grid text. Header keys are case-insensitive; no-data
/// samples are replaced by 0.0.
pub fn parse_ascii_grid(text: &str) -> std::result::Result<RasterGrid, String> {
    let mut tokens = text.split_whitespace().peekable();

    let mut ncols = None;
    let mut nrows = None;
    let mut cell_size = None;
    let mut xll = 0.0;
    let mut yll = 0.0;
    let mut nodata: Option<f32> = None;

    // Header: `key value` pairs until the first bare number.
    while let Some(token) = tokens.peek() {
        if token.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            let key = tokens.next().unwrap().to_ascii_lowercase();
            let value: f64 = tokens
                .next()
                .ok_or_else(|| format!("missing value for header field {key}"))?
                .parse()
                .map_err(|_| format!("malformed value for header field {key}"))?;
            match key.as_str() {
                "ncols" => ncols = Some(value as usize),
                "nrows" => nrows = Some(value as usize),
                "cellsize" => cell_size = Some(value),
                "xllcorner" => xll = value,
                "yllcorner" => yll = value,
                "nodata_value" => nodata = Some(value as f32),
                other => return Err(format!("unknown header field {other}")),
            }
        } else {
            break;
        }
    }

    let width = ncols.ok_or("missing ncols header field")?;
    let height = nrows.ok_or("missing nrows header field")?;
    let cell_size = cell_size.ok_or("missing cellsize header field")?;

    let mut samples = Vec::with_capacity(width * height);
    let mut voids = 0usize;
    for token in tokens {
        let value: f32 = token
            .parse()
            .map_err(|_| format!("malformed elevation sample {token:?}"))?;
        if Some(value) == nodata {
            voids += 1;
            samples.push(0.0);
        } else {
            samples.push(value);
        }
    }
    if voids > 0 {
        warn!("{voids} no-data samples replaced with 0.0");
    }

    RasterGrid::new(width, height, cell_size, [xll, yll], samples)
}
