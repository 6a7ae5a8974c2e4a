//! Terrain surface: a regular-grid TIN built from the elevation raster.
//!
//! Raster rows grow southward while mesh Y grows northward, so the row
//! axis is flipped for both positions and texture coordinates; that keeps
//! geometry and texture aligned.

use tinobj::Mesh;

use crate::error::{Error, Result};
use crate::raster::RasterGrid;

/// Elevations are quantized to this step (in CRS units).
pub const ELEVATION_QUANTUM: f64 = 0.1;

#[inline]
fn quantize_elevation(z: f64) -> f64 {
    (z / ELEVATION_QUANTUM).round() * ELEVATION_QUANTUM
}

/// Build the triangulated surface over a (decimated) grid.
///
/// Vertex (r, c) sits at `x = c*step`, `y = (rows-1-r)*step` with the
/// sampled elevation; each grid cell emits two triangles with a fixed
/// diagonal split and consistent winding. Output is deterministic for a
/// given grid and step.
pub fn build_surface(grid: &RasterGrid, step: f64) -> Result<Mesh> {
    let rows = grid.height;
    let cols = grid.width;
    if rows < 2 || cols < 2 {
        return Err(Error::Geometry(format!(
            "raster grid {cols}x{rows} is too small to triangulate"
        )));
    }

    let mut mesh = Mesh {
        vertices: Vec::with_capacity(rows * cols),
        texcoords: Vec::with_capacity(rows * cols),
        triangles: Vec::with_capacity(2 * (rows - 1) * (cols - 1)),
    };

    for r in 0..rows {
        for c in 0..cols {
            let x = c as f64 * step;
            let y = (rows - 1 - r) as f64 * step;
            let z = quantize_elevation(grid.sample(r, c) as f64);
            mesh.vertices.push([x, y, z]);
        }
    }

    for r in 0..rows {
        for c in 0..cols {
            let u = c as f64 / (cols - 1) as f64;
            let v = (rows - 1 - r) as f64 / (rows - 1) as f64;
            mesh.texcoords.push([u, v]);
        }
    }

    // Cells from north row to south row, west to east; the shared diagonal
    // runs from the cell's northwest to its southeast corner.
    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let i1 = (r * cols + c) as u32;
            let i2 = i1 + 1;
            let i3 = i2 + cols as u32;
            let i4 = i1 + cols as u32;
            mesh.triangles.push([i1, i3, i2]);
            mesh.triangles.push([i1, i4, i3]);
        }
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_grid(width: usize, height: usize, z: f32) -> RasterGrid {
        RasterGrid::new(width, height, 1.0, [0.0, 0.0], vec![z; width * height]).unwrap()
    }

    #[test]
    fn full_resolution_counts() {
        let mesh = build_surface(&flat_grid(5, 3, 42.0), 1.0).unwrap();
        assert_eq!(mesh.vertex_count(), 15);
        assert_eq!(mesh.triangle_count(), 2 * 2 * 4);

        let n = mesh.vertex_count() as u32;
        for tri in &mesh.triangles {
            assert!(tri.iter().all(|&i| i < n));
            assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
        }
    }

    #[test]
    fn flat_four_by_four_grid() {
        let mesh = build_surface(&flat_grid(4, 4, 100.0), 1.0).unwrap();
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(mesh.triangle_count(), 18);
        assert!(mesh.vertices.iter().all(|v| v[2] == 100.0));
    }

    #[test]
    fn row_axis_is_flipped_north_up() {
        let mesh = build_surface(&flat_grid(2, 3, 0.0), 10.0).unwrap();
        // First vertex is the raster's northernmost row: largest mesh y.
        assert_eq!(mesh.vertices[0][1], 20.0);
        assert_eq!(mesh.vertices.last().unwrap()[1], 0.0);
        // Texcoords flip the same way.
        assert_eq!(mesh.texcoords[0][1], 1.0);
        assert_eq!(mesh.texcoords.last().unwrap()[1], 0.0);
    }

    #[test]
    fn elevations_snap_to_tenths() {
        let grid = RasterGrid::new(2, 2, 1.0, [0.0, 0.0], vec![1.234, 5.678, 9.0, 0.04]).unwrap();
        let mesh = build_surface(&grid, 1.0).unwrap();
        let zs: Vec<f64> = mesh.vertices.iter().map(|v| v[2]).collect();
        for (z, want) in zs.iter().zip([1.2, 5.7, 9.0, 0.0]) {
            assert!((z - want).abs() < 1e-9);
        }
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        assert!(build_surface(&flat_grid(1, 4, 0.0), 1.0).is_err());
    }
}
