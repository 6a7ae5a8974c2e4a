//! Snapping 2D geometry onto the triangulated surface.
//!
//! Point location walks an R-tree of triangle envelopes to the triangle
//! containing the query point, then interpolates elevation from barycentric
//! weights. Line strings additionally get a point inserted wherever a
//! segment crosses a triangle edge, so ridge and valley lines show up in
//! the snapped geometry instead of being cut off between endpoints.
//!
//! The index is built once per mesh and only ever read; it changes lookup
//! cost, never results. Zero-area triangles are left out at build time.

use rstar::{RTree, RTreeObject, AABB};
use tinobj::Mesh;

use crate::error::{Error, Result};

/// Slack for the barycentric containment test, so points exactly on a
/// shared edge are owned by both triangles.
const WEIGHT_EPS: f64 = 1e-9;

/// Twice the minimum triangle area considered non-degenerate.
const AREA_EPS: f64 = 1e-12;

/// Tolerance for deduplicating crossing parameters along a segment.
const PARAM_EPS: f64 = 1e-9;

struct TriangleRef {
    index: u32,
    env: AABB<[f64; 2]>,
}

impl RTreeObject for TriangleRef {
    type Envelope = AABB<[f64; 2]>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// Read-only point-location index over a terrain mesh.
pub struct SurfaceIndex {
    vertices: Vec<[f64; 3]>,
    triangles: Vec<[u32; 3]>,
    tree: RTree<TriangleRef>,
}

#[inline]
fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

impl SurfaceIndex {
    pub fn new(mesh: &Mesh) -> Self {
        let mut refs = Vec::with_capacity(mesh.triangles.len());

        for (index, tri) in mesh.triangles.iter().enumerate() {
            let [a, b, c] = corner_positions(&mesh.vertices, tri);
            let area2 = cross(b[0] - a[0], b[1] - a[1], c[0] - a[0], c[1] - a[1]);
            if area2.abs() < AREA_EPS {
                continue;
            }

            let env = AABB::from_corners(
                [
                    a[0].min(b[0]).min(c[0]),
                    a[1].min(b[1]).min(c[1]),
                ],
                [
                    a[0].max(b[0]).max(c[0]),
                    a[1].max(b[1]).max(c[1]),
                ],
            );
            refs.push(TriangleRef {
                index: index as u32,
                env,
            });
        }

        SurfaceIndex {
            vertices: mesh.vertices.clone(),
            triangles: mesh.triangles.clone(),
            tree: RTree::bulk_load(refs),
        }
    }

    /// Interpolated surface elevation at a 2D point, or `None` when no
    /// triangle contains it.
    pub fn elevation_at(&self, p: [f64; 2]) -> Option<f64> {
        for candidate in self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point(p))
        {
            let tri = &self.triangles[candidate.index as usize];
            let corners = corner_positions(&self.vertices, tri);
            if let Some([w1, w2, w3]) = barycentric_weights(&corners, p) {
                return Some(w1 * corners[0][2] + w2 * corners[1][2] + w3 * corners[2][2]);
            }
        }
        None
    }

    /// Snap an ordered 2D path onto the surface, inserting a point at every
    /// triangle-edge crossing so elevation is interpolated along segments,
    /// not just at the input vertices.
    ///
    /// Any point outside the triangulated extent fails the whole path with
    /// a geometry error; callers skip the owning feature and continue.
    pub fn snap_path(&self, path: &[[f64; 2]]) -> Result<Vec<[f64; 3]>> {
        let mut snapped = Vec::with_capacity(path.len());

        for (i, &p) in path.iter().enumerate() {
            let z = self.elevation_at(p).ok_or_else(|| {
                Error::Geometry(format!(
                    "point ({:.2}, {:.2}) lies outside the triangulated surface",
                    p[0], p[1]
                ))
            })?;
            snapped.push([p[0], p[1], z]);

            if let Some(&q) = path.get(i + 1) {
                for t in self.edge_crossings(p, q) {
                    let x = p[0] + t * (q[0] - p[0]);
                    let y = p[1] + t * (q[1] - p[1]);
                    let z = self.elevation_at([x, y]).ok_or_else(|| {
                        Error::Geometry(format!(
                            "point ({x:.2}, {y:.2}) lies outside the triangulated surface"
                        ))
                    })?;
                    snapped.push([x, y, z]);
                }
            }
        }

        Ok(snapped)
    }

    /// Parameters in (0, 1), sorted and deduplicated, where the segment
    /// p -> q crosses a triangle edge.
    fn edge_crossings(&self, p: [f64; 2], q: [f64; 2]) -> Vec<f64> {
        let env = AABB::from_corners(
            [p[0].min(q[0]), p[1].min(q[1])],
            [p[0].max(q[0]), p[1].max(q[1])],
        );
        let rx = q[0] - p[0];
        let ry = q[1] - p[1];

        let mut params = Vec::new();
        for candidate in self.tree.locate_in_envelope_intersecting(&env) {
            let tri = &self.triangles[candidate.index as usize];
            let corners = corner_positions(&self.vertices, tri);

            for e in 0..3 {
                let u = corners[e];
                let v = corners[(e + 1) % 3];
                let sx = v[0] - u[0];
                let sy = v[1] - u[1];

                let denom = cross(rx, ry, sx, sy);
                if denom.abs() < AREA_EPS {
                    continue; // parallel or collinear edge
                }

                let t = cross(u[0] - p[0], u[1] - p[1], sx, sy) / denom;
                let w = cross(u[0] - p[0], u[1] - p[1], rx, ry) / denom;
                if t > PARAM_EPS
                    && t < 1.0 - PARAM_EPS
                    && (-WEIGHT_EPS..=1.0 + WEIGHT_EPS).contains(&w)
                {
                    params.push(t);
                }
            }
        }

        params.sort_by(|a, b| a.total_cmp(b));
        params.dedup_by(|a, b| (*a - *b).abs() < PARAM_EPS);
        params
    }
}

#[inline]
fn corner_positions(vertices: &[[f64; 3]], tri: &[u32; 3]) -> [[f64; 3]; 3] {
    [
        vertices[tri[0] as usize],
        vertices[tri[1] as usize],
        vertices[tri[2] as usize],
    ]
}

/// Barycentric weights of `p` within the triangle's XY projection, or
/// `None` when the point is outside (or the triangle degenerate).
fn barycentric_weights(corners: &[[f64; 3]; 3], p: [f64; 2]) -> Option<[f64; 3]> {
    let [a, b, c] = corners;

    let d = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if d.abs() < AREA_EPS {
        return None;
    }

    let w1 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / d;
    let w2 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / d;
    let w3 = 1.0 - w1 - w2;

    if w1 >= -WEIGHT_EPS && w2 >= -WEIGHT_EPS && w3 >= -WEIGHT_EPS {
        Some([w1, w2, w3])
    } else {
        None
    }
}

/// Minimum and maximum elevation over a snapped path.
pub fn elevation_range(snapped: &[[f64; 3]]) -> Option<(f64, f64)> {
    let mut range: Option<(f64, f64)> = None;
    for p in snapped {
        range = Some(match range {
            None => (p[2], p[2]),
            Some((lo, hi)) => (lo.min(p[2]), hi.max(p[2])),
        });
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterGrid;
    use crate::terrain::build_surface;

    fn flat_surface() -> SurfaceIndex {
        let grid = RasterGrid::new(4, 4, 1.0, [0.0, 0.0], vec![100.0; 16]).unwrap();
        SurfaceIndex::new(&build_surface(&grid, 1.0).unwrap())
    }

    #[test]
    fn interpolation_is_exact_at_vertices() {
        let grid = RasterGrid::new(
            2,
            2,
            1.0,
            [0.0, 0.0],
            vec![10.0, 20.0, 30.0, 40.0],
        )
        .unwrap();
        let mesh = build_surface(&grid, 1.0).unwrap();
        let index = SurfaceIndex::new(&mesh);

        for v in &mesh.vertices {
            assert_eq!(index.elevation_at([v[0], v[1]]), Some(v[2]));
        }
    }

    #[test]
    fn shared_edges_interpolate_continuously() {
        let grid = RasterGrid::new(
            2,
            2,
            1.0,
            [0.0, 0.0],
            vec![10.0, 20.0, 30.0, 40.0],
        )
        .unwrap();
        let mesh = build_surface(&grid, 1.0).unwrap();
        let index = SurfaceIndex::new(&mesh);

        // The cell diagonal runs from the northwest vertex (0,1) to the
        // southeast vertex (1,0); its midpoint belongs to both triangles.
        let nw = mesh.vertices[0];
        let se = mesh.vertices[3];
        let mid = [(nw[0] + se[0]) / 2.0, (nw[1] + se[1]) / 2.0];
        let expected = (nw[2] + se[2]) / 2.0;
        let z = index.elevation_at(mid).unwrap();
        assert!((z - expected).abs() < 1e-6);
    }

    #[test]
    fn polygon_on_flat_grid_spans_no_elevation_range() {
        let index = flat_surface();
        let ring = [
            [0.5, 0.5],
            [2.5, 0.5],
            [2.5, 2.5],
            [0.5, 2.5],
            [0.5, 0.5],
        ];
        let snapped = index.snap_path(&ring).unwrap();
        let (lo, hi) = elevation_range(&snapped).unwrap();
        assert_eq!(lo, 100.0);
        assert_eq!(hi, 100.0);
    }

    #[test]
    fn segments_gain_points_at_edge_crossings() {
        let index = flat_surface();
        let snapped = index.snap_path(&[[0.5, 0.5], [2.5, 0.5]]).unwrap();

        // Two column edges plus the middle cell's diagonal cross this segment.
        assert!(snapped.len() > 2, "got {} points", snapped.len());
        for pair in snapped.windows(2) {
            assert!(pair[0][0] < pair[1][0] + PARAM_EPS);
        }
        assert!(snapped.iter().all(|p| p[2] == 100.0));
    }

    #[test]
    fn sloped_segment_interpolates_between_rows() {
        // Two rows: north row at 0 m, south row at 10 m.
        let grid = RasterGrid::new(
            2,
            2,
            1.0,
            [0.0, 0.0],
            vec![0.0, 0.0, 10.0, 10.0],
        )
        .unwrap();
        let index = SurfaceIndex::new(&build_surface(&grid, 1.0).unwrap());

        let z = index.elevation_at([0.5, 0.25]).unwrap();
        assert!((z - 7.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_mesh_point_is_a_geometry_error() {
        let index = flat_surface();
        let err = index.snap_path(&[[1.0, 1.0], [50.0, 1.0]]).unwrap_err();
        assert!(matches!(err, Error::Geometry(_)));
    }
}
