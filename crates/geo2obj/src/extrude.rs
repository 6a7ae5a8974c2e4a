//! Extruding snapped features into renderable solids: quad ribbons for
//! road centerlines, walls plus an ear-clipped roof cap for building
//! footprints. Output is unindexed vertex triples ready for
//! `ObjWriter::append_solid`.

use crate::error::{Error, Result};

/// Segments shorter than this are duplicate/degenerate points.
pub const MIN_SEGMENT_LENGTH: f64 = 0.001;

const RING_EPS: f64 = 1e-9;

#[inline]
fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

// ---------- Roads ----------

fn segment_normal(a: &[f64; 3], b: &[f64; 3]) -> Result<[f64; 2]> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let length = dx.hypot(dy);
    if length < MIN_SEGMENT_LENGTH {
        return Err(Error::Geometry(format!(
            "degenerate road segment at ({:.2}, {:.2})",
            a[0], a[1]
        )));
    }
    Ok([-dy / length, dx / length])
}

/// One road segment as 6 vertices (2 triangles). Corners are the segment
/// endpoints offset by half the width along the left/right normal; each
/// endpoint keeps its own elevation.
fn road_quad(v1: &[f64; 3], v2: &[f64; 3], width: f64) -> Result<[[f64; 3]; 6]> {
    let normal = segment_normal(v1, v2)?;
    let ox = normal[0] * width / 2.0;
    let oy = normal[1] * width / 2.0;

    let a = [v1[0] + ox, v1[1] + oy, v1[2]];
    let b = [v1[0] - ox, v1[1] - oy, v1[2]];
    let c = [v2[0] - ox, v2[1] - oy, v2[2]];
    let d = [v2[0] + ox, v2[1] + oy, v2[2]];

    Ok([a, b, c, a, c, d])
}

/// Extrude a centerline into a ribbon of independent segment quads.
///
/// Consecutive quads are not mitered; a sharp turn leaves a small gap or
/// overlap at the joint. That matches the source material and is accepted.
pub fn road_ribbon(centerline: &[[f64; 3]], width: f64) -> Result<Vec<[f64; 3]>> {
    if centerline.len() < 2 {
        return Err(Error::Geometry(
            "road centerline needs at least 2 points".into(),
        ));
    }
    if !(width.is_finite() && width > 0.0) {
        return Err(Error::Geometry(format!("invalid road width {width}")));
    }

    let mut out = Vec::with_capacity(6 * (centerline.len() - 1));
    for pair in centerline.windows(2) {
        out.extend(road_quad(&pair[0], &pair[1], width)?);
    }
    Ok(out)
}

// ---------- Buildings ----------

/// Drop the closing duplicate and consecutive duplicate vertices; orient
/// the result counterclockwise. At least 3 distinct vertices must remain.
pub fn normalize_ring(ring: &[[f64; 2]]) -> Result<Vec<[f64; 2]>> {
    let mut cleaned: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for &p in ring {
        if cleaned
            .last()
            .is_some_and(|q| (p[0] - q[0]).abs() < RING_EPS && (p[1] - q[1]).abs() < RING_EPS)
        {
            continue;
        }
        cleaned.push(p);
    }

    if cleaned.len() > 1 {
        let first = cleaned[0];
        let last = cleaned[cleaned.len() - 1];
        if (first[0] - last[0]).abs() < RING_EPS && (first[1] - last[1]).abs() < RING_EPS {
            cleaned.pop();
        }
    }

    if cleaned.len() < 3 {
        return Err(Error::Geometry(format!(
            "footprint ring has {} distinct vertices, need at least 3",
            cleaned.len()
        )));
    }

    if signed_area2(&cleaned) < 0.0 {
        cleaned.reverse();
    }
    Ok(cleaned)
}

/// Twice the signed area of a ring (positive = counterclockwise).
fn signed_area2(ring: &[[f64; 2]]) -> f64 {
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += cross(a[0], a[1], b[0], b[1]);
    }
    sum
}

fn on_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0]) - RING_EPS
        && p[0] <= a[0].max(b[0]) + RING_EPS
        && p[1] >= a[1].min(b[1]) - RING_EPS
        && p[1] <= a[1].max(b[1]) + RING_EPS
}

fn segments_intersect(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let orient = |p: [f64; 2], q: [f64; 2], r: [f64; 2]| {
        cross(q[0] - p[0], q[1] - p[1], r[0] - p[0], r[1] - p[1])
    };

    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);

    if ((o1 > 0.0) != (o2 > 0.0)) && ((o3 > 0.0) != (o4 > 0.0)) {
        return true;
    }

    // Collinear touching/overlap counts as an intersection too.
    (o1.abs() < RING_EPS && on_segment(c, a, b))
        || (o2.abs() < RING_EPS && on_segment(d, a, b))
        || (o3.abs() < RING_EPS && on_segment(a, c, d))
        || (o4.abs() < RING_EPS && on_segment(b, c, d))
}

/// A simple ring has no two non-adjacent edges that intersect or touch.
fn ensure_simple(ring: &[[f64; 2]]) -> Result<()> {
    let n = ring.len();
    for i in 0..n {
        for j in i + 1..n {
            // Skip the edge itself and its two neighbors around the ring.
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            let (c, d) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(a, b, c, d) {
                return Err(Error::Geometry(
                    "footprint ring is self-intersecting".into(),
                ));
            }
        }
    }
    Ok(())
}

fn point_in_triangle(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    // CCW triangle; on-edge points count as inside (they block the ear).
    cross(b[0] - a[0], b[1] - a[1], p[0] - a[0], p[1] - a[1]) >= -RING_EPS
        && cross(c[0] - b[0], c[1] - b[1], p[0] - b[0], p[1] - b[1]) >= -RING_EPS
        && cross(a[0] - c[0], a[1] - c[1], p[0] - c[0], p[1] - c[1]) >= -RING_EPS
}

/// Triangulate a simple, hole-free, possibly non-convex ring by clipping
/// ears. Input need not be oriented; output triangles are counterclockwise
/// indices into the ring.
pub fn ear_clip(ring: &[[f64; 2]]) -> Result<Vec<[usize; 3]>> {
    let n = ring.len();
    if n < 3 {
        return Err(Error::Geometry("cannot triangulate ring with < 3 vertices".into()));
    }

    let area2 = signed_area2(ring);
    if area2.abs() < RING_EPS {
        return Err(Error::Geometry("cannot triangulate zero-area ring".into()));
    }
    ensure_simple(ring)?;

    let mut indices: Vec<usize> = if area2 > 0.0 {
        (0..n).collect()
    } else {
        (0..n).rev().collect()
    };

    let mut triangles = Vec::with_capacity(n - 2);
    while indices.len() > 3 {
        let m = indices.len();
        let mut clipped = false;

        for i in 0..m {
            let prev = indices[(i + m - 1) % m];
            let cur = indices[i];
            let next = indices[(i + 1) % m];

            let a = ring[prev];
            let b = ring[cur];
            let c = ring[next];

            // Reflex or collinear corners cannot be ears.
            if cross(b[0] - a[0], b[1] - a[1], c[0] - b[0], c[1] - b[1]) <= RING_EPS {
                continue;
            }

            let blocked = indices.iter().any(|&other| {
                other != prev && other != cur && other != next && point_in_triangle(ring[other], a, b, c)
            });
            if blocked {
                continue;
            }

            triangles.push([prev, cur, next]);
            indices.remove(i);
            clipped = true;
            break;
        }

        if !clipped {
            return Err(Error::Geometry(
                "footprint ring cannot be triangulated".into(),
            ));
        }
    }

    triangles.push([indices[0], indices[1], indices[2]]);
    Ok(triangles)
}

/// Extrude a footprint between two elevations: one wall (2 triangles) per
/// ring edge and an ear-clipped flat roof cap. The ring is normalized to
/// counterclockwise, so walls face outward and the roof faces up.
pub fn building_solid(
    footprint: &[[f64; 2]],
    min_elevation: f64,
    max_elevation: f64,
) -> Result<Vec<[f64; 3]>> {
    if !(max_elevation > min_elevation) {
        return Err(Error::Geometry(format!(
            "roof elevation {max_elevation} is not above ground {min_elevation}"
        )));
    }

    let ring = normalize_ring(footprint)?;
    let roof_triangles = ear_clip(&ring)?;

    let n = ring.len();
    let ground: Vec<[f64; 3]> = ring.iter().map(|p| [p[0], p[1], min_elevation]).collect();
    let roof: Vec<[f64; 3]> = ring.iter().map(|p| [p[0], p[1], max_elevation]).collect();

    let mut out = Vec::with_capacity(6 * n + 3 * roof_triangles.len());
    for i in 0..n {
        let j = (i + 1) % n;
        out.extend([ground[i], ground[j], roof[j], roof[j], roof[i], ground[i]]);
    }
    for [a, b, c] in roof_triangles {
        out.extend([roof[a], roof[b], roof[c]]);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn road_quad_matches_reference_corners() {
        let ribbon = road_ribbon(&[[0.0, 0.0, 12.0], [10.0, 0.0, 12.0]], 4.0).unwrap();
        assert_eq!(
            ribbon,
            vec![
                [0.0, 2.0, 12.0],
                [0.0, -2.0, 12.0],
                [10.0, -2.0, 12.0],
                [0.0, 2.0, 12.0],
                [10.0, -2.0, 12.0],
                [10.0, 2.0, 12.0],
            ]
        );
    }

    #[test]
    fn ribbon_emits_one_quad_per_segment() {
        let line = [
            [0.0, 0.0, 1.0],
            [20.0, 0.0, 1.5],
            [20.0, 20.0, 2.0],
        ];
        let ribbon = road_ribbon(&line, 7.5).unwrap();
        assert_eq!(ribbon.len(), 12);
    }

    #[test]
    fn duplicate_centerline_points_are_rejected() {
        let line = [[5.0, 5.0, 0.0], [5.0, 5.0, 0.0]];
        assert!(matches!(
            road_ribbon(&line, 4.0),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn ear_clip_square_and_l_shape() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert_eq!(ear_clip(&square).unwrap().len(), 2);

        // Non-convex L: 6 vertices, 4 triangles, area preserved.
        let l_shape = [
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ];
        let triangles = ear_clip(&l_shape).unwrap();
        assert_eq!(triangles.len(), 4);

        let mut area2 = 0.0;
        for [a, b, c] in &triangles {
            let (a, b, c) = (l_shape[*a], l_shape[*b], l_shape[*c]);
            let t = cross(b[0] - a[0], b[1] - a[1], c[0] - a[0], c[1] - a[1]);
            assert!(t > 0.0, "roof triangle must be counterclockwise");
            area2 += t;
        }
        assert!((area2 - signed_area2(&l_shape)).abs() < 1e-9);
    }

    #[test]
    fn clockwise_rings_are_reoriented() {
        let clockwise = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        let triangles = ear_clip(&clockwise).unwrap();
        for [a, b, c] in triangles {
            let (a, b, c) = (clockwise[a], clockwise[b], clockwise[c]);
            assert!(cross(b[0] - a[0], b[1] - a[1], c[0] - a[0], c[1] - a[1]) > 0.0);
        }
    }

    #[test]
    fn degenerate_rings_are_rejected() {
        // Collinear: zero area.
        let collinear = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        assert!(matches!(ear_clip(&collinear), Err(Error::Geometry(_))));

        // Self-intersecting.
        let twisted = [
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 3.0],
            [2.0, -1.0],
            [0.0, 3.0],
        ];
        assert!(matches!(ear_clip(&twisted), Err(Error::Geometry(_))));
    }

    #[test]
    fn ring_normalization_drops_duplicates_and_closing_vertex() {
        let ring = [
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ];
        let cleaned = normalize_ring(&ring).unwrap();
        assert_eq!(cleaned.len(), 4);

        assert!(matches!(
            normalize_ring(&[[0.0, 0.0], [0.0, 0.0], [1.0, 1.0]]),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn building_walls_and_roof() {
        let footprint = [
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 5.0],
            [0.0, 5.0],
            [0.0, 0.0],
        ];
        let solid = building_solid(&footprint, 100.0, 107.5).unwrap();

        // 4 wall quads (6 vertices each) + 2 roof triangles.
        assert_eq!(solid.len(), 4 * 6 + 2 * 3);
        assert!(solid[..24].iter().all(|v| v[2] == 100.0 || v[2] == 107.5));
        assert!(solid[24..].iter().all(|v| v[2] == 107.5));
    }

    #[test]
    fn flat_extrusion_range_is_rejected() {
        let footprint = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            building_solid(&footprint, 5.0, 5.0),
            Err(Error::Geometry(_))
        ));
    }
}
