//! Greedy centerline simplification before road extrusion.
//!
//! Forward scan: points accumulate into the current run until the planar
//! distance from the run's start exceeds the threshold; that point closes
//! the run and starts the next. The final point is always kept. This exact
//! greedy collapse is part of the output contract — it is not a stand-in
//! for a globally optimal simplifier.

#[inline]
fn planar_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Collapse runs of nearby points along a path.
pub fn collapse_runs(path: &[[f64; 3]], threshold: f64) -> Vec<[f64; 3]> {
    let Some(&first) = path.first() else {
        return Vec::new();
    };

    let mut kept = vec![first];
    let mut anchor = first;

    for p in &path[1..] {
        if planar_distance(&anchor, p) > threshold {
            kept.push(*p);
            anchor = *p;
        }
    }

    // The final, possibly short, run still ends at the last input point.
    let last = *path.last().unwrap();
    if kept.last() != Some(&last) {
        kept.push(last);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xs(points: &[[f64; 3]]) -> Vec<f64> {
        points.iter().map(|p| p[0]).collect()
    }

    #[test]
    fn endpoints_are_always_kept() {
        let path: Vec<[f64; 3]> = (0..7).map(|i| [i as f64, 0.0, 0.0]).collect();
        let kept = collapse_runs(&path, 10.0);
        assert_eq!(kept.first(), path.first());
        assert_eq!(kept.last(), path.last());
    }

    #[test]
    fn runs_close_when_threshold_is_exceeded() {
        let path: Vec<[f64; 3]> = (0..=30).map(|i| [i as f64, 0.0, 0.0]).collect();
        let kept = collapse_runs(&path, 10.0);
        // Distance must exceed the threshold, so runs close at x = 11, 22.
        assert_eq!(xs(&kept), vec![0.0, 11.0, 22.0, 30.0]);

        // No emitted run except the final one is under the threshold.
        for pair in kept.windows(2).rev().skip(1) {
            assert!(planar_distance(&pair[0], &pair[1]) > 10.0);
        }
    }

    #[test]
    fn short_paths_survive_untouched() {
        let path = [[0.0, 0.0, 5.0], [1.0, 1.0, 6.0]];
        assert_eq!(collapse_runs(&path, 10.0), path.to_vec());
        assert_eq!(collapse_runs(&path[..1], 10.0), vec![path[0]]);
        assert!(collapse_runs(&[], 10.0).is_empty());
    }

    #[test]
    fn elevation_rides_along_with_kept_points() {
        let path = [
            [0.0, 0.0, 1.0],
            [12.0, 0.0, 2.0],
            [24.0, 0.0, 3.0],
        ];
        let kept = collapse_runs(&path, 10.0);
        assert_eq!(kept.iter().map(|p| p[2]).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }
}
