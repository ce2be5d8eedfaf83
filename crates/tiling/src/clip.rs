//! Axis-aligned clipping of projected geometry against buffered tile bounds.

use foundation::bounds::Aabb2;

use crate::simplify::ProjPoint;

#[derive(Debug, Copy, Clone)]
enum Axis {
    X = 0,
    Y = 1,
}

/// Points inside `bounds` (closed interval).
pub fn clip_points(points: &[ProjPoint], bounds: &Aabb2) -> Vec<ProjPoint> {
    points
        .iter()
        .copied()
        .filter(|p| bounds.contains(p[0], p[1]))
        .collect()
}

/// Splits a polyline into the pieces lying inside `bounds`.
pub fn clip_line(line: &[ProjPoint], bounds: &Aabb2) -> Vec<Vec<ProjPoint>> {
    clip_line_axis(line, bounds.min[0], bounds.max[0], Axis::X)
        .into_iter()
        .flat_map(|part| clip_line_axis(&part, bounds.min[1], bounds.max[1], Axis::Y))
        .collect()
}

/// Sutherland–Hodgman clip of an open ring (no closing point). Orientation is preserved.
pub fn clip_ring(ring: &[ProjPoint], bounds: &Aabb2) -> Vec<ProjPoint> {
    let mut out = clip_half(ring, Axis::X, bounds.min[0], true);
    out = clip_half(&out, Axis::X, bounds.max[0], false);
    out = clip_half(&out, Axis::Y, bounds.min[1], true);
    clip_half(&out, Axis::Y, bounds.max[1], false)
}

fn intersect(a: ProjPoint, b: ProjPoint, k: f64, axis: Axis) -> ProjPoint {
    let i = axis as usize;
    let t = (k - a[i]) / (b[i] - a[i]);
    let mut p = [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ];
    p[i] = k;
    p
}

fn clip_half(ring: &[ProjPoint], axis: Axis, k: f64, keep_greater: bool) -> Vec<ProjPoint> {
    let i = axis as usize;
    let inside = |p: &ProjPoint| if keep_greater { p[i] >= k } else { p[i] <= k };

    let mut out = Vec::with_capacity(ring.len() + 4);
    for (n, &a) in ring.iter().enumerate() {
        let b = ring[(n + 1) % ring.len()];
        match (inside(&a), inside(&b)) {
            (true, true) => out.push(a),
            (true, false) => {
                out.push(a);
                out.push(intersect(a, b, k, axis));
            }
            (false, true) => out.push(intersect(a, b, k, axis)),
            (false, false) => {}
        }
    }
    out
}

fn clip_line_axis(line: &[ProjPoint], k1: f64, k2: f64, axis: Axis) -> Vec<Vec<ProjPoint>> {
    let i = axis as usize;
    let mut parts = Vec::new();
    let mut slice: Vec<ProjPoint> = Vec::new();

    let mut flush = |slice: &mut Vec<ProjPoint>| {
        if slice.len() >= 2 {
            parts.push(std::mem::take(slice));
        } else {
            slice.clear();
        }
    };

    for w in line.windows(2) {
        let (a, b) = (w[0], w[1]);
        let (ak, bk) = (a[i], b[i]);
        if ak < k1 {
            if bk > k1 {
                slice.push(intersect(a, b, k1, axis));
                if bk > k2 {
                    slice.push(intersect(a, b, k2, axis));
                    flush(&mut slice);
                }
            }
        } else if ak > k2 {
            if bk < k2 {
                slice.push(intersect(a, b, k2, axis));
                if bk < k1 {
                    slice.push(intersect(a, b, k1, axis));
                    flush(&mut slice);
                }
            }
        } else {
            slice.push(a);
            if bk < k1 {
                slice.push(intersect(a, b, k1, axis));
                flush(&mut slice);
            } else if bk > k2 {
                slice.push(intersect(a, b, k2, axis));
                flush(&mut slice);
            }
        }
    }

    if let Some(last) = line.last()
        && last[i] >= k1
        && last[i] <= k2
    {
        slice.push(*last);
    }
    flush(&mut slice);
    parts
}

#[cfg(test)]
mod tests {
    use super::{clip_line, clip_points, clip_ring};
    use foundation::bounds::Aabb2;

    fn unit() -> Aabb2 {
        Aabb2::new([0.0, 0.0], [1.0, 1.0])
    }

    #[test]
    fn ring_is_cut_to_bounds() {
        let ring = [
            [-1.0, -1.0, 0.0],
            [0.5, -1.0, 0.0],
            [0.5, 0.5, 0.0],
            [-1.0, 0.5, 0.0],
        ];
        let out = clip_ring(&ring, &unit());
        assert!(out.len() >= 4);
        for p in &out {
            assert!(p[0] >= 0.0 && p[0] <= 0.5);
            assert!(p[1] >= 0.0 && p[1] <= 0.5);
        }
    }

    #[test]
    fn ring_outside_disappears() {
        let ring = [[2.0, 2.0, 0.0], [3.0, 2.0, 0.0], [3.0, 3.0, 0.0]];
        assert!(clip_ring(&ring, &unit()).is_empty());
    }

    #[test]
    fn line_crossing_tile_twice_splits() {
        let line = [
            [-0.5, 0.5, 0.0],
            [0.5, 0.5, 0.0],
            [1.5, 0.5, 0.0],
            [1.5, 0.8, 0.0],
            [0.5, 0.8, 10.0],
        ];
        let parts = clip_line(&line, &unit());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].first().unwrap()[0], 0.0);
        assert_eq!(parts[0].last().unwrap()[0], 1.0);
        assert_eq!(parts[1].last().unwrap(), &[0.5, 0.8, 10.0]);
        // Altitude is interpolated along the cut segment.
        assert!((parts[1][0][2] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn points_are_filtered() {
        let pts = [[0.5, 0.5, 0.0], [1.5, 0.5, 0.0]];
        assert_eq!(clip_points(&pts, &unit()), vec![[0.5, 0.5, 0.0]]);
    }
}
