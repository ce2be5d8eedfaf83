//! Douglas–Peucker simplification on projected coordinates.

/// Projected point: normalized x, normalized y, altitude in meters.
pub type ProjPoint = [f64; 3];

/// Keeps the first and last point and every point farther than
/// `sq_tolerance.sqrt()` from the simplified polyline.
pub fn simplify(points: &[ProjPoint], sq_tolerance: f64) -> Vec<ProjPoint> {
    if points.len() <= 2 || sq_tolerance <= 0.0 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        let mut max_sq = sq_tolerance;
        let mut index = None;
        for i in first + 1..last {
            let d = sq_seg_dist(points[i], points[first], points[last]);
            if d > max_sq {
                max_sq = d;
                index = Some(i);
            }
        }
        if let Some(i) = index {
            keep[i] = true;
            if i - first > 1 {
                stack.push((first, i));
            }
            if last - i > 1 {
                stack.push((i, last));
            }
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn sq_seg_dist(p: ProjPoint, a: ProjPoint, b: ProjPoint) -> f64 {
    let (mut x, mut y) = (a[0], a[1]);
    let dx = b[0] - x;
    let dy = b[1] - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((p[0] - x) * dx + (p[1] - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = b[0];
            y = b[1];
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    let dx = p[0] - x;
    let dy = p[1] - y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::simplify;

    #[test]
    fn drops_collinear_points() {
        let line = [
            [0.0, 0.0, 0.0],
            [1.0, 0.001, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 2.0, 0.0],
        ];
        let out = simplify(&line, 0.01);
        assert_eq!(out, vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 2.0, 0.0]]);
    }

    #[test]
    fn zero_tolerance_is_identity() {
        let line = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(simplify(&line, 0.0), line.to_vec());
    }
}
