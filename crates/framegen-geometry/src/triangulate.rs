//! Ear-clipping triangulation for cross-section end caps

use framegen_core::Vec2;

const EPSILON: f32 = 1e-9;

/// Triangulate a CCW outer contour with optional CW holes.
///
/// Returned indices address the concatenation of `outer` followed by each
/// hole in order. Triangles are counter-clockwise. The loop removes one
/// vertex per iteration, so it terminates even on degenerate input; in that
/// case the output may not cover the whole polygon.
pub fn triangulate(outer: &[Vec2], holes: &[Vec<Vec2>]) -> Vec<[u32; 3]> {
    let mut points: Vec<Vec2> = outer.to_vec();
    let mut ring: Vec<usize> = (0..outer.len()).collect();

    // Bridge holes rightmost first so earlier bridges never cross later ones
    let mut offsets = Vec::with_capacity(holes.len());
    for hole in holes {
        offsets.push(points.len());
        points.extend_from_slice(hole);
    }
    let mut order: Vec<usize> = (0..holes.len()).filter(|&h| holes[h].len() >= 3).collect();
    order.sort_by(|&a, &b| max_x(&holes[b]).total_cmp(&max_x(&holes[a])));
    for h in order {
        let hole: Vec<usize> = (offsets[h]..offsets[h] + holes[h].len()).collect();
        ring = bridge_hole(&points, ring, &hole);
    }

    clip_ears(&points, ring)
}

fn max_x(poly: &[Vec2]) -> f32 {
    poly.iter().fold(f32::MIN, |acc, p| acc.max(p.x))
}

/// Splice `hole` into `ring` through a pair of coincident bridge edges
fn bridge_hole(points: &[Vec2], ring: Vec<usize>, hole: &[usize]) -> Vec<usize> {
    let Some(start) = (0..hole.len()).max_by(|&a, &b| points[hole[a]].x.total_cmp(&points[hole[b]].x))
    else {
        return ring;
    };
    let m = points[hole[start]];

    let Some(anchor) = find_bridge_anchor(points, &ring, m) else {
        tracing::debug!("no visible bridge vertex for hole, leaving it unfilled");
        return ring;
    };

    let mut merged = Vec::with_capacity(ring.len() + hole.len() + 2);
    merged.extend_from_slice(&ring[..=anchor]);
    for k in 0..=hole.len() {
        merged.push(hole[(start + k) % hole.len()]);
    }
    merged.extend_from_slice(&ring[anchor..]);
    merged
}

/// Position in `ring` of the vertex the hole point `m` connects to
fn find_bridge_anchor(points: &[Vec2], ring: &[usize], m: Vec2) -> Option<usize> {
    let n = ring.len();
    let mut best_x = f32::MAX;
    let mut candidate = None;
    let mut hit = Vec2::default();

    // Cast a ray toward +x and keep the nearest crossing edge
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[(i + 1) % n]];
        if (a.y > m.y) == (b.y > m.y) {
            continue;
        }
        let t = (m.y - a.y) / (b.y - a.y);
        let x = a.x + t * (b.x - a.x);
        if x >= m.x && x < best_x {
            best_x = x;
            hit = Vec2::new(x, m.y);
            candidate = Some(if a.x > b.x { i } else { (i + 1) % n });
        }
    }
    let mut anchor = candidate?;
    let p = points[ring[anchor]];
    if p.y == m.y && p.x == hit.x {
        return Some(anchor);
    }

    // A vertex inside (m, hit, p) would block the bridge; take the one
    // closest in angle to the ray instead
    let mut best_tan = f32::MAX;
    for (pos, &idx) in ring.iter().enumerate() {
        let q = points[idx];
        if pos == anchor || !point_in_triangle_inclusive(q, m, hit, p) {
            continue;
        }
        let dx = q.x - m.x;
        if dx <= 0.0 {
            continue;
        }
        let tan = (q.y - m.y).abs() / dx;
        if tan < best_tan {
            best_tan = tan;
            anchor = pos;
        }
    }
    Some(anchor)
}

fn clip_ears(points: &[Vec2], mut ring: Vec<usize>) -> Vec<[u32; 3]> {
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));
    let mut cursor = 0;
    let mut stalled = 0;

    while ring.len() > 3 {
        let n = ring.len();
        let i = cursor % n;
        let (prev, cur, next) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
        let (a, b, c) = (points[prev], points[cur], points[next]);
        let turn = (b - a).cross(&(c - b));

        if turn.abs() <= EPSILON {
            // collinear or coincident; dropping it loses no area
            ring.remove(i);
            stalled = 0;
            continue;
        }

        if turn > 0.0 && !ring_has_point_inside(points, &ring, [prev, cur, next], a, b, c) {
            triangles.push([prev as u32, cur as u32, next as u32]);
            ring.remove(i);
            stalled = 0;
            continue;
        }

        cursor = i + 1;
        stalled += 1;
        if stalled >= n {
            // No valid ear: self-intersecting input. Clip anyway to terminate.
            tracing::debug!(remaining = n, "forcing ear on degenerate contour");
            if turn > 0.0 {
                triangles.push([prev as u32, cur as u32, next as u32]);
            }
            ring.remove(i);
            stalled = 0;
        }
    }

    if ring.len() == 3 {
        let (a, b, c) = (points[ring[0]], points[ring[1]], points[ring[2]]);
        if (b - a).cross(&(c - a)) > EPSILON {
            triangles.push([ring[0] as u32, ring[1] as u32, ring[2] as u32]);
        }
    }
    triangles
}

fn ring_has_point_inside(
    points: &[Vec2],
    ring: &[usize],
    corners: [usize; 3],
    a: Vec2,
    b: Vec2,
    c: Vec2,
) -> bool {
    ring.iter().any(|&idx| {
        if corners.contains(&idx) {
            return false;
        }
        let p = points[idx];
        // bridge duplicates share a position with a corner
        if p == a || p == b || p == c {
            return false;
        }
        point_in_triangle_inclusive(p, a, b, c)
    })
}

fn point_in_triangle_inclusive(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = (b - a).cross(&(p - a));
    let d2 = (c - b).cross(&(p - b));
    let d3 = (a - c).cross(&(p - c));
    let has_neg = d1 < -EPSILON || d2 < -EPSILON || d3 < -EPSILON;
    let has_pos = d1 > EPSILON || d2 > EPSILON || d3 > EPSILON;
    !(has_neg && has_pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::signed_area;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Vec2> {
        vec![
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ]
    }

    fn area_of(points: &[Vec2], tris: &[[u32; 3]]) -> f32 {
        tris.iter()
            .map(|t| {
                let (a, b, c) = (points[t[0] as usize], points[t[1] as usize], points[t[2] as usize]);
                (b - a).cross(&(c - a)) * 0.5
            })
            .sum()
    }

    #[test]
    fn test_square() {
        let square = rect(0.0, 0.0, 1.0, 1.0);
        let tris = triangulate(&square, &[]);
        assert_eq!(tris.len(), 2);
        assert!((area_of(&square, &tris) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_concave_hexagon() {
        let step = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.5, 0.0),
            Vec2::new(1.5, 0.5),
            Vec2::new(2.0, 0.5),
            Vec2::new(2.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tris = triangulate(&step, &[]);
        assert_eq!(tris.len(), 4);
        assert!((area_of(&step, &tris) - signed_area(&step)).abs() < 1e-6);
        for t in &tris {
            let (a, b, c) = (step[t[0] as usize], step[t[1] as usize], step[t[2] as usize]);
            assert!((b - a).cross(&(c - a)) > 0.0);
        }
    }

    #[test]
    fn test_rectangle_with_hole() {
        let outer = rect(0.0, 0.0, 4.0, 2.0);
        let mut hole = rect(1.5, 0.5, 2.5, 1.5);
        hole.reverse();
        let tris = triangulate(&outer, &[hole.clone()]);

        let mut points = outer.clone();
        points.extend_from_slice(&hole);
        assert!(tris.len() >= 6);
        assert!((area_of(&points, &tris) - 7.0).abs() < 1e-5);
        assert!(tris.iter().flatten().all(|&i| (i as usize) < points.len()));
    }

    #[test]
    fn test_collinear_points_are_dropped() {
        let poly = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tris = triangulate(&poly, &[]);
        assert!((area_of(&poly, &tris) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_input_terminates() {
        let bowtie = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        let tris = triangulate(&bowtie, &[]);
        assert!(tris.len() <= 2);
        assert!(triangulate(&[], &[]).is_empty());
    }
}
