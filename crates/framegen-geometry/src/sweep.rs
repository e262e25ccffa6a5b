//! Sweeping a cross section along one edge of the frame rectangle

use framegen_core::{Vec2, Vec3};

use crate::mesh::MeshBuffer;
use crate::profile::CrossSection;
use crate::triangulate::triangulate;

/// Path length covered by one sweep step on curved profiles, in meters
pub const STEP_LENGTH: f32 = 0.05;

/// Upper bound on sweep steps per edge
pub const MAX_STEPS: usize = 64;

/// The four straight edges of the outer rectangle, in sweep order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameEdge {
    Top,
    Right,
    Bottom,
    Left,
}

impl FrameEdge {
    pub const ALL: [FrameEdge; 4] = [
        FrameEdge::Top,
        FrameEdge::Right,
        FrameEdge::Bottom,
        FrameEdge::Left,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameEdge::Top => "top",
            FrameEdge::Right => "right",
            FrameEdge::Bottom => "bottom",
            FrameEdge::Left => "left",
        }
    }

    /// Two-point sweep path for this edge of a `width` x `height` rectangle
    /// whose lower-left corner sits at the origin. Edges run clockwise when
    /// seen from +Z, with `inward` pointing toward the opening.
    pub fn path(&self, width: f32, height: f32) -> EdgePath {
        let (w, h) = (width, height);
        let (start, end, inward) = match self {
            FrameEdge::Top => (Vec3::new(0.0, h, 0.0), Vec3::new(w, h, 0.0), Vec3::new(0.0, -1.0, 0.0)),
            FrameEdge::Right => (Vec3::new(w, h, 0.0), Vec3::new(w, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
            FrameEdge::Bottom => (Vec3::new(w, 0.0, 0.0), Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0)),
            FrameEdge::Left => (Vec3::ZERO, Vec3::new(0.0, h, 0.0), Vec3::new(1.0, 0.0, 0.0)),
        };
        EdgePath { start, end, inward }
    }
}

impl std::fmt::Display for FrameEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Straight sweep path along the outer boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePath {
    pub start: Vec3,
    pub end: Vec3,
    /// Unit vector pointing from the outer boundary toward the opening
    pub inward: Vec3,
}

impl EdgePath {
    pub fn length(&self) -> f32 {
        (self.end - self.start).length()
    }

    pub fn direction(&self) -> Vec3 {
        (self.end - self.start).normalized()
    }

    /// World position of profile point `p` at path parameter `s` in [0, 1].
    ///
    /// The inset `p.x` shortens the edge at both ends, which places the
    /// end faces on the 45 degree mitre planes shared with the neighbours.
    pub fn point(&self, p: Vec2, s: f32) -> Vec3 {
        let dir = self.direction();
        let along = p.x + s * (self.length() - 2.0 * p.x);
        self.start + dir * along + self.inward * p.x + Vec3::Z * p.y
    }

    /// True when (u, v, path) forms a left-handed frame in world space,
    /// in which case every locally CCW triangle must be reversed
    fn mirrored(&self) -> bool {
        self.direction().cross(&self.inward).dot(&Vec3::Z) < 0.0
    }
}

/// Sweep steps for a path: one for straight profiles, length based for curves
pub fn steps_for(length: f32, curved: bool) -> usize {
    if !curved || !length.is_finite() {
        return 1;
    }
    ((length / STEP_LENGTH).ceil() as usize).clamp(1, MAX_STEPS)
}

/// Extrude `section` along `path`, producing side walls and both end caps
pub fn extrude(section: &CrossSection, path: &EdgePath) -> MeshBuffer {
    let steps = steps_for(path.length(), section.curved);
    let mirrored = path.mirrored();
    let mut mesh = MeshBuffer::new();

    let push_tri = |mesh: &mut MeshBuffer, a: u32, b: u32, c: u32| {
        if mirrored {
            mesh.push_triangle(a, c, b);
        } else {
            mesh.push_triangle(a, b, c);
        }
    };

    for contour in section.contours() {
        let n = contour.len();
        if n < 2 {
            continue;
        }
        let total: f32 = (0..n).map(|i| (contour[(i + 1) % n] - contour[i]).length()).sum();
        let total = if total > 0.0 { total } else { 1.0 };
        let mut perimeter = 0.0;
        for i in 0..n {
            let (a, b) = (contour[i], contour[(i + 1) % n]);
            let seg_len = (b - a).length();

            let a0 = path.point(a, 0.0);
            let mut normal = (path.point(b, 0.0) - a0).cross(&(path.point(a, 1.0) - a0)).normalized();
            if mirrored {
                normal = -normal;
            }

            let base = mesh.vertex_count() as u32;
            for k in 0..=steps {
                let s = k as f32 / steps as f32;
                mesh.push_vertex(path.point(a, s), normal, [s, perimeter / total]);
                mesh.push_vertex(path.point(b, s), normal, [s, (perimeter + seg_len) / total]);
            }
            for k in 0..steps as u32 {
                let a0 = base + 2 * k;
                let (b0, a1, b1) = (a0 + 1, a0 + 2, a0 + 3);
                push_tri(&mut mesh, a0, b0, b1);
                push_tri(&mut mesh, a0, b1, a1);
            }
            perimeter += seg_len;
        }
    }

    // cap texture coordinates span the section's bounding box
    let (lo, hi) = section.bounds();
    let extent = Vec2::new((hi.x - lo.x).max(f32::EPSILON), (hi.y - lo.y).max(f32::EPSILON));
    let cap_tris = triangulate(&section.outer, &section.holes);
    let dir = path.direction();
    let caps = [
        (0.0, (path.inward - dir).normalized(), true),
        (1.0, (path.inward + dir).normalized(), false),
    ];
    for (s, normal, reversed) in caps {
        let base = mesh.vertex_count() as u32;
        for contour in section.contours() {
            for &p in contour {
                let uv = [(p.x - lo.x) / extent.x, (p.y - lo.y) / extent.y];
                mesh.push_vertex(path.point(p, s), normal, uv);
            }
        }
        for t in &cap_tris {
            let (a, b, c) = (base + t[0], base + t[1], base + t[2]);
            if reversed {
                push_tri(&mut mesh, a, c, b);
            } else {
                push_tri(&mut mesh, a, b, c);
            }
        }
    }

    mesh
}
