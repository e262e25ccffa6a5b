//! Frame profile parameters and 2D cross sections
//!
//! A cross section lives in the molding's local plane: `x` (the `u` axis)
//! runs across the molding face from the outer edge inward, `y` (the `v`
//! axis) runs along the depth from the back face toward the viewer.

use framegen_core::{FrameSpec, ProfileType, Vec2};

/// Inches to meters
pub const INCH_TO_METERS: f32 = 0.0254;

/// Minimum depth of a shadowbox cavity, in inches
pub const MIN_SHADOWBOX_DEPTH: f32 = 1.5;

/// Lip height used by float profiles when none is given, in inches
pub const DEFAULT_LIP_HEIGHT: f32 = 0.25;

/// Smallest length any profile dimension is clamped to, in inches
pub const MIN_DIMENSION: f32 = 0.05;

/// Cuts (rabbets, lips) may consume at most this share of the molding
const MAX_CUT_RATIO: f32 = 0.9;

/// The molding may cover at most this share of the smaller outer side
const MAX_MOLDING_RATIO: f32 = 0.45;

const FLOAT_WALL_RATIO: f32 = 0.4;
/// Lip share of the depth when building unsanitized float profiles
const FLOAT_DEFAULT_LIP_RATIO: f32 = 0.25;
const STEPPED_DEFAULT_WIDTH_RATIO: f32 = 0.25;
const STEPPED_DEFAULT_DEPTH_RATIO: f32 = 0.5;
const ORNATE_TOP_BULGE: f32 = 0.25;
const ORNATE_BOTTOM_BULGE: f32 = 0.1;
const MAX_DETAIL_SCALE: f32 = 4.0;

/// Segments used to discretize each quadratic curve
pub const CURVE_SEGMENTS: usize = 12;

/// Shape parameters of a frame molding
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileParams {
    pub profile: ProfileType,
    pub molding_width: f32,
    pub molding_depth: f32,
    pub rabbet_width: Option<f32>,
    pub rabbet_depth: Option<f32>,
    pub lip_height: Option<f32>,
    pub detail_scale: Option<f32>,
}

/// Profile parameters after clamping, together with the outer size they apply to
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedProfile {
    pub params: ProfileParams,
    pub outer_width: f32,
    pub outer_height: f32,
    /// One human-readable note per value that had to be adjusted
    pub adjustments: Vec<String>,
}

impl ProfileParams {
    pub fn new(profile: ProfileType, molding_width: f32, molding_depth: f32) -> Self {
        Self {
            profile,
            molding_width,
            molding_depth,
            rabbet_width: None,
            rabbet_depth: None,
            lip_height: None,
            detail_scale: None,
        }
    }

    pub fn from_spec(spec: &FrameSpec) -> Self {
        Self {
            profile: spec.profile,
            molding_width: spec.molding_width,
            molding_depth: spec.molding_depth,
            rabbet_width: spec.rabbet_width,
            rabbet_depth: spec.rabbet_depth,
            lip_height: spec.lip_height,
            detail_scale: spec.detail_scale,
        }
    }

    pub fn with_rabbet(mut self, width: f32, depth: f32) -> Self {
        self.rabbet_width = Some(width);
        self.rabbet_depth = Some(depth);
        self
    }

    pub fn with_lip_height(mut self, lip: f32) -> Self {
        self.lip_height = Some(lip);
        self
    }

    pub fn with_detail_scale(mut self, scale: f32) -> Self {
        self.detail_scale = Some(scale);
        self
    }

    /// Clamp every dimension into a range that yields non-degenerate geometry.
    ///
    /// Inputs are inches. Non-finite values are replaced by the minimum.
    pub fn sanitize(&self, outer_width: f32, outer_height: f32) -> SanitizedProfile {
        let mut notes = Vec::new();

        let outer_w = clamp_noted("outer_width", outer_width, 4.0 * MIN_DIMENSION, f32::MAX, &mut notes);
        let outer_h = clamp_noted("outer_height", outer_height, 4.0 * MIN_DIMENSION, f32::MAX, &mut notes);

        let max_molding = (outer_w.min(outer_h) * MAX_MOLDING_RATIO).max(MIN_DIMENSION);
        let w = clamp_noted("molding_width", self.molding_width, MIN_DIMENSION, max_molding, &mut notes);

        let min_depth = if self.profile == ProfileType::Shadowbox {
            MIN_SHADOWBOX_DEPTH
        } else {
            MIN_DIMENSION
        };
        let d = clamp_noted("molding_depth", self.molding_depth, min_depth, f32::MAX, &mut notes);

        let max_cut_w = (w * MAX_CUT_RATIO).max(MIN_DIMENSION);
        let max_cut_d = (d * MAX_CUT_RATIO).max(MIN_DIMENSION);

        // A zero or negative rabbet means "no rabbet" rather than a clamp
        let rabbet_width = self
            .rabbet_width
            .filter(|v| *v > 0.0)
            .map(|v| clamp_noted("rabbet_width", v, MIN_DIMENSION, max_cut_w, &mut notes));
        let rabbet_depth = self
            .rabbet_depth
            .filter(|v| *v > 0.0)
            .map(|v| clamp_noted("rabbet_depth", v, MIN_DIMENSION, max_cut_d, &mut notes));
        let lip_default = (self.profile == ProfileType::Float).then_some(DEFAULT_LIP_HEIGHT);
        let lip_height = self
            .lip_height
            .or(lip_default)
            .map(|v| clamp_noted("lip_height", v, MIN_DIMENSION, max_cut_d, &mut notes));
        let detail_scale = self
            .detail_scale
            .map(|v| clamp_noted("detail_scale", v, 0.0, MAX_DETAIL_SCALE, &mut notes));

        SanitizedProfile {
            params: ProfileParams {
                profile: self.profile,
                molding_width: w,
                molding_depth: d,
                rabbet_width,
                rabbet_depth,
                lip_height,
                detail_scale,
            },
            outer_width: outer_w,
            outer_height: outer_h,
            adjustments: notes,
        }
    }

    /// Multiply every length by `factor` (used for the inch to meter conversion)
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            profile: self.profile,
            molding_width: self.molding_width * factor,
            molding_depth: self.molding_depth * factor,
            rabbet_width: self.rabbet_width.map(|v| v * factor),
            rabbet_depth: self.rabbet_depth.map(|v| v * factor),
            lip_height: self.lip_height.map(|v| v * factor),
            detail_scale: self.detail_scale,
        }
    }
}

fn clamp_noted(field: &str, value: f32, min: f32, max: f32, notes: &mut Vec<String>) -> f32 {
    let clamped = if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    };
    if clamped != value {
        notes.push(format!("{} {} clamped to {}", field, value, clamped));
    }
    clamped
}

/// Closed 2D profile: one CCW outer contour plus optional CW holes
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub outer: Vec<Vec2>,
    pub holes: Vec<Vec<Vec2>>,
    /// True when the outline contains discretized curves
    pub curved: bool,
}

impl CrossSection {
    /// Outer contour followed by each hole
    pub fn contours(&self) -> impl Iterator<Item = &[Vec2]> {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(|h| h.as_slice()))
    }

    pub fn point_count(&self) -> usize {
        self.contours().map(|c| c.len()).sum()
    }

    /// Net enclosed area (outer minus holes)
    pub fn area(&self) -> f32 {
        signed_area(&self.outer) + self.holes.iter().map(|h| signed_area(h)).sum::<f32>()
    }

    /// Min and max corners of the outer contour
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let mut min = Vec2::new(f32::MAX, f32::MAX);
        let mut max = Vec2::new(f32::MIN, f32::MIN);
        for p in &self.outer {
            min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        }
        (min, max)
    }
}

/// Shoelace area; positive for counter-clockwise polygons
pub fn signed_area(poly: &[Vec2]) -> f32 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        sum += poly[i].cross(&poly[(i + 1) % n]);
    }
    sum * 0.5
}

fn oriented(mut poly: Vec<Vec2>, ccw: bool) -> Vec<Vec2> {
    if (signed_area(&poly) > 0.0) != ccw {
        poly.reverse();
    }
    poly
}

/// Build the cross section for already-sanitized parameters.
///
/// Lengths are used as given; callers convert units first.
pub fn build_cross_section(params: &ProfileParams) -> CrossSection {
    let w = params.molding_width;
    let d = params.molding_depth;

    let section = match params.profile {
        ProfileType::Flat | ProfileType::Shadowbox => flat(w, d, params.rabbet_width, params.rabbet_depth),
        ProfileType::Stepped => stepped(
            w,
            d,
            params.rabbet_width.unwrap_or(w * STEPPED_DEFAULT_WIDTH_RATIO),
            params.rabbet_depth.unwrap_or(d * STEPPED_DEFAULT_DEPTH_RATIO),
        ),
        ProfileType::Float => float(
            w,
            d,
            params.lip_height.unwrap_or(d * FLOAT_DEFAULT_LIP_RATIO),
        ),
        ProfileType::Ornate => ornate(w, d, params.detail_scale.unwrap_or(1.0)),
        ProfileType::CanvasWrap => CrossSection {
            outer: rectangle(0.0, 0.0, w, d),
            holes: Vec::new(),
            curved: false,
        },
    };

    CrossSection {
        outer: oriented(section.outer, true),
        holes: section
            .holes
            .into_iter()
            .map(|h| oriented(h, false))
            .collect(),
        curved: section.curved,
    }
}

fn rectangle(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<Vec2> {
    vec![
        Vec2::new(x0, y0),
        Vec2::new(x1, y0),
        Vec2::new(x1, y1),
        Vec2::new(x0, y1),
    ]
}

fn flat(w: f32, d: f32, rabbet_w: Option<f32>, rabbet_d: Option<f32>) -> CrossSection {
    let holes = match (rabbet_w, rabbet_d) {
        (Some(rw), Some(rd)) => {
            let (cx, cy) = (w * 0.5, d * 0.5);
            vec![rectangle(cx - rw * 0.5, cy - rd * 0.5, cx + rw * 0.5, cy + rd * 0.5)]
        }
        _ => Vec::new(),
    };
    CrossSection {
        outer: rectangle(0.0, 0.0, w, d),
        holes,
        curved: false,
    }
}

/// Rabbet cut out of the inner back corner
fn stepped(w: f32, d: f32, rw: f32, rd: f32) -> CrossSection {
    CrossSection {
        outer: vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(w - rw, 0.0),
            Vec2::new(w - rw, rd),
            Vec2::new(w, rd),
            Vec2::new(w, d),
            Vec2::new(0.0, d),
        ],
        holes: Vec::new(),
        curved: false,
    }
}

/// Full-depth outer wall with a lowered inner shelf
fn float(w: f32, d: f32, lip: f32) -> CrossSection {
    let wall = w * FLOAT_WALL_RATIO;
    let shelf = d - lip;
    CrossSection {
        outer: vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(w, 0.0),
            Vec2::new(w, shelf),
            Vec2::new(wall, shelf),
            Vec2::new(wall, d),
            Vec2::new(0.0, d),
        ],
        holes: Vec::new(),
        curved: false,
    }
}

/// Rectangle with quadratic bulges on the front and back faces
fn ornate(w: f32, d: f32, scale: f32) -> CrossSection {
    let top = d * ORNATE_TOP_BULGE * scale;
    let bottom = d * ORNATE_BOTTOM_BULGE * scale;

    let mut outer = Vec::with_capacity(2 * CURVE_SEGMENTS + 2);
    // back face, left to right, bulging away from the viewer
    outer.extend(quadratic(
        Vec2::new(0.0, 0.0),
        Vec2::new(w * 0.5, -bottom),
        Vec2::new(w, 0.0),
        CURVE_SEGMENTS,
    ));
    // front face, right to left, bulging toward the viewer
    outer.extend(quadratic(
        Vec2::new(w, d),
        Vec2::new(w * 0.5, d + top),
        Vec2::new(0.0, d),
        CURVE_SEGMENTS,
    ));

    CrossSection {
        outer,
        holes: Vec::new(),
        curved: scale > 0.0,
    }
}

/// Sample a quadratic Bézier including both endpoints
fn quadratic(p0: Vec2, control: Vec2, p1: Vec2, segments: usize) -> Vec<Vec2> {
    (0..=segments)
        .map(|i| {
            let t = i as f32 / segments as f32;
            let mt = 1.0 - t;
            p0 * (mt * mt) + control * (2.0 * mt * t) + p1 * (t * t)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meters(params: ProfileParams) -> CrossSection {
        let clean = params.sanitize(30.0, 40.0);
        build_cross_section(&clean.params.scaled(INCH_TO_METERS))
    }

    #[test]
    fn test_flat_with_rabbet_has_centered_hole() {
        let section = build_cross_section(
            &ProfileParams::new(ProfileType::Flat, 1.5, 0.75).with_rabbet(0.25, 0.25),
        );
        assert_eq!(section.holes.len(), 1);
        let hole = &section.holes[0];
        assert!(signed_area(hole) < 0.0);
        let cx = hole.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = hole.iter().map(|p| p.y).sum::<f32>() / 4.0;
        assert!((cx - 0.75).abs() < 1e-6);
        assert!((cy - 0.375).abs() < 1e-6);
        assert!((section.area() - (1.5 * 0.75 - 0.0625)).abs() < 1e-5);
    }

    #[test]
    fn test_flat_without_rabbet_depth_has_no_hole() {
        let mut params = ProfileParams::new(ProfileType::Flat, 1.5, 0.75);
        params.rabbet_width = Some(0.25);
        assert!(build_cross_section(&params).holes.is_empty());
    }

    #[test]
    fn test_all_outer_contours_are_ccw() {
        for profile in ProfileType::ALL {
            let section = meters(ProfileParams::new(profile, 1.5, 0.75).with_rabbet(0.25, 0.25));
            assert!(signed_area(&section.outer) > 0.0, "{} not CCW", profile);
            assert!(section.area() > 0.0, "{} has no area", profile);
        }
    }

    #[test]
    fn test_stepped_is_hexagon() {
        let section = build_cross_section(&ProfileParams::new(ProfileType::Stepped, 2.0, 1.0));
        assert_eq!(section.outer.len(), 6);
        // default cut: a quarter of the width, half the depth
        assert!((section.area() - (2.0 - 0.5 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_float_shelf_uses_lip_height() {
        let section = build_cross_section(
            &ProfileParams::new(ProfileType::Float, 2.0, 1.0).with_lip_height(0.4),
        );
        assert_eq!(section.outer.len(), 6);
        assert!(section.outer.iter().any(|p| (p.y - 0.6).abs() < 1e-6));
    }

    #[test]
    fn test_ornate_is_curved_and_bulges() {
        let section = build_cross_section(
            &ProfileParams::new(ProfileType::Ornate, 2.0, 1.0).with_detail_scale(2.0),
        );
        assert!(section.curved);
        assert_eq!(section.outer.len(), 2 * (CURVE_SEGMENTS + 1));
        let (min, max) = section.bounds();
        assert!(max.y > 1.0);
        assert!(min.y < 0.0);
    }

    #[test]
    fn test_shadowbox_depth_is_clamped() {
        let clean = ProfileParams::new(ProfileType::Shadowbox, 1.5, 0.5).sanitize(20.0, 20.0);
        assert_eq!(clean.params.molding_depth, MIN_SHADOWBOX_DEPTH);
        assert_eq!(clean.adjustments.len(), 1);
    }

    #[test]
    fn test_oversized_rabbet_is_clamped() {
        let clean = ProfileParams::new(ProfileType::Flat, 1.0, 0.5)
            .with_rabbet(3.0, 0.25)
            .sanitize(20.0, 20.0);
        assert!((clean.params.rabbet_width.unwrap() - 0.9).abs() < 1e-6);
        assert!(clean.adjustments[0].starts_with("rabbet_width"));
    }

    #[test]
    fn test_molding_wider_than_frame_is_clamped() {
        let clean = ProfileParams::new(ProfileType::Flat, 10.0, 0.5).sanitize(8.0, 12.0);
        assert!((clean.params.molding_width - 3.6).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_values_fall_back_to_minimum() {
        let clean = ProfileParams::new(ProfileType::CanvasWrap, f32::NAN, 0.5).sanitize(8.0, 8.0);
        assert_eq!(clean.params.molding_width, MIN_DIMENSION);
    }

    #[test]
    fn test_float_gets_default_lip() {
        let clean = ProfileParams::new(ProfileType::Float, 1.5, 1.0).sanitize(20.0, 20.0);
        assert_eq!(clean.params.lip_height, Some(DEFAULT_LIP_HEIGHT));
        assert!(clean.adjustments.is_empty());
    }

    #[test]
    fn test_zero_rabbet_means_none() {
        let clean = ProfileParams::new(ProfileType::Flat, 1.0, 0.5)
            .with_rabbet(0.0, 0.25)
            .sanitize(20.0, 20.0);
        assert!(clean.params.rabbet_width.is_none());
        assert!(clean.adjustments.is_empty());
    }
}
