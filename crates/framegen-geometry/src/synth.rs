//! Profile geometry synthesis: cross section, four mitred edges, one mesh

use framegen_core::FrameSpec;

use crate::mesh::MeshBuffer;
use crate::profile::{build_cross_section, ProfileParams, INCH_TO_METERS};
use crate::sweep::{extrude, FrameEdge};

/// One swept edge of the frame
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMesh {
    pub edge: FrameEdge,
    pub mesh: MeshBuffer,
}

/// Build the four per-edge meshes, in meters, before merging.
///
/// Input lengths are inches. Out-of-range parameters are clamped and
/// logged rather than rejected.
pub fn synthesize_edges(profile: &ProfileParams, outer_width: f32, outer_height: f32) -> Vec<EdgeMesh> {
    let clean = profile.sanitize(outer_width, outer_height);
    for note in &clean.adjustments {
        tracing::warn!(profile = %profile.profile, "{}", note);
    }

    let params = clean.params.scaled(INCH_TO_METERS);
    let width = clean.outer_width * INCH_TO_METERS;
    let height = clean.outer_height * INCH_TO_METERS;
    let section = build_cross_section(&params);

    FrameEdge::ALL
        .iter()
        .map(|&edge| EdgeMesh {
            edge,
            mesh: extrude(&section, &edge.path(width, height)),
        })
        .collect()
}

/// Synthesize the merged, recentered frame mesh.
///
/// Deterministic: identical inputs produce identical buffers.
pub fn synthesize(profile: &ProfileParams, outer_width: f32, outer_height: f32) -> MeshBuffer {
    let edges = synthesize_edges(profile, outer_width, outer_height);
    let parts: Vec<MeshBuffer> = edges.into_iter().map(|e| e.mesh).collect();

    let mut mesh = MeshBuffer::merge(&parts);
    mesh.recompute_normals();
    mesh.recenter();

    tracing::debug!(
        profile = %profile.profile,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "synthesized frame mesh"
    );
    mesh
}

/// Synthesize the mesh described by a frame spec
pub fn synthesize_spec(spec: &FrameSpec) -> MeshBuffer {
    synthesize(&ProfileParams::from_spec(spec), spec.outer_width, spec.outer_height)
}
