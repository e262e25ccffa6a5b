//! FrameGen Geometry - Procedural frame meshes
//!
//! Builds a 2D cross section for a molding profile, sweeps it along the
//! four edges of the outer rectangle with mitred corners, and merges the
//! result into a single indexed `MeshBuffer`.

pub mod mesh;
pub mod profile;
pub mod sweep;
mod synth;
pub mod triangulate;

pub use mesh::{MeshBounds, MeshBuffer};
pub use profile::{build_cross_section, CrossSection, ProfileParams, SanitizedProfile, INCH_TO_METERS};
pub use sweep::{EdgePath, FrameEdge};
pub use synth::{synthesize, synthesize_edges, synthesize_spec, EdgeMesh};
