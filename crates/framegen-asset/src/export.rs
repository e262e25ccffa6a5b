//! AssetExporter: mesh + material to an optimized GLB on disk

use framegen_core::{ContentHash, Result};
use framegen_geometry::MeshBuffer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::SceneDocument;
use crate::glb::encode_glb;
use crate::material::MaterialDescriptor;
use crate::transform::TransformPipeline;

pub const GENERATOR: &str = concat!("framegen ", env!("CARGO_PKG_VERSION"));

/// Options controlling the export transform pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_true")]
    pub quantize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { quantize: true }
    }
}

/// A primary asset written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedAsset {
    pub path: PathBuf,
    pub byte_size: u64,
    pub content_hash: String,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Transforms applied, in order
    pub transforms: Vec<String>,
}

pub struct AssetExporter {
    options: ExportOptions,
    pipeline: TransformPipeline,
}

impl AssetExporter {
    pub fn new(options: ExportOptions) -> Self {
        let pipeline = TransformPipeline::standard(options.quantize);
        Self { options, pipeline }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Build, optimize and encode the document without touching disk
    pub fn encode(&self, mesh: &MeshBuffer, material: &MaterialDescriptor, name: &str) -> Result<(SceneDocument, Vec<u8>)> {
        mesh.validate()?;
        let doc = SceneDocument::from_mesh(mesh, material, name, GENERATOR);
        let doc = self.pipeline.run(doc);
        let bytes = encode_glb(&doc)?;
        Ok((doc, bytes))
    }

    /// Export to `dest`, creating parent directories as needed
    pub fn export(&self, mesh: &MeshBuffer, material: &MaterialDescriptor, dest: &Path) -> Result<ExportedAsset> {
        let name = dest
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("frame");
        let (doc, bytes) = self.encode(mesh, material, name)?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;

        let asset = ExportedAsset {
            path: dest.to_path_buf(),
            byte_size: bytes.len() as u64,
            content_hash: ContentHash::from_bytes(&bytes).to_prefixed_hex(),
            vertex_count: doc.vertex_count(),
            triangle_count: doc.triangle_count(),
            transforms: self.pipeline.names().into_iter().map(String::from).collect(),
        };
        tracing::info!(
            path = %dest.display(),
            bytes = asset.byte_size,
            vertices = asset.vertex_count,
            triangles = asset.triangle_count,
            "exported primary asset"
        );
        Ok(asset)
    }
}

impl Default for AssetExporter {
    fn default() -> Self {
        Self::new(ExportOptions::default())
    }
}
