//! In-memory scene document
//!
//! A small, glTF-shaped value that the optimization transforms operate on
//! before it is encoded to GLB.

use framegen_geometry::MeshBuffer;
use std::collections::BTreeSet;

use crate::material::MaterialDescriptor;

/// glTF extension name for quantized vertex attributes
pub const KHR_MESH_QUANTIZATION: &str = "KHR_mesh_quantization";

#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    pub generator: String,
    pub scenes: Vec<Scene>,
    pub default_scene: Option<usize>,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub animations: Vec<Animation>,
    pub extensions_used: BTreeSet<String>,
    pub extensions_required: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub name: String,
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    pub translation: [f32; 3],
    pub scale: [f32; 3],
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mesh: None,
            children: Vec::new(),
            translation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

/// Triangle list with float attributes, optionally replaced by a quantized
/// encoding at export time
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
    pub quantized: Option<QuantizedAttributes>,
}

impl Primitive {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Normalized integer vertex data (positions are divided by the node scale)
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedAttributes {
    pub positions: Vec<[i16; 3]>,
    pub normals: Vec<[i8; 3]>,
    /// Texture coordinates stay float when any falls outside [0, 1]
    pub uvs: Option<Vec<[u16; 2]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub alpha_mode: String,
    pub double_sided: bool,
}

impl From<&MaterialDescriptor> for Material {
    fn from(desc: &MaterialDescriptor) -> Self {
        Self {
            name: desc.name.clone(),
            base_color: desc.base_color,
            metallic: desc.metallic,
            roughness: desc.roughness,
            alpha_mode: desc.alpha_mode().to_string(),
            double_sided: desc.is_transparent(),
        }
    }
}

/// Linear translation animation for one node
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub channels: Vec<TranslationChannel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationChannel {
    pub node: usize,
    pub times: Vec<f32>,
    pub values: Vec<[f32; 3]>,
}

impl SceneDocument {
    pub fn empty(generator: &str) -> Self {
        Self {
            generator: generator.to_string(),
            scenes: Vec::new(),
            default_scene: None,
            nodes: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            animations: Vec::new(),
            extensions_used: BTreeSet::new(),
            extensions_required: BTreeSet::new(),
        }
    }

    /// One scene, one node, one mesh, one material
    pub fn from_mesh(mesh: &MeshBuffer, material: &MaterialDescriptor, name: &str, generator: &str) -> Self {
        let primitive = Primitive {
            positions: mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect(),
            normals: mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]).collect(),
            uvs: mesh.uvs.chunks_exact(2).map(|t| [t[0], t[1]]).collect(),
            indices: mesh.indices.clone(),
            material: Some(0),
            quantized: None,
        };

        let mut node = Node::new(name);
        node.mesh = Some(0);

        let mut doc = Self::empty(generator);
        doc.scenes.push(Scene {
            name: name.to_string(),
            nodes: vec![0],
        });
        doc.default_scene = Some(0);
        doc.nodes.push(node);
        doc.meshes.push(Mesh {
            name: name.to_string(),
            primitives: vec![primitive],
        });
        doc.materials.push(Material::from(material));
        doc
    }

    pub fn vertex_count(&self) -> usize {
        self.primitives().map(|p| p.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives().map(|p| p.triangle_count()).sum()
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.meshes.iter().flat_map(|m| m.primitives.iter())
    }

    pub fn require_extension(&mut self, name: &str) {
        self.extensions_used.insert(name.to_string());
        self.extensions_required.insert(name.to_string());
    }
}
