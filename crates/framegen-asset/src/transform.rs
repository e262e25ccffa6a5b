//! Document optimization passes
//!
//! Each pass is a named pure function from one `SceneDocument` to the next.
//! `TransformPipeline::standard` runs them in the export order: dedup,
//! prune, quantize, resample.

use std::collections::HashMap;

use crate::document::{
    Animation, Material, Node, QuantizedAttributes, SceneDocument, TranslationChannel,
    KHR_MESH_QUANTIZATION,
};

/// A named, independently testable document pass
pub trait DocumentTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, doc: SceneDocument) -> SceneDocument;
}

/// Ordered list of transforms
pub struct TransformPipeline {
    transforms: Vec<Box<dyn DocumentTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// dedup, prune, quantize (when enabled), resample
    pub fn standard(quantize: bool) -> Self {
        let mut pipeline = Self::new().with(Dedup).with(Prune);
        if quantize {
            pipeline = pipeline.with(Quantize);
        }
        pipeline.with(Resample::default())
    }

    pub fn with<T: DocumentTransform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn run(&self, mut doc: SceneDocument) -> SceneDocument {
        for transform in &self.transforms {
            let before = doc.vertex_count();
            doc = transform.apply(doc);
            tracing::debug!(
                transform = transform.name(),
                vertices_before = before,
                vertices_after = doc.vertex_count(),
                "applied document transform"
            );
        }
        doc
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::standard(true)
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

/// Merge bit-identical vertices within each primitive and identical materials
pub struct Dedup;

impl DocumentTransform for Dedup {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn apply(&self, mut doc: SceneDocument) -> SceneDocument {
        for mesh in &mut doc.meshes {
            for prim in &mut mesh.primitives {
                if prim.quantized.is_some() {
                    continue;
                }
                let has_normals = prim.normals.len() == prim.positions.len();
                let has_uvs = prim.uvs.len() == prim.positions.len();

                let mut seen: HashMap<[u32; 8], u32> = HashMap::with_capacity(prim.positions.len());
                let mut remap = Vec::with_capacity(prim.positions.len());
                let mut positions = Vec::new();
                let mut normals = Vec::new();
                let mut uvs = Vec::new();

                for i in 0..prim.positions.len() {
                    let p = prim.positions[i];
                    let n = if has_normals { prim.normals[i] } else { [0.0; 3] };
                    let t = if has_uvs { prim.uvs[i] } else { [0.0; 2] };
                    let key = [
                        p[0].to_bits(),
                        p[1].to_bits(),
                        p[2].to_bits(),
                        n[0].to_bits(),
                        n[1].to_bits(),
                        n[2].to_bits(),
                        t[0].to_bits(),
                        t[1].to_bits(),
                    ];
                    let next = positions.len() as u32;
                    let index = *seen.entry(key).or_insert_with(|| {
                        positions.push(p);
                        if has_normals {
                            normals.push(n);
                        }
                        if has_uvs {
                            uvs.push(t);
                        }
                        next
                    });
                    remap.push(index);
                }

                for index in &mut prim.indices {
                    *index = remap[*index as usize];
                }
                prim.positions = positions;
                prim.normals = normals;
                prim.uvs = uvs;
            }
        }

        let mut unique: Vec<Material> = Vec::with_capacity(doc.materials.len());
        let mut material_remap = Vec::with_capacity(doc.materials.len());
        for material in doc.materials.drain(..) {
            match unique.iter().position(|m| same_material(m, &material)) {
                Some(existing) => material_remap.push(existing),
                None => {
                    material_remap.push(unique.len());
                    unique.push(material);
                }
            }
        }
        doc.materials = unique;
        for prim in doc.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
            prim.material = prim.material.map(|i| material_remap[i]);
        }

        doc
    }
}

/// Materials are interchangeable when every rendering parameter matches
fn same_material(a: &Material, b: &Material) -> bool {
    a.base_color == b.base_color
        && a.metallic == b.metallic
        && a.roughness == b.roughness
        && a.alpha_mode == b.alpha_mode
        && a.double_sided == b.double_sided
}

// ---------------------------------------------------------------------------
// Prune
// ---------------------------------------------------------------------------

/// Drop nodes unreachable from any scene, then meshes and materials nothing references
pub struct Prune;

impl DocumentTransform for Prune {
    fn name(&self) -> &'static str {
        "prune"
    }

    fn apply(&self, mut doc: SceneDocument) -> SceneDocument {
        // reachable nodes
        let mut keep_node = vec![false; doc.nodes.len()];
        let mut stack: Vec<usize> = doc.scenes.iter().flat_map(|s| s.nodes.iter().copied()).collect();
        while let Some(n) = stack.pop() {
            if n >= keep_node.len() || keep_node[n] {
                continue;
            }
            keep_node[n] = true;
            stack.extend(doc.nodes[n].children.iter().copied());
        }
        let node_map = compact(&keep_node);

        let nodes: Vec<Node> = doc
            .nodes
            .drain(..)
            .enumerate()
            .filter(|(i, _)| keep_node[*i])
            .map(|(_, mut node)| {
                node.children = node.children.iter().filter_map(|c| node_map.get(*c).copied().flatten()).collect();
                node
            })
            .collect();
        doc.nodes = nodes;
        for scene in &mut doc.scenes {
            scene.nodes = scene.nodes.iter().filter_map(|n| node_map.get(*n).copied().flatten()).collect();
        }

        let animations: Vec<Animation> = doc
            .animations
            .drain(..)
            .filter_map(|mut anim| {
                anim.channels = anim
                    .channels
                    .into_iter()
                    .filter_map(|mut ch| {
                        ch.node = node_map.get(ch.node).copied().flatten()?;
                        Some(ch)
                    })
                    .collect();
                (!anim.channels.is_empty()).then_some(anim)
            })
            .collect();
        doc.animations = animations;

        // meshes referenced by surviving nodes
        let mut keep_mesh = vec![false; doc.meshes.len()];
        for mesh in doc.nodes.iter().filter_map(|n| n.mesh) {
            if let Some(slot) = keep_mesh.get_mut(mesh) {
                *slot = true;
            }
        }
        let mesh_map = compact(&keep_mesh);
        doc.meshes = doc
            .meshes
            .drain(..)
            .enumerate()
            .filter(|(i, _)| keep_mesh[*i])
            .map(|(_, m)| m)
            .collect();
        for node in &mut doc.nodes {
            node.mesh = node.mesh.and_then(|m| mesh_map.get(m).copied().flatten());
        }

        // materials referenced by surviving primitives
        let mut keep_material = vec![false; doc.materials.len()];
        for mat in doc.primitives().filter_map(|p| p.material) {
            if let Some(slot) = keep_material.get_mut(mat) {
                *slot = true;
            }
        }
        let material_map = compact(&keep_material);
        doc.materials = doc
            .materials
            .drain(..)
            .enumerate()
            .filter(|(i, _)| keep_material[*i])
            .map(|(_, m)| m)
            .collect();
        for prim in doc.meshes.iter_mut().flat_map(|m| m.primitives.iter_mut()) {
            prim.material = prim.material.and_then(|m| material_map.get(m).copied().flatten());
        }

        doc
    }
}

/// Old index to new index for the entries being kept
fn compact(keep: &[bool]) -> Vec<Option<usize>> {
    let mut next = 0;
    keep.iter()
        .map(|&k| {
            k.then(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Quantize
// ---------------------------------------------------------------------------

/// Encode positions as normalized i16 (rescaled through the node), normals
/// as normalized i8 and texture coordinates as normalized u16
pub struct Quantize;

impl DocumentTransform for Quantize {
    fn name(&self) -> &'static str {
        "quantize"
    }

    fn apply(&self, mut doc: SceneDocument) -> SceneDocument {
        let mut any = false;
        let mut mesh_scales = vec![None; doc.meshes.len()];

        for (mesh_index, mesh) in doc.meshes.iter_mut().enumerate() {
            let extent = mesh
                .primitives
                .iter()
                .flat_map(|p| p.positions.iter())
                .flat_map(|p| p.iter())
                .fold(0.0f32, |acc, v| acc.max(v.abs()));
            if extent <= 0.0 || !extent.is_finite() {
                continue;
            }

            for prim in &mut mesh.primitives {
                if prim.quantized.is_some() {
                    continue;
                }
                let positions = prim
                    .positions
                    .iter()
                    .map(|p| p.map(|v| quantize_snorm16(v / extent)))
                    .collect();
                let normals = prim.normals.iter().map(|n| n.map(quantize_snorm8)).collect();
                let uvs = prim
                    .uvs
                    .iter()
                    .all(|t| t.iter().all(|v| (0.0..=1.0).contains(v)))
                    .then(|| prim.uvs.iter().map(|t| t.map(quantize_unorm16)).collect());
                prim.quantized = Some(QuantizedAttributes {
                    positions,
                    normals,
                    uvs,
                });
            }
            mesh_scales[mesh_index] = Some(extent);
            any = true;
        }

        for node in &mut doc.nodes {
            if let Some(extent) = node.mesh.and_then(|m| mesh_scales.get(m).copied().flatten()) {
                node.scale = node.scale.map(|s| s * extent);
            }
        }

        if any {
            doc.require_extension(KHR_MESH_QUANTIZATION);
        }
        doc
    }
}

pub fn quantize_snorm16(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

pub fn quantize_snorm8(v: f32) -> i8 {
    (v.clamp(-1.0, 1.0) * 127.0).round() as i8
}

pub fn quantize_unorm16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

// ---------------------------------------------------------------------------
// Resample
// ---------------------------------------------------------------------------

/// Remove keyframes that linear interpolation between their neighbours
/// already reproduces
pub struct Resample {
    pub tolerance: f32,
}

impl Default for Resample {
    fn default() -> Self {
        Self { tolerance: 1e-4 }
    }
}

impl DocumentTransform for Resample {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn apply(&self, mut doc: SceneDocument) -> SceneDocument {
        for anim in &mut doc.animations {
            for channel in &mut anim.channels {
                resample_channel(channel, self.tolerance);
            }
        }
        doc
    }
}

fn resample_channel(channel: &mut TranslationChannel, tolerance: f32) {
    let n = channel.times.len().min(channel.values.len());
    if n < 3 {
        return;
    }
    let mut times = vec![channel.times[0]];
    let mut values = vec![channel.values[0]];

    for i in 1..n - 1 {
        let (t0, v0) = (times[times.len() - 1], values[values.len() - 1]);
        let (t1, v1) = (channel.times[i], channel.values[i]);
        let (t2, v2) = (channel.times[i + 1], channel.values[i + 1]);
        let span = t2 - t0;
        let redundant = span > 0.0 && {
            let f = (t1 - t0) / span;
            (0..3).all(|k| (v0[k] + (v2[k] - v0[k]) * f - v1[k]).abs() <= tolerance)
        };
        if !redundant {
            times.push(t1);
            values.push(v1);
        }
    }
    times.push(channel.times[n - 1]);
    values.push(channel.values[n - 1]);

    channel.times = times;
    channel.values = values;
}
