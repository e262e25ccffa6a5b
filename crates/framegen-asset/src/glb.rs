//! Binary glTF (GLB 2.0) encoding

use framegen_core::{FrameGenError, Result};
use serde_json::{json, Value};

use crate::document::{Primitive, SceneDocument};

pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

const FLOAT: u32 = 5126;
const BYTE: u32 = 5120;
const SHORT: u32 = 5122;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Parsed 12-byte GLB header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    pub version: u32,
    pub length: u32,
}

/// Check the magic and read version and declared length
pub fn read_header(bytes: &[u8]) -> Result<GlbHeader> {
    if bytes.len() < 12 {
        return Err(FrameGenError::Validation(format!(
            "file is {} bytes, shorter than a GLB header",
            bytes.len()
        )));
    }
    if &bytes[..4] != GLB_MAGIC {
        return Err(FrameGenError::Validation("missing glTF magic".to_string()));
    }
    let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Ok(GlbHeader {
        version: word(4),
        length: word(8),
    })
}

/// Accumulates the BIN chunk plus the accessor and buffer view JSON
#[derive(Default)]
struct BufferBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl BufferBuilder {
    fn push_view(&mut self, data: &[u8], stride: Option<usize>, target: Option<u32>) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": data.len(),
        });
        if let Some(stride) = stride {
            view["byteStride"] = json!(stride);
        }
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.bin.extend_from_slice(data);
        self.views.push(view);
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// Tightly packed or strided attribute data, one accessor over one view
    #[allow(clippy::too_many_arguments)]
    fn attribute(
        &mut self,
        data: &[u8],
        stride: Option<usize>,
        component_type: u32,
        normalized: bool,
        count: usize,
        kind: &str,
        bounds: Option<(Vec<f64>, Vec<f64>)>,
    ) -> usize {
        let view = self.push_view(data, stride, Some(ARRAY_BUFFER));
        let mut accessor = json!({
            "bufferView": view,
            "componentType": component_type,
            "count": count,
            "type": kind,
        });
        if normalized {
            accessor["normalized"] = json!(true);
        }
        if let Some((min, max)) = bounds {
            accessor["min"] = json!(min);
            accessor["max"] = json!(max);
        }
        self.push_accessor(accessor)
    }
}

fn component_bounds<const N: usize, T: Copy + Into<f64>>(items: &[[T; N]]) -> Option<(Vec<f64>, Vec<f64>)> {
    let first = items.first()?;
    let mut min: Vec<f64> = first.iter().map(|&v| v.into()).collect();
    let mut max = min.clone();
    for item in items {
        for (k, &v) in item.iter().enumerate() {
            let v: f64 = v.into();
            min[k] = min[k].min(v);
            max[k] = max[k].max(v);
        }
    }
    Some((min, max))
}

/// Pack fixed-size items, padding each one to `stride` bytes
fn pack<const N: usize, T: Copy, const B: usize>(items: &[[T; N]], stride: usize, to_le: fn(T) -> [u8; B]) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() * stride);
    for item in items {
        let start = out.len();
        for &v in item {
            out.extend_from_slice(&to_le(v));
        }
        out.resize(start + stride, 0);
    }
    out
}

fn encode_primitive(buf: &mut BufferBuilder, prim: &Primitive) -> Value {
    let count = prim.vertex_count();
    let mut attributes = serde_json::Map::new();

    match &prim.quantized {
        Some(q) => {
            let pos = buf.attribute(
                &pack(&q.positions, 8, i16::to_le_bytes),
                Some(8),
                SHORT,
                true,
                count,
                "VEC3",
                component_bounds(&q.positions),
            );
            attributes.insert("POSITION".into(), json!(pos));
            if q.normals.len() == count {
                let nrm = buf.attribute(&pack(&q.normals, 4, i8::to_le_bytes), Some(4), BYTE, true, count, "VEC3", None);
                attributes.insert("NORMAL".into(), json!(nrm));
            }
            match &q.uvs {
                Some(uvs) if uvs.len() == count => {
                    let uv = buf.attribute(&pack(uvs, 4, u16::to_le_bytes), None, UNSIGNED_SHORT, true, count, "VEC2", None);
                    attributes.insert("TEXCOORD_0".into(), json!(uv));
                }
                _ if prim.uvs.len() == count => {
                    let uv = buf.attribute(&pack(&prim.uvs, 8, f32::to_le_bytes), None, FLOAT, false, count, "VEC2", None);
                    attributes.insert("TEXCOORD_0".into(), json!(uv));
                }
                _ => {}
            }
        }
        None => {
            let pos = buf.attribute(
                &pack(&prim.positions, 12, f32::to_le_bytes),
                None,
                FLOAT,
                false,
                count,
                "VEC3",
                component_bounds(&prim.positions),
            );
            attributes.insert("POSITION".into(), json!(pos));
            if prim.normals.len() == count {
                let nrm = buf.attribute(&pack(&prim.normals, 12, f32::to_le_bytes), None, FLOAT, false, count, "VEC3", None);
                attributes.insert("NORMAL".into(), json!(nrm));
            }
            if prim.uvs.len() == count {
                let uv = buf.attribute(&pack(&prim.uvs, 8, f32::to_le_bytes), None, FLOAT, false, count, "VEC2", None);
                attributes.insert("TEXCOORD_0".into(), json!(uv));
            }
        }
    }

    // 16-bit indices whenever every vertex is addressable
    let (index_bytes, index_type) = if count <= u16::MAX as usize {
        let mut bytes = Vec::with_capacity(prim.indices.len() * 2);
        for &i in &prim.indices {
            bytes.extend_from_slice(&(i as u16).to_le_bytes());
        }
        (bytes, UNSIGNED_SHORT)
    } else {
        let mut bytes = Vec::with_capacity(prim.indices.len() * 4);
        for &i in &prim.indices {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        (bytes, UNSIGNED_INT)
    };
    let view = buf.push_view(&index_bytes, None, Some(ELEMENT_ARRAY_BUFFER));
    let indices = buf.push_accessor(json!({
        "bufferView": view,
        "componentType": index_type,
        "count": prim.indices.len(),
        "type": "SCALAR",
    }));

    let mut primitive = json!({
        "attributes": attributes,
        "indices": indices,
        "mode": 4,
    });
    if let Some(material) = prim.material {
        primitive["material"] = json!(material);
    }
    primitive
}

/// Encode a document as a GLB byte vector
pub fn encode_glb(doc: &SceneDocument) -> Result<Vec<u8>> {
    let mut buf = BufferBuilder::default();

    let meshes: Vec<Value> = doc
        .meshes
        .iter()
        .map(|mesh| {
            let primitives: Vec<Value> = mesh.primitives.iter().map(|p| encode_primitive(&mut buf, p)).collect();
            json!({ "name": mesh.name, "primitives": primitives })
        })
        .collect();

    let nodes: Vec<Value> = doc
        .nodes
        .iter()
        .map(|node| {
            let mut value = json!({ "name": node.name });
            if let Some(mesh) = node.mesh {
                value["mesh"] = json!(mesh);
            }
            if !node.children.is_empty() {
                value["children"] = json!(node.children);
            }
            if node.translation != [0.0; 3] {
                value["translation"] = json!(node.translation);
            }
            if node.scale != [1.0; 3] {
                value["scale"] = json!(node.scale);
            }
            value
        })
        .collect();

    let materials: Vec<Value> = doc
        .materials
        .iter()
        .map(|m| {
            let mut value = json!({
                "name": m.name,
                "pbrMetallicRoughness": {
                    "baseColorFactor": m.base_color,
                    "metallicFactor": m.metallic,
                    "roughnessFactor": m.roughness,
                },
                "alphaMode": m.alpha_mode,
            });
            if m.double_sided {
                value["doubleSided"] = json!(true);
            }
            value
        })
        .collect();

    let mut animations = Vec::new();
    for anim in &doc.animations {
        let mut samplers = Vec::new();
        let mut channels = Vec::new();
        for ch in &anim.channels {
            let n = ch.times.len().min(ch.values.len());
            let times: Vec<[f32; 1]> = ch.times[..n].iter().map(|&t| [t]).collect();
            let input_view = buf.push_view(&pack(&times, 4, f32::to_le_bytes), None, None);
            let input = buf.push_accessor(json!({
                "bufferView": input_view,
                "componentType": FLOAT,
                "count": n,
                "type": "SCALAR",
                "min": [ch.times.first().copied().unwrap_or(0.0)],
                "max": [ch.times[..n].last().copied().unwrap_or(0.0)],
            }));
            let output_view = buf.push_view(&pack(&ch.values[..n], 12, f32::to_le_bytes), None, None);
            let output = buf.push_accessor(json!({
                "bufferView": output_view,
                "componentType": FLOAT,
                "count": n,
                "type": "VEC3",
            }));
            channels.push(json!({
                "sampler": samplers.len(),
                "target": { "node": ch.node, "path": "translation" },
            }));
            samplers.push(json!({ "input": input, "output": output, "interpolation": "LINEAR" }));
        }
        animations.push(json!({ "name": anim.name, "samplers": samplers, "channels": channels }));
    }

    while buf.bin.len() % 4 != 0 {
        buf.bin.push(0);
    }

    let scenes: Vec<Value> = doc
        .scenes
        .iter()
        .map(|s| json!({ "name": s.name, "nodes": s.nodes }))
        .collect();

    let mut root = json!({
        "asset": { "version": "2.0", "generator": doc.generator },
        "scenes": scenes,
        "nodes": nodes,
        "meshes": meshes,
        "materials": materials,
        "accessors": buf.accessors,
        "bufferViews": buf.views,
        "buffers": [{ "byteLength": buf.bin.len() }],
    });
    if let Some(scene) = doc.default_scene {
        root["scene"] = json!(scene);
    }
    if !animations.is_empty() {
        root["animations"] = json!(animations);
    }
    if !doc.extensions_used.is_empty() {
        root["extensionsUsed"] = json!(doc.extensions_used);
    }
    if !doc.extensions_required.is_empty() {
        root["extensionsRequired"] = json!(doc.extensions_required);
    }

    let json_str = serde_json::to_string(&root)?;

    // Pad JSON to 4-byte alignment with spaces
    let mut json_padded = json_str.into_bytes();
    let json_len = (json_padded.len() + 3) & !3;
    json_padded.resize(json_len, b' ');

    let total_len = 12 + 8 + json_padded.len() + 8 + buf.bin.len();
    let total_len = u32::try_from(total_len)
        .map_err(|_| FrameGenError::Export(format!("GLB of {} bytes exceeds the format limit", total_len)))?;

    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_len.to_le_bytes());

    out.extend_from_slice(&(json_padded.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_padded);

    out.extend_from_slice(&(buf.bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&buf.bin);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Animation, TranslationChannel};
    use crate::material::MaterialDescriptor;
    use crate::transform::{DocumentTransform, Quantize};
    use framegen_core::Vec3;
    use framegen_geometry::MeshBuffer;

    fn triangle_doc() -> SceneDocument {
        let mut mesh = MeshBuffer::new();
        let a = mesh.push_vertex(Vec3::new(-1.0, 0.0, 0.0), Vec3::Z, [0.0, 0.0]);
        let b = mesh.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, [1.0, 0.0]);
        let c = mesh.push_vertex(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, [0.5, 1.0]);
        mesh.push_triangle(a, b, c);
        SceneDocument::from_mesh(&mesh, &MaterialDescriptor::default(), "tri", "framegen-test")
    }

    fn json_chunk(bytes: &[u8]) -> Value {
        let len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        serde_json::from_slice(&bytes[20..20 + len]).unwrap()
    }

    #[test]
    fn test_header_and_alignment() {
        let bytes = encode_glb(&triangle_doc()).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.length as usize, bytes.len());
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn test_float_document_imports_with_gltf() {
        let bytes = encode_glb(&triangle_doc()).unwrap();
        let (document, buffers, _) = gltf::import_slice(&bytes).unwrap();
        let mesh = document.meshes().next().unwrap();
        let prim = mesh.primitives().next().unwrap();
        let reader = prim.reader(|b| Some(&buffers[b.index()]));
        let positions: Vec<[f32; 3]> = reader.read_positions().unwrap().collect();
        assert_eq!(positions[2], [0.0, 1.0, 0.0]);
        let indices: Vec<u32> = reader.read_indices().unwrap().into_u32().collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let material = document.materials().next().unwrap();
        assert_eq!(material.alpha_mode(), gltf::material::AlphaMode::Opaque);
    }

    #[test]
    fn test_quantized_layout() {
        let doc = Quantize.apply(triangle_doc());
        let bytes = encode_glb(&doc).unwrap();
        let root = json_chunk(&bytes);
        assert_eq!(root["extensionsRequired"][0], KHR);
        let pos = &root["accessors"][0];
        assert_eq!(pos["componentType"], SHORT);
        assert_eq!(pos["normalized"], true);
        assert_eq!(root["bufferViews"][0]["byteStride"], 8);
        assert_eq!(root["bufferViews"][0]["byteLength"], 24);
        // unit extent leaves the node scale at identity, which is omitted
        assert!(root["nodes"][0].get("scale").is_none());
    }

    const KHR: &str = crate::document::KHR_MESH_QUANTIZATION;

    #[test]
    fn test_animation_is_written() {
        let mut doc = triangle_doc();
        doc.animations.push(Animation {
            name: "slide".into(),
            channels: vec![TranslationChannel {
                node: 0,
                times: vec![0.0, 1.0],
                values: vec![[0.0; 3], [0.0, 0.1, 0.0]],
            }],
        });
        let root = json_chunk(&encode_glb(&doc).unwrap());
        assert_eq!(root["animations"][0]["channels"][0]["target"]["path"], "translation");
        assert_eq!(root["animations"][0]["samplers"][0]["interpolation"], "LINEAR");
    }

    #[test]
    fn test_read_header_rejects_garbage() {
        assert!(read_header(b"nope").is_err());
        assert!(read_header(b"PK\x03\x04 not a glb file").is_err());
    }
}
