//! Primary asset validation
//!
//! Checks an exported GLB against the size ceiling and parses it back.
//! Problems are recorded in the report; only failing to read the file is
//! an error.

use framegen_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::KHR_MESH_QUANTIZATION;
use crate::glb::{read_header, GLB_VERSION};

/// Default size ceiling for a primary asset (2 MiB)
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 2 * 1024 * 1024;

/// Extensions a consumer of our files is expected to support
const KNOWN_REQUIRED_EXTENSIONS: &[&str] = &[KHR_MESH_QUANTIZATION];

/// A single validation check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub status: CheckStatus,
    pub detail: String,
}

/// Status of a validation check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Full validation report for a primary asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub path: String,
    pub checks: Vec<ValidationCheck>,
    /// Measured size on disk
    pub byte_size: u64,
    pub max_size_bytes: u64,
    pub scene_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub passed: bool,
}

impl ValidationReport {
    /// Count checks by status
    pub fn count_by_status(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Names and details of the failed checks, joined for error messages
    pub fn failure_summary(&self) -> String {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| format!("{}: {}", c.name, c.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Print a formatted summary
    pub fn print_summary(&self) {
        println!("Validation: {}", self.path);
        println!(
            "  Scenes: {}, Meshes: {}, Materials: {}",
            self.scene_count, self.mesh_count, self.material_count
        );
        for check in &self.checks {
            let icon = match check.status {
                CheckStatus::Pass => "OK",
                CheckStatus::Warn => "WARN",
                CheckStatus::Fail => "FAIL",
            };
            println!("  {}: {}  {}", check.name, check.detail, icon);
        }
        if self.passed {
            println!("  Result: PASSED");
        } else {
            println!(
                "  Result: FAILED ({} issues)",
                self.count_by_status(CheckStatus::Fail)
            );
        }
    }
}

fn check(name: &str, status: CheckStatus, detail: String) -> ValidationCheck {
    ValidationCheck {
        name: name.to_string(),
        status,
        detail,
    }
}

/// Every validation error in the document apart from required-extension support
fn structural_problems(root: &gltf::json::Root) -> Vec<String> {
    use gltf::json::validation::{Error, Validate};

    let mut problems = Vec::new();
    root.validate(root, gltf::json::Path::new, &mut |path: &dyn Fn() -> gltf::json::Path, error: Error| {
        let path = path();
        if !path.as_str().starts_with("extensionsRequired") {
            problems.push(format!("{}: {}", path, error));
        }
    });
    problems
}

/// Validate the file at `path` against `max_size_bytes`
pub fn validate(path: &Path, max_size_bytes: u64) -> Result<ValidationReport> {
    let bytes = std::fs::read(path)?;
    Ok(validate_bytes(&path.to_string_lossy(), &bytes, max_size_bytes))
}

/// Validate in-memory GLB bytes
pub fn validate_bytes(label: &str, bytes: &[u8], max_size_bytes: u64) -> ValidationReport {
    let byte_size = bytes.len() as u64;
    let mut checks = Vec::new();

    checks.push(if byte_size <= max_size_bytes {
        check("Size", CheckStatus::Pass, format!("{} / {} bytes", byte_size, max_size_bytes))
    } else {
        check(
            "Size",
            CheckStatus::Fail,
            format!("{} bytes exceeds ceiling of {} bytes", byte_size, max_size_bytes),
        )
    });

    match read_header(bytes) {
        Ok(header) if header.version != GLB_VERSION => checks.push(check(
            "Header",
            CheckStatus::Fail,
            format!("unsupported GLB version {}", header.version),
        )),
        Ok(header) if header.length as u64 != byte_size => checks.push(check(
            "Header",
            CheckStatus::Fail,
            format!("declared length {} but file has {} bytes", header.length, byte_size),
        )),
        Ok(_) => checks.push(check("Header", CheckStatus::Pass, "glTF 2.0 binary".to_string())),
        Err(e) => checks.push(check("Header", CheckStatus::Fail, e.to_string())),
    }

    let (mut scene_count, mut mesh_count, mut material_count) = (0, 0, 0);

    // gltf's own validation rejects every required extension it does not
    // implement, so extension support is checked separately below
    match gltf::Gltf::from_slice_without_validation(bytes) {
        Ok(gltf) => {
            let document = &gltf.document;

            let problems = structural_problems(document.as_json());
            checks.push(if problems.is_empty() {
                check("Structure", CheckStatus::Pass, "indices and accessors valid".to_string())
            } else {
                check("Structure", CheckStatus::Fail, problems.join("; "))
            });
            scene_count = document.scenes().count();
            mesh_count = document.meshes().count();
            material_count = document.materials().count();

            checks.push(if scene_count >= 1 {
                check("Scenes", CheckStatus::Pass, format!("{}", scene_count))
            } else {
                check("Scenes", CheckStatus::Fail, "document has no scene".to_string())
            });
            checks.push(if mesh_count >= 1 {
                check("Meshes", CheckStatus::Pass, format!("{}", mesh_count))
            } else {
                check("Meshes", CheckStatus::Warn, "document has no mesh".to_string())
            });

            let unknown: Vec<&str> = document
                .extensions_required()
                .filter(|ext| !KNOWN_REQUIRED_EXTENSIONS.contains(ext))
                .collect();
            if !unknown.is_empty() {
                checks.push(check(
                    "Extensions",
                    CheckStatus::Fail,
                    format!("unsupported required extensions: {}", unknown.join(", ")),
                ));
            }
        }
        Err(e) => checks.push(check("Parse", CheckStatus::Fail, e.to_string())),
    }

    let passed = !checks.iter().any(|c| c.status == CheckStatus::Fail);
    if !passed {
        tracing::warn!(path = label, byte_size, max_size_bytes, "primary asset failed validation");
    }

    ValidationReport {
        path: label.to_string(),
        checks,
        byte_size,
        max_size_bytes,
        scene_count,
        mesh_count,
        material_count,
        passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SceneDocument;
    use crate::glb::encode_glb;
    use crate::material::MaterialDescriptor;
    use crate::transform::TransformPipeline;
    use framegen_core::Vec3;
    use framegen_geometry::MeshBuffer;

    fn sample_glb(quantize: bool) -> Vec<u8> {
        let mut mesh = MeshBuffer::new();
        let a = mesh.push_vertex(Vec3::new(-1.0, 0.0, 0.0), Vec3::Z, [0.0, 0.0]);
        let b = mesh.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, [1.0, 0.0]);
        let c = mesh.push_vertex(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, [0.5, 1.0]);
        mesh.push_triangle(a, b, c);
        let doc = SceneDocument::from_mesh(&mesh, &MaterialDescriptor::default(), "tri", "test");
        encode_glb(&TransformPipeline::standard(quantize).run(doc)).unwrap()
    }

    #[test]
    fn test_valid_asset_passes() {
        for quantize in [false, true] {
            let report = validate_bytes("tri.glb", &sample_glb(quantize), DEFAULT_MAX_ASSET_BYTES);
            assert!(report.passed, "{}", report.failure_summary());
            assert_eq!(report.scene_count, 1);
            assert_eq!(report.mesh_count, 1);
        }
    }

    #[test]
    fn test_oversized_asset_reports_measured_size() {
        let bytes = sample_glb(true);
        let report = validate_bytes("tri.glb", &bytes, 16);
        assert!(!report.passed);
        assert_eq!(report.byte_size, bytes.len() as u64);
        let size = report.checks.iter().find(|c| c.name == "Size").unwrap();
        assert_eq!(size.status, CheckStatus::Fail);
        assert!(size.detail.contains(&bytes.len().to_string()));
    }

    #[test]
    fn test_garbage_is_reported_not_thrown() {
        let report = validate_bytes("junk.glb", b"definitely not a model", DEFAULT_MAX_ASSET_BYTES);
        assert!(!report.passed);
        assert_eq!(report.scene_count, 0);
        assert!(report.count_by_status(CheckStatus::Fail) >= 2);
    }

    fn glb_from_json(json: &str) -> Vec<u8> {
        let mut chunk = json.as_bytes().to_vec();
        while chunk.len() % 4 != 0 {
            chunk.push(b' ');
        }
        let total = 12 + 8 + chunk.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&total.to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
        out.extend_from_slice(&chunk);
        out
    }

    #[test]
    fn test_broken_accessor_fails_structure() {
        // POSITION without min/max and an accessor with no buffer view
        let bytes = glb_from_json(
            r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],
            "nodes":[{"mesh":0}],"meshes":[{"primitives":[{"attributes":{"POSITION":0}}]}],
            "accessors":[{"componentType":5126,"count":3,"type":"VEC3"}]}"#,
        );
        let report = validate_bytes("broken.glb", &bytes, DEFAULT_MAX_ASSET_BYTES);
        assert!(!report.passed);
        assert_eq!(report.scene_count, 1);
        let structure = report.checks.iter().find(|c| c.name == "Structure").unwrap();
        assert_eq!(structure.status, CheckStatus::Fail);
        assert!(structure.detail.contains("bufferView"));
        assert!(structure.detail.contains("min"));
    }

    #[test]
    fn test_quantized_asset_passes_structure() {
        let report = validate_bytes("tri.glb", &sample_glb(true), DEFAULT_MAX_ASSET_BYTES);
        let structure = report.checks.iter().find(|c| c.name == "Structure").unwrap();
        assert_eq!(structure.status, CheckStatus::Pass, "{}", structure.detail);
    }

    #[test]
    fn test_validate_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.glb");
        std::fs::write(&path, sample_glb(false)).unwrap();
        let report = validate(&path, DEFAULT_MAX_ASSET_BYTES).unwrap();
        assert!(report.passed);
        assert!(validate(&dir.path().join("missing.glb"), 1).is_err());
    }
}
